//! Parses a genesis document and seeds the initial account trie, including the
//! proof-of-authority contract if one is configured.

pub mod doc;

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use evml_common::error::{DecodeError, Error};
use evml_poa::PoaConfig;
use evml_state::WriteAheadView;

pub use doc::{GenesisAccount, GenesisDoc, PoaSection};

/// The result of loading a genesis document: the committed root and, if one was
/// configured, the proof-of-authority identity.
pub struct GenesisResult {
    pub root: alloy::primitives::B256,
    pub poa: Option<PoaConfig>,
}

pub fn load(was: &WriteAheadView, doc: &GenesisDoc) -> Result<GenesisResult, Error> {
    for (address, account) in &doc.alloc {
        seed_account(was, *address, account)?;
    }

    let poa = match &doc.poa {
        Some(section) if !section.abi.is_empty() => {
            seed_account(
                was,
                section.address,
                &GenesisAccount {
                    code: section.code.clone(),
                    storage: Default::default(),
                    balance: section.balance.clone(),
                    nonce: None,
                },
            )?;
            Some(PoaConfig::new(section.address, section.abi.clone()))
        }
        _ => None,
    };

    let root = was.commit()?;
    tracing::debug!(%root, poa = poa.is_some(), "genesis committed");

    Ok(GenesisResult { root, poa })
}

fn seed_account(was: &WriteAheadView, address: Address, account: &GenesisAccount) -> Result<(), Error> {
    let code = decode_hex(&account.code)?;
    let balance = evml_currency::parse_atomic_units(&account.balance)?;
    let storage: Vec<(U256, U256)> = account
        .storage
        .iter()
        .map(|(k, v)| Ok::<_, Error>((decode_u256(k)?, decode_u256(v)?)))
        .collect::<Result<_, _>>()?;

    was.base().create_account(
        address,
        &code,
        &storage,
        U256::from(balance),
        account.nonce.unwrap_or(0),
    )
}

fn decode_hex(input: &str) -> Result<Vec<u8>, Error> {
    let trimmed = input.strip_prefix("0x").unwrap_or(input);
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    hex::decode(trimmed).map_err(|_| Error::Decode(DecodeError::Hex))
}

fn decode_u256(input: &str) -> Result<U256, Error> {
    let trimmed = input.strip_prefix("0x").unwrap_or(input);
    U256::from_str_radix(trimmed, 16).map_err(|_| Error::Decode(DecodeError::Hex))
}

#[cfg(test)]
mod tests {
    use super::*;
    use evml_storage::KvStore;
    use std::collections::BTreeMap;

    fn temp_was() -> WriteAheadView {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(KvStore::open(dir.path()).unwrap());
        WriteAheadView::new(store)
    }

    #[test]
    fn loads_plain_accounts_without_poa() {
        let was = temp_was();
        let mut alloc = BTreeMap::new();
        alloc.insert(
            Address::repeat_byte(1),
            GenesisAccount {
                code: "0x".into(),
                storage: BTreeMap::new(),
                balance: "1000T".into(),
                nonce: None,
            },
        );
        let doc = GenesisDoc { alloc, poa: None };

        let result = load(&was, &doc).unwrap();
        assert!(result.poa.is_none());
        assert_eq!(
            was.base().balance(Address::repeat_byte(1)).unwrap(),
            U256::from(1_000_000_000_000_000_000_000u128)
        );
    }
}
