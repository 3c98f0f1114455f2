//! The state engine: the single object consensus, HTTP reads, HTTP writes and the POA
//! gate all talk to. Owns the three trie views, the promise registry (via the write-ahead
//! view) and the proof-of-authority identity fixed at genesis.

use std::path::Path;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256, U256};
use evml_common::error::{ConsensusError, Error};
use evml_genesis::GenesisDoc;
use evml_poa::PoaConfig;
use evml_state::{Pool, ReceiptPromise, TrieView, WriteAheadView};
use evml_storage::KvStore;
use evml_txmodel::{JsonReceipt, TxWrapper};
use once_cell::sync::OnceCell;

pub struct Engine {
    main: TrieView,
    was: WriteAheadView,
    pool: Pool,
    store: Arc<KvStore>,
    poa: OnceCell<Option<PoaConfig>>,
    min_gas_price: U256,
    genesis_doc: OnceCell<GenesisDoc>,
}

impl Engine {
    pub fn open(db_path: impl AsRef<Path>, min_gas_price: U256) -> Result<Self, Error> {
        Self::open_with_cache_megabytes(db_path, min_gas_price, 128)
    }

    pub fn open_with_cache_megabytes(
        db_path: impl AsRef<Path>,
        min_gas_price: U256,
        cache_megabytes: u64,
    ) -> Result<Self, Error> {
        let store = Arc::new(KvStore::open_with_cache_megabytes(db_path, cache_megabytes)?);
        Ok(Self {
            main: TrieView::new(store.clone()),
            was: WriteAheadView::new(store.clone()),
            pool: Pool::new(store.clone()),
            store,
            poa: OnceCell::new(),
            min_gas_price,
            genesis_doc: OnceCell::new(),
        })
    }

    /// Seeds the genesis accounts (and POA contract, if configured) and commits, so the
    /// resulting root becomes the initial `main` root. Must be called exactly once,
    /// before any transaction is applied.
    pub fn load_genesis(&self, doc: GenesisDoc) -> Result<B256, Error> {
        let result = evml_genesis::load(&self.was, &doc)?;
        self.main.reset(result.root)?;
        self.pool.reset(result.root)?;
        let _ = self.poa.set(result.poa);
        let _ = self.genesis_doc.set(doc);
        Ok(result.root)
    }

    pub fn genesis_doc(&self) -> Option<&GenesisDoc> {
        self.genesis_doc.get()
    }

    // --- consensus-facing API ---------------------------------------------------

    pub fn apply_transaction(
        &self,
        raw: &[u8],
        block_hash: B256,
        coinbase: Address,
    ) -> Result<(), Error> {
        let tx = TxWrapper::from_rlp(raw)?;
        if tx.gas_price < self.min_gas_price {
            return Err(Error::Consensus(ConsensusError::GasPriceTooLow {
                given: tx.gas_price.to_string(),
                minimum: self.min_gas_price.to_string(),
            }));
        }
        self.was.apply_transaction(tx, block_hash, coinbase)
    }

    pub fn commit(&self) -> Result<B256, Error> {
        let root = self.was.commit()?;
        self.main.reset(root)?;
        self.pool.reset(root)?;
        tracing::debug!(%root, "engine commit");
        Ok(root)
    }

    // --- HTTP read API -----------------------------------------------------------

    /// `from_pool` only changes the answer for [`Engine::nonce`] — balance and code are
    /// always read from the committed main view.
    pub fn balance(&self, address: Address, _from_pool: bool) -> Result<U256, Error> {
        self.main.balance(address)
    }

    pub fn nonce(&self, address: Address, from_pool: bool) -> Result<u64, Error> {
        if from_pool {
            self.pool.nonce(address)
        } else {
            self.main.nonce(address)
        }
    }

    pub fn code(&self, address: Address, _from_pool: bool) -> Result<Bytes, Error> {
        self.main.code(address)
    }

    pub fn get_transaction(&self, hash: B256) -> Result<Bytes, Error> {
        self.main
            .get_transaction(hash)?
            .ok_or_else(|| Error::not_found(format!("transaction {hash}")))
    }

    pub fn get_receipt(&self, hash: B256) -> Result<JsonReceipt, Error> {
        let receipt = self
            .main
            .get_receipt(hash)?
            .ok_or_else(|| Error::not_found(format!("receipt {hash}")))?;
        // The persisted receipt does not retain `from`/`to`; read them back from the
        // transaction that produced it.
        let raw = self.get_transaction(hash)?;
        let tx = TxWrapper::from_rlp(&raw)?;
        Ok(receipt.to_json(tx.from(), tx.to))
    }

    // --- HTTP write API ------------------------------------------------------------

    pub fn check_tx(&self, raw: &[u8]) -> Result<TxWrapper, Error> {
        let tx = TxWrapper::from_rlp(raw)?;
        if tx.gas_price < self.min_gas_price {
            return Err(Error::Consensus(ConsensusError::GasPriceTooLow {
                given: tx.gas_price.to_string(),
                minimum: self.min_gas_price.to_string(),
            }));
        }
        self.pool.check_tx(&tx)?;
        Ok(tx)
    }

    pub fn create_receipt_promise(&self, hash: B256) -> ReceiptPromise {
        self.was.create_receipt_promise(hash)
    }

    pub fn call(&self, from: Address, to: Option<Address>, data: Vec<u8>, gas_limit: u64) -> Result<Bytes, Error> {
        self.main.call(from, to, data, gas_limit)
    }

    // --- POA -----------------------------------------------------------------------

    pub fn poa(&self) -> Option<&PoaConfig> {
        self.poa.get().and_then(|p| p.as_ref())
    }

    pub fn check_authorised(&self, address: Address) -> Result<bool, Error> {
        let Some(poa) = self.poa() else {
            return Err(Error::not_found("no POA contract configured"));
        };
        let data = evml_poa::encode_check_authorised(address);
        let output = self.main.call(poa.address, Some(poa.address), data, 1_000_000)?;
        evml_poa::decode_bool_return(&output)
    }

    pub fn min_gas_price(&self) -> U256 {
        self.min_gas_price
    }

    pub fn store(&self) -> Arc<KvStore> {
        self.store.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn temp_engine() -> Engine {
        let dir = tempfile::tempdir().unwrap();
        Engine::open(dir.path(), U256::ZERO).unwrap()
    }

    #[test]
    fn genesis_seeds_balances_readable_from_main() {
        let engine = temp_engine();
        let mut alloc = BTreeMap::new();
        alloc.insert(
            Address::repeat_byte(1),
            evml_genesis::GenesisAccount {
                code: "0x".into(),
                storage: BTreeMap::new(),
                balance: "1000T".into(),
                nonce: None,
            },
        );
        engine.load_genesis(GenesisDoc { alloc, poa: None }).unwrap();

        let balance = engine.balance(Address::repeat_byte(1), false).unwrap();
        assert_eq!(balance, U256::from(1_000_000_000_000_000_000_000u128));
    }

    #[test]
    fn check_authorised_without_poa_errors() {
        let engine = temp_engine();
        engine
            .load_genesis(GenesisDoc {
                alloc: BTreeMap::new(),
                poa: None,
            })
            .unwrap();
        assert!(engine.check_authorised(Address::repeat_byte(1)).is_err());
    }

    #[test]
    fn unknown_transaction_hash_is_not_found() {
        let engine = temp_engine();
        engine
            .load_genesis(GenesisDoc {
                alloc: BTreeMap::new(),
                poa: None,
            })
            .unwrap();
        let result = engine.get_transaction(B256::repeat_byte(9));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
