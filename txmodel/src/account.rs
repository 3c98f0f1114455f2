use alloy::primitives::{B256, U256};
use alloy_rlp::{Decodable, RlpDecodable, RlpEncodable};

/// An account entry in the trie: everything needed to reconstruct `revm::AccountInfo`
/// plus the storage trie root this account owns.
#[derive(Debug, Clone, PartialEq, Eq, Default, RlpEncodable, RlpDecodable)]
pub struct Account {
    pub nonce: u64,
    pub balance: U256,
    pub storage_root: B256,
    pub code_hash: B256,
}

impl Account {
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.code_hash == B256::ZERO
    }

    pub fn serialize(&self) -> Vec<u8> {
        alloy_rlp::encode(self)
    }

    pub fn try_deserialize(bytes: &[u8]) -> alloy_rlp::Result<Self> {
        let mut slice = bytes;
        Self::decode(&mut slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_account_is_empty() {
        assert!(Account::default().is_empty());
    }

    #[test]
    fn account_with_balance_is_not_empty() {
        let account = Account {
            balance: U256::from(1),
            ..Default::default()
        };
        assert!(!account.is_empty());
    }

    #[test]
    fn serialize_round_trips() {
        let account = Account {
            nonce: 3,
            balance: U256::from(1_000_000u64),
            storage_root: B256::repeat_byte(9),
            code_hash: B256::repeat_byte(1),
        };
        let bytes = account.serialize();
        let decoded = Account::try_deserialize(&bytes).unwrap();
        assert_eq!(account, decoded);
    }
}
