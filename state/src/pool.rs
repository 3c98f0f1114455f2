use std::sync::Arc;

use alloy::primitives::{Address, B256};
use evml_common::error::Error;
use evml_storage::KvStore;
use evml_txmodel::TxWrapper;

use crate::view::TrieView;

/// Pre-consensus validation only: never persisted, reset to the main root after every
/// commit. `check_tx` intentionally bumps the sender's nonce in this view so a client
/// can submit several transactions from one account before the first one commits.
pub struct Pool {
    base: TrieView,
}

impl Pool {
    pub fn new(store: Arc<KvStore>) -> Self {
        Self {
            base: TrieView::new(store),
        }
    }

    pub fn check_tx(&self, tx: &TxWrapper) -> Result<(), Error> {
        self.base
            .apply_transaction(tx, 0, B256::ZERO, Address::ZERO, true)
            .map(|_| ())
    }

    pub fn nonce(&self, address: Address) -> Result<u64, Error> {
        self.base.nonce(address)
    }

    pub fn reset(&self, root: B256) -> Result<(), Error> {
        self.base.reset(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_nonce_starts_at_zero_for_unknown_account() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(KvStore::open(dir.path()).unwrap());
        let pool = Pool::new(store);
        assert_eq!(pool.nonce(Address::repeat_byte(1)).unwrap(), 0);
    }
}
