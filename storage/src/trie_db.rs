use std::sync::Arc;

use alloy::primitives::B256;
use eth_trie::DB as EthTrieDb;

use crate::kv::{KvStore, TRIE_CF, TRIE_ROOT_CF};

/// The fixed key under which the current account trie root is stored in [`TRIE_ROOT_CF`].
pub const ROOT_KEY: &[u8] = b"root";

/// Implements [`eth_trie::DB`] over a column family of [`KvStore`], so `eth_trie::EthTrie`
/// can read and write nodes straight through to RocksDB.
pub struct RocksEthTrieDb {
    store: Arc<KvStore>,
}

impl RocksEthTrieDb {
    pub fn new(store: Arc<KvStore>) -> Self {
        Self { store }
    }

    pub fn root(&self) -> Option<B256> {
        self.store
            .get(TRIE_ROOT_CF, ROOT_KEY)
            .ok()
            .flatten()
            .map(|bytes| B256::from_slice(&bytes))
    }

    pub fn put_root(&self, root: B256) -> eth_trie::TrieResult<()> {
        self.store
            .put(TRIE_ROOT_CF, ROOT_KEY, root.as_slice())
            .map_err(|e| eth_trie::TrieError::DB(e.to_string()))
    }
}

impl EthTrieDb for RocksEthTrieDb {
    type Error = eth_trie::TrieError;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error> {
        self.store
            .get(TRIE_CF, key)
            .map_err(|e| eth_trie::TrieError::DB(e.to_string()))
    }

    fn insert(&self, key: &[u8], value: Vec<u8>) -> Result<(), Self::Error> {
        self.store
            .put(TRIE_CF, key, &value)
            .map_err(|e| eth_trie::TrieError::DB(e.to_string()))
    }

    fn remove(&self, _key: &[u8]) -> Result<(), Self::Error> {
        // Nodes are content-addressed by hash; two roots may share a node, so this
        // backend never deletes individual nodes. Pruning is out of scope.
        Ok(())
    }

    fn flush(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Bridges an optional persisted root to an `eth_trie::EthTrie` handle: `None` starts a
/// fresh empty trie, `Some(root)` re-opens the trie at that root.
pub trait FromOptRoot<D> {
    fn from_opt_root(db: Arc<D>, root: Option<B256>) -> eth_trie::EthTrie<D>
    where
        D: EthTrieDb;
}

impl<D: EthTrieDb> FromOptRoot<D> for eth_trie::EthTrie<D> {
    fn from_opt_root(db: Arc<D>, root: Option<B256>) -> eth_trie::EthTrie<D> {
        match root {
            Some(root) => eth_trie::EthTrie::from(db, root).expect("persisted root must be valid"),
            None => eth_trie::EthTrie::new(db),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_round_trips_through_put_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(KvStore::open(dir.path()).unwrap());
        let trie_db = RocksEthTrieDb::new(store);
        assert_eq!(trie_db.root(), None);

        let root = B256::repeat_byte(7);
        trie_db.put_root(root).unwrap();
        assert_eq!(trie_db.root(), Some(root));
    }

    #[test]
    fn insert_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(KvStore::open(dir.path()).unwrap());
        let trie_db = RocksEthTrieDb::new(store);
        trie_db.insert(b"node-key", b"node-value".to_vec()).unwrap();
        assert_eq!(trie_db.get(b"node-key").unwrap(), Some(b"node-value".to_vec()));
    }
}
