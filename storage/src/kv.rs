use std::path::Path;

use evml_common::error::{Error, StorageError};
use rocksdb::{ColumnFamilyDescriptor, Options, DB};

pub const TRIE_CF: &str = "trie";
pub const TRIE_ROOT_CF: &str = "trie_root";
pub const TRANSACTIONS_CF: &str = "transactions";
pub const RECEIPTS_CF: &str = "receipts";
pub const CODE_CF: &str = "code";
pub const STORAGE_CF: &str = "storage";

pub const COLUMN_FAMILIES: &[&str] = &[
    TRIE_CF,
    TRIE_ROOT_CF,
    TRANSACTIONS_CF,
    RECEIPTS_CF,
    CODE_CF,
    STORAGE_CF,
];

/// Thin wrapper over a single `rocksdb::DB` opened with the column families this
/// application needs. One instance is shared (via `Arc`) across every view.
pub struct KvStore {
    db: DB,
}

impl KvStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::open_with_cache_megabytes(path, 128)
    }

    /// Opens the store with a block cache sized from the node's `eth-cache-megabytes`
    /// config value, shared across every column family's table factory.
    pub fn open_with_cache_megabytes(path: impl AsRef<Path>, cache_megabytes: u64) -> Result<Self, Error> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cache = rocksdb::Cache::new_lru_cache(cache_megabytes as usize * 1024 * 1024);
        let mut table_opts = rocksdb::BlockBasedOptions::default();
        table_opts.set_block_cache(&cache);

        let cf_descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_block_based_table_factory(&table_opts);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| Error::Storage(StorageError::Backend(e.to_string())))?;

        Ok(Self { db })
    }

    pub fn db(&self) -> &DB {
        &self.db
    }

    fn cf(&self, name: &'static str) -> Result<&rocksdb::ColumnFamily, Error> {
        self.db
            .cf_handle(name)
            .ok_or(Error::Storage(StorageError::MissingColumnFamily(name)))
    }

    pub fn get(&self, cf: &'static str, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let handle = self.cf(cf)?;
        self.db
            .get_cf(handle, key)
            .map_err(|e| Error::Storage(StorageError::Backend(e.to_string())))
    }

    pub fn put(&self, cf: &'static str, key: &[u8], value: &[u8]) -> Result<(), Error> {
        let handle = self.cf(cf)?;
        self.db
            .put_cf(handle, key, value)
            .map_err(|e| Error::Storage(StorageError::Backend(e.to_string())))
    }

    /// Writes every `(cf, key, value)` triple as a single atomic batch. Used to persist a
    /// whole commit's worth of transactions and receipts together.
    pub fn write_batch(&self, entries: &[(&'static str, Vec<u8>, Vec<u8>)]) -> Result<(), Error> {
        let mut batch = rocksdb::WriteBatch::default();
        for (cf, key, value) in entries {
            let handle = self.cf(cf)?;
            batch.put_cf(handle, key, value);
        }
        self.db
            .write(batch)
            .map_err(|e| Error::Storage(StorageError::Backend(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::open(dir.path()).unwrap();
        store.put(TRANSACTIONS_CF, b"hash", b"rlp-bytes").unwrap();
        assert_eq!(
            store.get(TRANSACTIONS_CF, b"hash").unwrap(),
            Some(b"rlp-bytes".to_vec())
        );
    }

    #[test]
    fn missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::open(dir.path()).unwrap();
        assert_eq!(store.get(RECEIPTS_CF, b"missing").unwrap(), None);
    }

    #[test]
    fn batch_write_is_all_or_nothing_visible_together() {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::open(dir.path()).unwrap();
        store
            .write_batch(&[
                (TRANSACTIONS_CF, b"a".to_vec(), b"1".to_vec()),
                (RECEIPTS_CF, b"a".to_vec(), b"2".to_vec()),
            ])
            .unwrap();
        assert_eq!(store.get(TRANSACTIONS_CF, b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get(RECEIPTS_CF, b"a").unwrap(), Some(b"2".to_vec()));
    }
}
