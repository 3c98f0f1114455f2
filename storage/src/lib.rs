//! The persistent column-family store and the [`eth_trie::DB`] adapter built on top of it.

mod kv;
mod trie_db;

pub use kv::{
    KvStore, CODE_CF, COLUMN_FAMILIES, RECEIPTS_CF, STORAGE_CF, TRANSACTIONS_CF, TRIE_CF,
    TRIE_ROOT_CF,
};
pub use trie_db::{FromOptRoot, RocksEthTrieDb, ROOT_KEY};
