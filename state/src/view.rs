use std::sync::{Arc, Mutex};

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{Decodable, Encodable};
use eth_trie::{EthTrie, Trie};
use evml_common::error::{ConsensusError, Error, StorageError};
use evml_storage::{FromOptRoot, KvStore, RocksEthTrieDb, RECEIPTS_CF, TRANSACTIONS_CF};
use evml_txmodel::account::Account;
use evml_txmodel::receipt::{Log, Receipt};
use evml_txmodel::TxWrapper;
use tracing::debug;

use crate::evm::{execute, ApplyOutcome, BlockContext, CallParams, TrieDatabase};

const BLOCK_GAS_LIMIT: u64 = 10_000_000;

struct Inner {
    trie: EthTrie<RocksEthTrieDb>,
    store: Arc<KvStore>,
    trie_db: Arc<RocksEthTrieDb>,
    gas_used: u64,
}

/// A thread-safe handle over an account trie rooted at some committed value. Shared by
/// [`crate::was::WriteAheadView`] and [`crate::pool::Pool`], which layer accumulators and
/// different commit semantics on top.
pub struct TrieView {
    inner: Mutex<Inner>,
    store: Arc<KvStore>,
    trie_db: Arc<RocksEthTrieDb>,
}

impl TrieView {
    pub fn new(store: Arc<KvStore>) -> Self {
        let trie_db = Arc::new(RocksEthTrieDb::new(store.clone()));
        let root = trie_db.root();
        let trie = EthTrie::from_opt_root(trie_db.clone(), root);
        Self {
            inner: Mutex::new(Inner {
                trie,
                store: store.clone(),
                trie_db: trie_db.clone(),
                gas_used: 0,
            }),
            store,
            trie_db,
        }
    }

    /// Builds an independent view backed by the same KV store but with its own
    /// in-memory trie cache and gas pool, rooted at `root`.
    pub fn try_clone_at(&self, root: Option<B256>) -> Self {
        let trie_db = Arc::new(RocksEthTrieDb::new(self.store.clone()));
        let trie = EthTrie::from_opt_root(trie_db.clone(), root);
        Self {
            inner: Mutex::new(Inner {
                trie,
                store: self.store.clone(),
                trie_db: trie_db.clone(),
                gas_used: 0,
            }),
            store: self.store.clone(),
            trie_db,
        }
    }

    pub fn root(&self) -> Result<B256, Error> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .trie
            .root_hash()
            .map_err(|e| Error::Storage(StorageError::Trie(e.to_string())))
    }

    /// Idempotent: only touches balance, code and storage when the account is currently
    /// empty (genesis seeding must not clobber an account created by a prior allocation).
    pub fn create_account(
        &self,
        address: Address,
        code: &[u8],
        storage: &[(U256, U256)],
        balance: U256,
        nonce: u64,
    ) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        let mut db = TrieDatabase::new(&mut inner.trie, inner.store.clone());
        if let Some(existing) = db.get_account(address)? {
            if !existing.is_empty() {
                return Ok(());
            }
        }

        let code_hash = if code.is_empty() {
            revm::primitives::KECCAK_EMPTY
        } else {
            keccak256(code)
        };
        db.set_code(code_hash, code)?;
        for (slot, value) in storage {
            db.set_storage(address, *slot, *value)?;
        }

        let account = Account {
            nonce,
            balance,
            storage_root: B256::ZERO,
            code_hash,
        };
        db.set_account(address, &account)
    }

    pub fn balance(&self, address: Address) -> Result<U256, Error> {
        let mut inner = self.inner.lock().unwrap();
        let mut db = TrieDatabase::new(&mut inner.trie, inner.store.clone());
        Ok(db.get_account(address)?.map(|a| a.balance).unwrap_or_default())
    }

    pub fn nonce(&self, address: Address) -> Result<u64, Error> {
        let mut inner = self.inner.lock().unwrap();
        let mut db = TrieDatabase::new(&mut inner.trie, inner.store.clone());
        Ok(db.get_account(address)?.map(|a| a.nonce).unwrap_or_default())
    }

    pub fn code(&self, address: Address) -> Result<Bytes, Error> {
        let mut inner = self.inner.lock().unwrap();
        let mut db = TrieDatabase::new(&mut inner.trie, inner.store.clone());
        let Some(account) = db.get_account(address)? else {
            return Ok(Bytes::new());
        };
        if account.code_hash == revm::primitives::KECCAK_EMPTY {
            return Ok(Bytes::new());
        }
        let bytes = inner
            .store
            .get(evml_storage::CODE_CF, account.code_hash.as_slice())?
            .unwrap_or_default();
        Ok(Bytes::from(bytes))
    }

    /// Runs `tx` against this view. `skip_receipt` is set by the pool, which wants the
    /// VM's validation side effects (nonce bump, gas check) without producing a receipt.
    pub fn apply_transaction(
        &self,
        tx: &TxWrapper,
        tx_index: u64,
        block_hash: B256,
        coinbase: Address,
        skip_receipt: bool,
    ) -> Result<Option<Receipt>, Error> {
        let mut inner = self.inner.lock().unwrap();
        let block = BlockContext {
            number: 1,
            coinbase,
            gas_limit: BLOCK_GAS_LIMIT,
            base_fee: U256::ZERO,
        };
        let params = CallParams {
            from: tx.from(),
            to: tx.to,
            value: tx.value,
            data: tx.data.to_vec(),
            gas_limit: tx.gas_limit,
            gas_price: tx.gas_price,
            nonce: tx.nonce,
            check_nonce: true,
        };

        let mut db = TrieDatabase::new(&mut inner.trie, inner.store.clone());
        let outcome = execute(&mut db, params, &block);

        let outcome = match outcome {
            ApplyOutcome::Consensus(e) => return Err(Error::Consensus(e)),
            ApplyOutcome::Ran(outcome) => outcome,
        };

        inner.gas_used += outcome.gas_used;

        if skip_receipt {
            return Ok(None);
        }

        let root = inner
            .trie
            .root_hash()
            .map_err(|e| Error::Storage(StorageError::Trie(e.to_string())))?;

        let contract_address = if tx.to.is_none() {
            outcome.created_address
        } else {
            None
        };

        let logs: Vec<Log> = outcome
            .logs
            .into_iter()
            .map(|log| Log {
                address: log.address,
                topics: log.topics().to_vec(),
                data: Bytes::copy_from_slice(log.data.data.as_ref()),
                transaction_hash: tx.hash(),
                transaction_index: tx_index,
                block_hash,
            })
            .collect();

        debug!(tx_hash = %tx.hash(), gas_used = outcome.gas_used, success = outcome.success, "applied transaction");

        let logs_bloom = Receipt::bloom_from_logs(&logs);

        Ok(Some(Receipt {
            root,
            transaction_hash: tx.hash(),
            status: if outcome.success { 1 } else { 0 },
            gas_used: outcome.gas_used,
            cumulative_gas_used: inner.gas_used,
            logs_bloom,
            logs,
            contract_address,
        }))
    }

    /// Read-only: executes `msg` on an ephemeral clone of this trie so that nonce bumps
    /// and any balance checks the VM performs never leak into the real view.
    pub fn call(&self, from: Address, to: Option<Address>, data: Vec<u8>, gas_limit: u64) -> Result<Bytes, Error> {
        let root = self.root()?;
        let ephemeral = self.try_clone_at(Some(root));
        let mut inner = ephemeral.inner.lock().unwrap();
        let block = BlockContext {
            number: 1,
            coinbase: Address::ZERO,
            gas_limit: BLOCK_GAS_LIMIT,
            base_fee: U256::ZERO,
        };
        let params = CallParams {
            from,
            to,
            value: U256::ZERO,
            data,
            gas_limit,
            gas_price: U256::ZERO,
            nonce: 0,
            check_nonce: false,
        };
        let mut db = TrieDatabase::new(&mut inner.trie, inner.store.clone());
        match execute(&mut db, params, &block) {
            ApplyOutcome::Consensus(e) => Err(Error::Consensus(e)),
            ApplyOutcome::Ran(outcome) => Ok(Bytes::from(outcome.output)),
        }
    }

    pub fn reset(&self, root: B256) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        inner.trie = EthTrie::from_opt_root(inner.trie_db.clone(), Some(root));
        inner.gas_used = 0;
        Ok(())
    }

    /// Flushes dirty trie nodes and persists the new root.
    pub fn commit(&self) -> Result<B256, Error> {
        let mut inner = self.inner.lock().unwrap();
        let root = inner
            .trie
            .root_hash()
            .map_err(|e| Error::Storage(StorageError::Trie(e.to_string())))?;
        inner
            .trie_db
            .put_root(root)
            .map_err(|e| Error::Storage(StorageError::Trie(e.to_string())))?;
        Ok(root)
    }

    pub fn write_transactions(&self, txs: &[&TxWrapper]) -> Result<(), Error> {
        let entries: Vec<_> = txs
            .iter()
            .map(|tx| {
                (
                    TRANSACTIONS_CF,
                    tx.hash().0.to_vec(),
                    tx.rlp_bytes().to_vec(),
                )
            })
            .collect();
        self.store.write_batch(&entries)
    }

    pub fn write_receipts(&self, receipts: &[(B256, &Receipt)]) -> Result<(), Error> {
        let entries: Vec<_> = receipts
            .iter()
            .map(|(hash, receipt)| {
                let mut buf = Vec::new();
                receipt.encode(&mut buf);
                (RECEIPTS_CF, hash.0.to_vec(), buf)
            })
            .collect();
        self.store.write_batch(&entries)
    }

    pub fn get_transaction(&self, hash: B256) -> Result<Option<Bytes>, Error> {
        Ok(self
            .store
            .get(TRANSACTIONS_CF, hash.as_slice())?
            .map(Bytes::from))
    }

    pub fn get_receipt(&self, hash: B256) -> Result<Option<Receipt>, Error> {
        let Some(bytes) = self.store.get(RECEIPTS_CF, hash.as_slice())? else {
            return Ok(None);
        };
        let mut slice = bytes.as_slice();
        let receipt = Receipt::decode(&mut slice)
            .map_err(|e| Error::Storage(StorageError::Trie(format!("malformed receipt: {e}"))))?;
        Ok(Some(receipt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_view() -> TrieView {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(KvStore::open(dir.path()).unwrap());
        TrieView::new(store)
    }

    #[test]
    fn create_account_is_idempotent() {
        let view = temp_view();
        let addr = Address::repeat_byte(1);
        view.create_account(addr, &[], &[], U256::from(100u64), 0).unwrap();
        view.create_account(addr, &[], &[], U256::from(999u64), 5).unwrap();
        assert_eq!(view.balance(addr).unwrap(), U256::from(100u64));
        assert_eq!(view.nonce(addr).unwrap(), 0);
    }

    #[test]
    fn unknown_account_has_zero_balance_and_nonce() {
        let view = temp_view();
        let addr = Address::repeat_byte(9);
        assert_eq!(view.balance(addr).unwrap(), U256::ZERO);
        assert_eq!(view.nonce(addr).unwrap(), 0);
    }

    #[test]
    fn receipt_round_trips_through_rlp() {
        let logs = vec![Log {
            address: Address::repeat_byte(4),
            topics: vec![B256::repeat_byte(5)],
            data: Bytes::from_static(&[1, 2, 3]),
            transaction_hash: B256::repeat_byte(2),
            transaction_index: 0,
            block_hash: B256::repeat_byte(6),
        }];
        let logs_bloom = Receipt::bloom_from_logs(&logs);
        let receipt = Receipt {
            root: B256::repeat_byte(1),
            transaction_hash: B256::repeat_byte(2),
            status: 1,
            gas_used: 21000,
            cumulative_gas_used: 21000,
            logs_bloom,
            logs,
            contract_address: Some(Address::repeat_byte(3)),
        };
        let mut buf = Vec::new();
        receipt.encode(&mut buf);
        let mut slice = buf.as_slice();
        let decoded = Receipt::decode(&mut slice).unwrap();
        assert_eq!(decoded, receipt);
    }

    #[test]
    fn bloom_from_logs_is_zero_when_there_are_no_logs() {
        assert_eq!(Receipt::bloom_from_logs(&[]), alloy::primitives::Bloom::default());
    }
}
