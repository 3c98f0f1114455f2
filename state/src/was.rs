use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, B256};
use evml_common::error::Error;
use evml_storage::KvStore;
use evml_txmodel::{Receipt, TxWrapper};

use crate::promise::{PromiseRegistry, ReceiptPromise};
use crate::view::TrieView;

/// The write-ahead view: stages the transactions consensus has ordered, accumulates
/// their receipts and logs, and resolves receipt promises at [`WriteAheadView::commit`].
pub struct WriteAheadView {
    base: TrieView,
    batch: Mutex<Batch>,
    promises: PromiseRegistry,
}

#[derive(Default)]
struct Batch {
    tx_index: u64,
    txs: Vec<TxWrapper>,
}

impl WriteAheadView {
    pub fn new(store: Arc<KvStore>) -> Self {
        Self {
            base: TrieView::new(store),
            batch: Mutex::new(Batch::default()),
            promises: PromiseRegistry::new(),
        }
    }

    pub fn base(&self) -> &TrieView {
        &self.base
    }

    pub fn create_receipt_promise(&self, hash: B256) -> ReceiptPromise {
        self.promises.create(hash)
    }

    /// Applies `tx`, appending it to the pending batch on success. On a consensus error
    /// any promise registered for this hash is resolved with that error immediately —
    /// the transaction will not be retried, so there is nothing further to wait for.
    pub fn apply_transaction(&self, mut tx: TxWrapper, block_hash: B256, coinbase: Address) -> Result<(), Error> {
        let tx_index = {
            let batch = self.batch.lock().unwrap();
            batch.tx_index
        };

        match self
            .base
            .apply_transaction(&tx, tx_index, block_hash, coinbase, false)
        {
            Ok(receipt) => {
                tx.receipt = receipt;
                let mut batch = self.batch.lock().unwrap();
                batch.tx_index += 1;
                batch.txs.push(tx);
                Ok(())
            }
            Err(e) => {
                self.promises.resolve(tx.hash(), Err(e.clone()));
                Err(e)
            }
        }
    }

    /// Flushes the trie, writes every pending transaction and receipt in one atomic
    /// batch, resolves pending promises, then resets ready for the next block.
    pub fn commit(&self) -> Result<B256, Error> {
        let mut batch = self.batch.lock().unwrap();
        let txs = std::mem::take(&mut batch.txs);
        batch.tx_index = 0;
        drop(batch);

        let root = self.base.commit()?;

        let tx_refs: Vec<&TxWrapper> = txs.iter().collect();
        self.base.write_transactions(&tx_refs)?;

        let receipts: Vec<(B256, &Receipt)> = txs
            .iter()
            .filter_map(|tx| tx.receipt.as_ref().map(|r| (tx.hash(), r)))
            .collect();
        self.base.write_receipts(&receipts)?;

        for tx in &txs {
            if self.promises.is_pending(&tx.hash()) {
                let response = match tx.to_json_receipt() {
                    Some(json) => Ok(json),
                    None => Err(Error::not_found(format!("receipt for {}", tx.hash()))),
                };
                self.promises.resolve(tx.hash(), response);
            }
        }

        self.base.reset(root)?;
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_resets_batch_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(KvStore::open(dir.path()).unwrap());
        let was = WriteAheadView::new(store);
        let root = was.commit().unwrap();
        assert_eq!(root, was.base().root().unwrap());
    }
}
