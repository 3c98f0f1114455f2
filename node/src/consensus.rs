use std::sync::Arc;

use alloy::primitives::{keccak256, Address, B256};
use evml_engine::Engine;
use tokio::sync::mpsc;

/// A single-process consensus shim: relays raw transaction bytes straight from the
/// HTTP submit channel into the engine, one at a time, committing after each one.
///
/// This stands in for a real BFT consensus engine (out of scope per `spec.md` §1) the
/// way the original `solo` driver stands in for Babble: it assigns a deterministic
/// per-transaction block hash and applies transactions in arrival order with no batching.
pub struct SoloConsensus {
    engine: Arc<Engine>,
    submit_rx: mpsc::Receiver<Vec<u8>>,
    tx_index: u64,
}

impl SoloConsensus {
    pub fn new(engine: Arc<Engine>, submit_rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            engine,
            submit_rx,
            tx_index: 0,
        }
    }

    /// Runs until the submit channel is closed (all senders, including the HTTP
    /// server's, have been dropped).
    ///
    /// `apply_transaction`/`commit` are synchronous (the trie flush and RocksDB batch
    /// write underneath them are blocking calls), so each is run via
    /// `tokio::task::spawn_blocking` to keep them off the async runtime's worker threads.
    pub async fn run(mut self) {
        while let Some(raw) = self.submit_rx.recv().await {
            let block_hash = block_hash_for(self.tx_index);
            let engine = self.engine.clone();
            let apply_result = tokio::task::spawn_blocking(move || {
                engine.apply_transaction(&raw, block_hash, COINBASE)
            })
            .await
            .expect("apply_transaction task panicked");

            match apply_result {
                Ok(()) => {}
                Err(e) => {
                    tracing::warn!(tx_index = self.tx_index, error = %e, "apply_transaction failed");
                }
            }

            let engine = self.engine.clone();
            let commit_result = tokio::task::spawn_blocking(move || engine.commit())
                .await
                .expect("commit task panicked");

            match commit_result {
                Ok(root) => tracing::debug!(tx_index = self.tx_index, %root, "committed"),
                Err(e) => {
                    tracing::error!(tx_index = self.tx_index, error = %e, "commit failed, stopping consensus");
                    return;
                }
            }

            self.tx_index += 1;
        }
        tracing::info!("submit channel closed, solo consensus stopping");
    }
}

const COINBASE: Address = Address::ZERO;

fn block_hash_for(tx_index: u64) -> B256 {
    keccak256(format!("block {tx_index}").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use evml_genesis::GenesisDoc;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn stops_cleanly_when_the_submit_channel_closes() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(Engine::open(dir.path(), U256::ZERO).unwrap());
        engine
            .load_genesis(GenesisDoc {
                alloc: BTreeMap::new(),
                poa: None,
            })
            .unwrap();

        let (tx, rx) = mpsc::channel(8);
        let consensus = SoloConsensus::new(engine, rx);
        drop(tx);
        consensus.run().await;
    }
}
