use std::collections::HashMap;
use std::sync::Mutex;

use alloy::primitives::B256;
use evml_common::error::Error;
use evml_txmodel::JsonReceipt;
use tokio::sync::oneshot;

pub type ReceiptPromiseResponse = Result<JsonReceipt, Error>;

/// The consumer's half of a receipt promise: created by the HTTP handler, awaited with a
/// timeout. Dropping this without awaiting is fine — the producer's send becomes a no-op.
pub struct ReceiptPromise {
    pub hash: B256,
    receiver: oneshot::Receiver<ReceiptPromiseResponse>,
}

impl ReceiptPromise {
    pub async fn wait(self) -> ReceiptPromiseResponse {
        match self.receiver.await {
            Ok(response) => response,
            Err(_) => Err(Error::Timeout),
        }
    }
}

type PromiseSender = oneshot::Sender<ReceiptPromiseResponse>;

/// Registry of pending receipt promises, keyed by transaction hash. Guarded by its own
/// lock, never acquired while a trie-view lock is held.
#[derive(Default)]
pub struct PromiseRegistry {
    pending: Mutex<HashMap<B256, PromiseSender>>,
}

impl PromiseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh promise for `hash`. If one is already registered it is replaced
    /// (the old promise resolves to a dropped receiver, which is harmless).
    pub fn create(&self, hash: B256) -> ReceiptPromise {
        let (sender, receiver) = oneshot::channel();
        self.pending.lock().unwrap().insert(hash, sender);
        ReceiptPromise { hash, receiver }
    }

    /// Resolves and removes the promise for `hash`, if one is pending. A missing promise
    /// means nobody is waiting on this transaction — not an error.
    pub fn resolve(&self, hash: B256, response: ReceiptPromiseResponse) {
        if let Some(sender) = self.pending.lock().unwrap().remove(&hash) {
            // The receiver may already be gone (timed out); `send` returning Err is fine.
            let _ = sender.send(response);
        }
    }

    pub fn is_pending(&self, hash: &B256) -> bool {
        self.pending.lock().unwrap().contains_key(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_a_registered_promise() {
        let registry = PromiseRegistry::new();
        let hash = B256::repeat_byte(1);
        let promise = registry.create(hash);
        assert!(registry.is_pending(&hash));

        registry.resolve(hash, Err(Error::Timeout));
        let result = promise.wait().await;
        assert!(result.is_err());
        assert!(!registry.is_pending(&hash));
    }

    #[tokio::test]
    async fn resolving_an_unregistered_hash_is_a_no_op() {
        let registry = PromiseRegistry::new();
        registry.resolve(B256::repeat_byte(2), Err(Error::Timeout));
    }

    #[tokio::test]
    async fn a_dropped_consumer_does_not_panic_the_producer() {
        let registry = PromiseRegistry::new();
        let hash = B256::repeat_byte(3);
        let promise = registry.create(hash);
        drop(promise);
        registry.resolve(hash, Err(Error::Timeout));
    }
}
