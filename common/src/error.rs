//! Structured error types for the state engine.
//!
//! Only the structured variants should drive control flow; the [`Display`](std::fmt::Display)
//! strings are for logs and HTTP bodies, not for matching.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top level error for the engine. Mirrors the taxonomy every caller (HTTP, consensus,
/// genesis loader) needs to distinguish.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("bad signature: {0}")]
    BadSignature(#[from] BadSignature),

    #[error("consensus error: {0}")]
    Consensus(#[from] ConsensusError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("timed out waiting for receipt")]
    Timeout,
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// True for errors that must not be persisted as a receipt: the transaction never
    /// touched the trie and any pending receipt promise resolves with this error directly.
    pub fn is_consensus_error(&self) -> bool {
        matches!(
            self,
            Error::Decode(_) | Error::BadSignature(_) | Error::Consensus(_)
        )
    }
}

#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error("malformed RLP payload")]
    Rlp,
    #[error("unrecognised currency suffix: {0:?}")]
    CurrencySuffix(char),
    #[error("malformed JSON: {0}")]
    Json(String),
    #[error("odd-length or invalid hex string")]
    Hex,
}

#[derive(Debug, Clone, Error)]
pub enum BadSignature {
    #[error("signature does not recover to a valid address")]
    InvalidRecovery,
    #[error("signature chain id {given} does not match expected {expected}")]
    WrongChainId { given: u64, expected: u64 },
}

#[derive(Debug, Clone, Error)]
pub enum ConsensusError {
    #[error("nonce too low: account={account} next={expected} given={given}")]
    NonceTooLow {
        account: String,
        expected: u64,
        given: u64,
    },
    #[error("insufficient balance: account={account} needed={needed} have={have}")]
    InsufficientBalance {
        account: String,
        needed: String,
        have: String,
    },
    #[error("intrinsic gas exceeds gas limit")]
    IntrinsicGasExceedsLimit,
    #[error("gas price {given} below minimum {minimum}")]
    GasPriceTooLow { given: String, minimum: String },
    #[error("block gas pool exhausted")]
    GasPoolExhausted,
    #[error("EVM execution could not be started: {0}")]
    VmSetup(String),
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("column family {0:?} is missing")]
    MissingColumnFamily(&'static str),
    #[error("underlying store error: {0}")]
    Backend(String),
    #[error("trie error: {0}")]
    Trie(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Error::Decode(DecodeError::Rlp), true; "decode is a consensus error")]
    #[test_case(Error::BadSignature(BadSignature::InvalidRecovery), true; "bad signature is a consensus error")]
    #[test_case(Error::Timeout, false; "timeout is not a consensus error")]
    #[test_case(Error::NotFound("x".into()), false; "not found is not a consensus error")]
    fn classifies_consensus_errors(err: Error, expected: bool) {
        assert_eq!(err.is_consensus_error(), expected);
    }
}
