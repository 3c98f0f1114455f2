//! Proof-of-authority membership gate: a single ABI-encoded call,
//! `checkAuthorised(address) returns (bool)`, against a contract fixed at genesis.

use alloy::primitives::{keccak256, Address};
use evml_common::error::{ConsensusError, Error};
use serde::{Deserialize, Serialize};

/// The identity and interface of the proof-of-authority contract, fixed once at genesis
/// load and read-only for the rest of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoaConfig {
    pub address: Address,
    pub abi: String,
}

impl PoaConfig {
    pub fn new(address: Address, abi: String) -> Self {
        Self { address, abi }
    }
}

/// The four-byte selector for `checkAuthorised(address)`: the first four bytes of
/// `keccak256("checkAuthorised(address)")`.
pub fn selector() -> [u8; 4] {
    let hash = keccak256(b"checkAuthorised(address)");
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

/// Packs a `checkAuthorised(address)` call: the selector followed by the address
/// left-padded to 32 bytes, per the standard Solidity ABI.
pub fn encode_check_authorised(address: Address) -> Vec<u8> {
    let mut out = Vec::with_capacity(36);
    out.extend_from_slice(&selector());
    out.extend_from_slice(&[0u8; 12]);
    out.extend_from_slice(address.as_slice());
    out
}

/// Unpacks a 32-byte ABI `bool` return value. Any non-zero big-endian word is `true`.
pub fn decode_bool_return(bytes: &[u8]) -> Result<bool, Error> {
    if bytes.len() != 32 {
        return Err(Error::Consensus(ConsensusError::VmSetup(
            "checkAuthorised did not return a single word".into(),
        )));
    }
    Ok(bytes.iter().any(|&b| b != 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_is_stable_and_four_bytes() {
        assert_eq!(selector(), selector());
        assert_eq!(selector().len(), 4);
    }

    #[test]
    fn encodes_address_left_padded_after_the_selector() {
        let address = Address::repeat_byte(0xab);
        let encoded = encode_check_authorised(address);
        assert_eq!(encoded.len(), 36);
        assert_eq!(&encoded[..4], &selector());
        assert_eq!(&encoded[4..16], &[0u8; 12]);
        assert_eq!(&encoded[16..], address.as_slice());
    }

    #[test]
    fn decodes_nonzero_word_as_true() {
        let mut word = [0u8; 32];
        word[31] = 1;
        assert!(decode_bool_return(&word).unwrap());
    }

    #[test]
    fn decodes_zero_word_as_false() {
        assert!(!decode_bool_return(&[0u8; 32]).unwrap());
    }

    #[test]
    fn rejects_wrong_length_return() {
        assert!(decode_bool_return(&[0u8; 31]).is_err());
    }
}
