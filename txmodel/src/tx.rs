use alloy::primitives::{keccak256, Address, Bytes, Signature, B256, U256};
use alloy_rlp::{Buf, BufMut, Decodable, Encodable, Header};
use evml_common::error::{BadSignature, DecodeError, Error};
use evml_common::CHAIN_ID;

use crate::receipt::Receipt;

/// A decoded, sender-recovered, EIP-155-signed transaction. Owns the receipt once one
/// has been produced by the view that applied it.
#[derive(Debug, Clone)]
pub struct TxWrapper {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    v: u64,
    r: U256,
    s: U256,
    rlp_bytes: Bytes,
    hash: B256,
    from: Address,
    pub receipt: Option<Receipt>,
}

/// The message shape the EVM actually executes; derived once from a [`TxWrapper`].
#[derive(Debug, Clone)]
pub struct Message {
    pub from: Address,
    pub to: Option<Address>,
    pub gas_limit: u64,
    pub gas_price: U256,
    pub value: U256,
    pub data: Bytes,
    pub nonce: u64,
    pub check_nonce: bool,
}

fn decode_opt_address(buf: &mut &[u8]) -> alloy_rlp::Result<Option<Address>> {
    let header = Header::decode(buf)?;
    if header.payload_length == 0 {
        return Ok(None);
    }
    if header.payload_length != 20 {
        return Err(alloy_rlp::Error::UnexpectedLength);
    }
    let address = Address::from_slice(&buf[..20]);
    buf.advance(20);
    Ok(Some(address))
}

fn encode_opt_address(addr: &Option<Address>, out: &mut dyn BufMut) {
    match addr {
        Some(addr) => addr.encode(out),
        None => out.put_u8(alloy_rlp::EMPTY_STRING_CODE),
    }
}

fn opt_address_length(addr: &Option<Address>) -> usize {
    match addr {
        Some(addr) => addr.length(),
        None => 1,
    }
}

impl TxWrapper {
    /// Decodes an RLP-encoded signed legacy transaction and recovers its sender under
    /// the fixed chain id.
    pub fn from_rlp(bytes: &[u8]) -> Result<Self, Error> {
        let mut buf = bytes;
        let header = Header::decode(&mut buf).map_err(|_| Error::Decode(DecodeError::Rlp))?;
        if !header.list {
            return Err(Error::Decode(DecodeError::Rlp));
        }
        let payload_view = &mut &buf[..header.payload_length];

        let nonce = u64::decode(payload_view).map_err(|_| Error::Decode(DecodeError::Rlp))?;
        let gas_price = U256::decode(payload_view).map_err(|_| Error::Decode(DecodeError::Rlp))?;
        let gas_limit = u64::decode(payload_view).map_err(|_| Error::Decode(DecodeError::Rlp))?;
        let to = decode_opt_address(payload_view).map_err(|_| Error::Decode(DecodeError::Rlp))?;
        let value = U256::decode(payload_view).map_err(|_| Error::Decode(DecodeError::Rlp))?;
        let data: Bytes = Bytes::decode(payload_view).map_err(|_| Error::Decode(DecodeError::Rlp))?;
        let v = u64::decode(payload_view).map_err(|_| Error::Decode(DecodeError::Rlp))?;
        let r = U256::decode(payload_view).map_err(|_| Error::Decode(DecodeError::Rlp))?;
        let s = U256::decode(payload_view).map_err(|_| Error::Decode(DecodeError::Rlp))?;

        if v != 2 * CHAIN_ID + 35 && v != 2 * CHAIN_ID + 36 {
            return Err(Error::BadSignature(BadSignature::WrongChainId {
                given: (v.saturating_sub(35)) / 2,
                expected: CHAIN_ID,
            }));
        }
        let y_parity = v - (2 * CHAIN_ID + 35) == 1;

        let signing_hash = Self::signing_hash(nonce, gas_price, gas_limit, to, value, &data);
        let signature = Signature::new(r, s, y_parity);
        let from = signature
            .recover_address_from_prehash(&signing_hash)
            .map_err(|_| Error::BadSignature(BadSignature::InvalidRecovery))?;

        let hash = keccak256(bytes);

        Ok(Self {
            nonce,
            gas_price,
            gas_limit,
            to,
            value,
            data,
            v,
            r,
            s,
            rlp_bytes: Bytes::copy_from_slice(bytes),
            hash,
            from,
            receipt: None,
        })
    }

    fn signing_hash(
        nonce: u64,
        gas_price: U256,
        gas_limit: u64,
        to: Option<Address>,
        value: U256,
        data: &Bytes,
    ) -> B256 {
        let payload_length = nonce.length()
            + gas_price.length()
            + gas_limit.length()
            + opt_address_length(&to)
            + value.length()
            + data.length()
            + CHAIN_ID.length()
            + 0u8.length()
            + 0u8.length();
        let mut out = Vec::new();
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        nonce.encode(&mut out);
        gas_price.encode(&mut out);
        gas_limit.encode(&mut out);
        encode_opt_address(&to, &mut out);
        value.encode(&mut out);
        data.encode(&mut out);
        CHAIN_ID.encode(&mut out);
        0u8.encode(&mut out);
        0u8.encode(&mut out);
        keccak256(out)
    }

    pub fn hash(&self) -> B256 {
        self.hash
    }

    pub fn from(&self) -> Address {
        self.from
    }

    pub fn rlp_bytes(&self) -> &Bytes {
        &self.rlp_bytes
    }

    pub fn as_message(&self, check_nonce: bool) -> Message {
        Message {
            from: self.from,
            to: self.to,
            gas_limit: self.gas_limit,
            gas_price: self.gas_price,
            value: self.value,
            data: self.data.clone(),
            nonce: self.nonce,
            check_nonce,
        }
    }

    /// Projects the attached receipt, if any, to the external JSON shape.
    pub fn to_json_receipt(&self) -> Option<crate::receipt::JsonReceipt> {
        self.receipt
            .as_ref()
            .map(|receipt| receipt.to_json(self.from, self.to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::{local::PrivateKeySigner, SignerSync};

    fn sign_legacy(
        nonce: u64,
        gas_price: U256,
        gas_limit: u64,
        to: Option<Address>,
        value: U256,
        data: Bytes,
        signer: &PrivateKeySigner,
    ) -> Vec<u8> {
        let signing_hash = TxWrapper::signing_hash(nonce, gas_price, gas_limit, to, value, &data);
        let signature = signer.sign_hash_sync(&signing_hash).unwrap();
        let v = 2 * CHAIN_ID + 35 + signature.v() as u64;

        let payload_length = nonce.length()
            + gas_price.length()
            + gas_limit.length()
            + opt_address_length(&to)
            + value.length()
            + data.length()
            + v.length()
            + signature.r().length()
            + signature.s().length();
        let mut out = Vec::new();
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        nonce.encode(&mut out);
        gas_price.encode(&mut out);
        gas_limit.encode(&mut out);
        encode_opt_address(&to, &mut out);
        value.encode(&mut out);
        data.encode(&mut out);
        v.encode(&mut out);
        signature.r().encode(&mut out);
        signature.s().encode(&mut out);
        out
    }

    #[test]
    fn decodes_and_recovers_sender() {
        let signer = PrivateKeySigner::random();
        let expected_from = signer.address();
        let bytes = sign_legacy(
            0,
            U256::ZERO,
            21000,
            Some(Address::repeat_byte(2)),
            U256::from(1_000u64),
            Bytes::new(),
            &signer,
        );

        let tx = TxWrapper::from_rlp(&bytes).unwrap();
        assert_eq!(tx.from(), expected_from);
        assert_eq!(tx.nonce, 0);
        assert_eq!(tx.to, Some(Address::repeat_byte(2)));
    }

    #[test]
    fn contract_creation_has_no_recipient() {
        let signer = PrivateKeySigner::random();
        let bytes = sign_legacy(
            1,
            U256::ZERO,
            1_000_000,
            None,
            U256::ZERO,
            Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]),
            &signer,
        );

        let tx = TxWrapper::from_rlp(&bytes).unwrap();
        assert_eq!(tx.to, None);
    }

    #[test]
    fn wrong_chain_id_is_rejected() {
        let signer = PrivateKeySigner::random();
        let signing_hash =
            TxWrapper::signing_hash(0, U256::ZERO, 21000, None, U256::ZERO, &Bytes::new());
        let signature = signer.sign_hash_sync(&signing_hash).unwrap();
        // Use a v computed for chain id 2 instead of the fixed chain id 1.
        let v = 2 * 2 + 35 + signature.v() as u64;

        let payload_length = 0u64.length()
            + U256::ZERO.length()
            + 21000u64.length()
            + 1usize
            + U256::ZERO.length()
            + Bytes::new().length()
            + v.length()
            + signature.r().length()
            + signature.s().length();
        let mut out = Vec::new();
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        0u64.encode(&mut out);
        U256::ZERO.encode(&mut out);
        21000u64.encode(&mut out);
        out.put_u8(alloy_rlp::EMPTY_STRING_CODE);
        U256::ZERO.encode(&mut out);
        Bytes::new().encode(&mut out);
        v.encode(&mut out);
        signature.r().encode(&mut out);
        signature.s().encode(&mut out);

        let result = TxWrapper::from_rlp(&out);
        assert!(matches!(result, Err(Error::BadSignature(_))));
    }
}
