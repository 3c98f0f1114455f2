use alloy::primitives::{Address, Bloom, BloomInput, Bytes, B256};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub transaction_hash: B256,
    pub transaction_index: u64,
    pub block_hash: B256,
}

/// The outcome of applying one transaction. `status = 1` means the EVM ran to
/// completion; `status = 0` means it reverted but is still persisted.
///
/// Field order matches the RLP encoding written to the `receipts` column family;
/// `contract_address` is last so its `Option` can use `#[rlp(trailing)]`.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
#[rlp(trailing)]
pub struct Receipt {
    pub root: B256,
    pub transaction_hash: B256,
    pub status: u8,
    pub gas_used: u64,
    pub cumulative_gas_used: u64,
    pub logs_bloom: Bloom,
    pub logs: Vec<Log>,
    pub contract_address: Option<Address>,
}

impl Receipt {
    /// Derives a bloom filter from this receipt's logs: every log's address and every
    /// topic is accrued, matching the standard Ethereum logs-bloom construction.
    pub fn bloom_from_logs(logs: &[Log]) -> Bloom {
        let mut bloom = Bloom::default();
        for log in logs {
            bloom.accrue(BloomInput::Raw(log.address.as_slice()));
            for topic in &log.topics {
                bloom.accrue(BloomInput::Raw(topic.as_slice()));
            }
        }
        bloom
    }

    pub fn to_json(&self, from: Address, to: Option<Address>) -> JsonReceipt {
        JsonReceipt {
            root: self.root,
            transaction_hash: self.transaction_hash,
            from,
            to,
            gas_used: self.gas_used,
            cumulative_gas_used: self.cumulative_gas_used,
            contract_address: self.contract_address,
            logs: self
                .logs
                .iter()
                .map(|log| JsonLog {
                    address: log.address,
                    topics: log.topics.clone(),
                    data: log.data.clone(),
                    transaction_hash: log.transaction_hash,
                    transaction_index: log.transaction_index,
                    block_hash: log.block_hash,
                })
                .collect(),
            logs_bloom: Bytes::copy_from_slice(self.logs_bloom.as_slice()),
            status: self.status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(rename = "transactionHash")]
    pub transaction_hash: B256,
    #[serde(rename = "transactionIndex")]
    pub transaction_index: u64,
    #[serde(rename = "blockHash")]
    pub block_hash: B256,
}

/// The receipt shape exposed over HTTP. `logs` is always `[]`, never `null`, when empty.
#[derive(Debug, Clone, Serialize)]
pub struct JsonReceipt {
    pub root: B256,
    #[serde(rename = "transactionHash")]
    pub transaction_hash: B256,
    pub from: Address,
    pub to: Option<Address>,
    #[serde(rename = "gasUsed")]
    pub gas_used: u64,
    #[serde(rename = "cumulativeGasUsed")]
    pub cumulative_gas_used: u64,
    #[serde(rename = "contractAddress")]
    pub contract_address: Option<Address>,
    pub logs: Vec<JsonLog>,
    #[serde(rename = "logsBloom")]
    pub logs_bloom: Bytes,
    pub status: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_receipt_never_has_null_logs() {
        let receipt = Receipt {
            root: B256::ZERO,
            transaction_hash: B256::ZERO,
            status: 1,
            gas_used: 21000,
            cumulative_gas_used: 21000,
            logs_bloom: Bloom::default(),
            logs: Vec::new(),
            contract_address: None,
        };
        let json = receipt.to_json(Address::ZERO, Some(Address::ZERO));
        let serialized = serde_json::to_value(&json).unwrap();
        assert_eq!(serialized["logs"], serde_json::json!([]));
    }
}
