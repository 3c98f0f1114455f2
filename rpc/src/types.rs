use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SendTxArgs {
    pub from: Address,
    pub to: Option<Address>,
    #[serde(default)]
    pub gas: u64,
    #[serde(default, rename = "gasPrice")]
    pub gas_price: U256,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub nonce: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct AccountQuery {
    #[serde(default, rename = "frompool")]
    pub from_pool: bool,
}

#[derive(Debug, Serialize)]
pub struct AccountInfo {
    pub address: Address,
    pub balance: U256,
    pub nonce: u64,
    pub bytecode: Bytes,
}

#[derive(Debug, Serialize)]
pub struct CallResult {
    pub data: Bytes,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct VersionInfo {
    #[serde(rename = "evm-lite")]
    pub evm_lite: String,
}

#[derive(Debug, Serialize)]
pub struct PoaInfo {
    pub address: Address,
    pub abi: String,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    #[serde(rename = "minGasPrice")]
    pub min_gas_price: String,
}
