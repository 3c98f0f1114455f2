use std::collections::BTreeMap;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// One entry of the `alloc` section: an account to create at genesis. `code` and the
/// `storage` values are hex strings; `balance` is a currency string (see `evml-currency`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisAccount {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub storage: BTreeMap<String, String>,
    pub balance: String,
    #[serde(default)]
    pub nonce: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoaSection {
    pub address: Address,
    pub balance: String,
    #[serde(default)]
    pub abi: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisDoc {
    #[serde(default)]
    pub alloc: BTreeMap<Address, GenesisAccount>,
    #[serde(default)]
    pub poa: Option<PoaSection>,
}

impl GenesisDoc {
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_document() {
        let json = r#"{
            "alloc": {
                "0x0000000000000000000000000000000000000001": { "balance": "1000T" }
            }
        }"#;
        let doc = GenesisDoc::from_json(json.as_bytes()).unwrap();
        assert_eq!(doc.alloc.len(), 1);
        assert!(doc.poa.is_none());
    }

    #[test]
    fn parses_the_poa_section() {
        let json = r#"{
            "alloc": {},
            "poa": {
                "address": "0x1337133713371337133713371337133713371337",
                "balance": "0",
                "abi": "[{\"name\":\"checkAuthorised\"}]",
                "code": "0x6080"
            }
        }"#;
        let doc = GenesisDoc::from_json(json.as_bytes()).unwrap();
        let poa = doc.poa.unwrap();
        assert_eq!(poa.code, "0x6080");
    }
}
