use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{keccak256, Address, B256, U256};
use eth_trie::{EthTrie, Trie};
use evml_common::error::{ConsensusError, Error};
use evml_storage::{KvStore, RocksEthTrieDb, CODE_CF, STORAGE_CF};
use evml_txmodel::account::Account;
use revm::primitives::{AccountInfo, Bytecode, KECCAK_EMPTY};
use revm::{Database, DatabaseCommit};

/// `revm::Database` backed by the account trie plus two flat column families for
/// contract code and account storage slots.
///
/// Storage slots are kept as a flat `keccak256(address || slot) -> value` map rather
/// than a per-account Merkle trie; only the account trie root is part of the commit
/// invariant here, so this keeps node lookups to one KV round trip per slot.
pub struct TrieDatabase<'a> {
    trie: &'a mut EthTrie<RocksEthTrieDb>,
    store: Arc<KvStore>,
}

impl<'a> TrieDatabase<'a> {
    pub fn new(trie: &'a mut EthTrie<RocksEthTrieDb>, store: Arc<KvStore>) -> Self {
        Self { trie, store }
    }

    fn storage_key(address: Address, index: U256) -> [u8; 32] {
        let mut buf = [0u8; 52];
        buf[..20].copy_from_slice(address.as_slice());
        buf[20..].copy_from_slice(&index.to_be_bytes::<32>());
        keccak256(buf).0
    }

    pub fn set_account(&mut self, address: Address, account: &Account) -> Result<(), Error> {
        self.trie
            .insert(address.as_slice(), &account.serialize())
            .map_err(|e| Error::Storage(evml_common::error::StorageError::Trie(e.to_string())))
    }

    pub fn get_account(&mut self, address: Address) -> Result<Option<Account>, Error> {
        let bytes = self
            .trie
            .get(address.as_slice())
            .map_err(|e| Error::Storage(evml_common::error::StorageError::Trie(e.to_string())))?;
        bytes
            .map(|b| Account::try_deserialize(&b))
            .transpose()
            .map_err(|_| Error::Storage(evml_common::error::StorageError::Trie("malformed account".into())))
    }

    pub fn set_code(&self, code_hash: B256, code: &[u8]) -> Result<(), Error> {
        if code_hash == KECCAK_EMPTY {
            return Ok(());
        }
        self.store.put(CODE_CF, code_hash.as_slice(), code)
    }

    pub fn set_storage(&self, address: Address, index: U256, value: U256) -> Result<(), Error> {
        let key = Self::storage_key(address, index);
        self.store.put(STORAGE_CF, &key, &value.to_be_bytes::<32>())
    }
}

impl<'a> Database for TrieDatabase<'a> {
    type Error = Error;

    fn basic(&mut self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        let account = self.get_account(address)?;
        Ok(account.map(|a| AccountInfo {
            balance: a.balance,
            nonce: a.nonce,
            code_hash: a.code_hash,
            code: None,
        }))
    }

    fn code_by_hash(&mut self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        if code_hash == KECCAK_EMPTY {
            return Ok(Bytecode::default());
        }
        let bytes = self
            .store
            .get(CODE_CF, code_hash.as_slice())?
            .ok_or_else(|| Error::not_found(format!("code {code_hash}")))?;
        Ok(Bytecode::new_raw(bytes.into()))
    }

    fn storage(&mut self, address: Address, index: U256) -> Result<U256, Self::Error> {
        let key = Self::storage_key(address, index);
        let bytes = self.store.get(STORAGE_CF, &key)?;
        Ok(bytes
            .map(|b| U256::from_be_slice(&b))
            .unwrap_or(U256::ZERO))
    }

    fn block_hash(&mut self, _number: u64) -> Result<B256, Self::Error> {
        Ok(B256::ZERO)
    }
}

impl<'a> DatabaseCommit for TrieDatabase<'a> {
    /// Applies the EVM's state diff the same way the teacher's `evm-ext` extracts EVM
    /// state changes from `revm::primitives::Account`: skip untouched accounts, write
    /// code once per unique hash, then the account entry, using `changed_storage_slots()`
    /// for the slots that actually moved.
    fn commit(&mut self, changes: HashMap<Address, revm::primitives::Account>) {
        for (address, account) in changes {
            if !account.is_touched() {
                continue;
            }
            if account.is_selfdestructed() {
                if let Err(e) = self.trie.remove(address.as_slice()) {
                    tracing::warn!(%address, error = %e, "failed to remove self-destructed account");
                }
                continue;
            }

            if let Some(code) = &account.info.code {
                if account.info.code_hash != KECCAK_EMPTY {
                    if let Err(e) = self.set_code(account.info.code_hash, code.original_bytes().as_ref()) {
                        tracing::warn!(code_hash = %account.info.code_hash, error = %e, "failed to persist code");
                    }
                }
            }

            for (index, slot) in account.changed_storage_slots() {
                if let Err(e) = self.set_storage(address, *index, slot.present_value) {
                    tracing::warn!(%address, %index, error = %e, "failed to persist storage slot");
                }
            }

            let stored = Account {
                nonce: account.info.nonce,
                balance: account.info.balance,
                storage_root: B256::ZERO,
                code_hash: account.info.code_hash,
            };
            if let Err(e) = self.set_account(address, &stored) {
                tracing::warn!(%address, error = %e, "failed to persist account");
            }
        }
    }
}

/// The outcome of running the EVM against a [`TrieDatabase`].
pub struct ExecutionOutcome {
    pub success: bool,
    pub gas_used: u64,
    pub output: Vec<u8>,
    pub logs: Vec<revm::primitives::Log>,
    pub created_address: Option<Address>,
}

/// Wraps the engine's "the VM refused this message entirely" case apart from "the VM ran
/// the message and it reverted", matching the consensus-vs-execution distinction from
/// the transaction state machine.
pub enum ApplyOutcome {
    Consensus(ConsensusError),
    Ran(ExecutionOutcome),
}

pub struct BlockContext {
    pub number: u64,
    pub coinbase: Address,
    pub gas_limit: u64,
    pub base_fee: U256,
}

pub struct CallParams {
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
    pub gas_limit: u64,
    pub gas_price: U256,
    pub nonce: u64,
    pub check_nonce: bool,
}

/// Executes one message against `db` within `block`. Distinguishes messages the VM
/// refuses to run at all (bad nonce, insufficient balance, out of gas) from messages it
/// runs to completion, successfully or not. On success, the returned state diff is
/// committed into `db` before this returns, so the trie/KV reflect the execution.
pub fn execute<'a>(
    db: &mut TrieDatabase<'a>,
    params: CallParams,
    block: &BlockContext,
) -> ApplyOutcome {
    use revm::primitives::{BlockEnv, CfgEnv, TransactTo, TxEnv};

    let mut tx_env = TxEnv::default();
    tx_env.caller = params.from;
    tx_env.gas_limit = params.gas_limit;
    tx_env.gas_price = params.gas_price;
    tx_env.value = params.value;
    tx_env.data = params.data.into();
    tx_env.nonce = if params.check_nonce {
        Some(params.nonce)
    } else {
        None
    };
    tx_env.transact_to = match params.to {
        Some(to) => TransactTo::Call(to),
        None => TransactTo::Create,
    };

    let mut block_env = BlockEnv::default();
    block_env.number = U256::from(block.number);
    block_env.coinbase = block.coinbase;
    block_env.gas_limit = U256::from(block.gas_limit);
    block_env.basefee = block.base_fee;

    let mut cfg = CfgEnv::default();
    cfg.chain_id = evml_common::CHAIN_ID;
    cfg.disable_block_gas_limit = true;

    let mut evm = revm::Evm::builder()
        .with_db(&mut *db)
        .with_tx_env(tx_env)
        .with_block_env(block_env)
        .with_cfg_env(cfg)
        .build();

    let transact_result = evm.transact();
    drop(evm);

    match transact_result {
        Ok(result) => {
            let created_address = result.result.created_address();
            let success = result.result.is_success();
            let gas_used = result.result.gas_used();
            let output = result.result.output().map(|b| b.to_vec()).unwrap_or_default();
            let logs = result.result.logs().to_vec();
            db.commit(result.state);
            ApplyOutcome::Ran(ExecutionOutcome {
                success,
                gas_used,
                output,
                logs,
                created_address,
            })
        }
        Err(_) => ApplyOutcome::Consensus(ConsensusError::VmSetup(
            "transaction rejected before execution".into(),
        )),
    }
}
