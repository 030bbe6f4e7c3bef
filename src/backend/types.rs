use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// A block as the backend stores it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    pub miner: Address,
    pub timestamp: u64,
    pub size: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub state_root: B256,
    pub transactions_root: B256,
    /// Transaction hashes in execution order
    #[serde(default)]
    pub transactions: Vec<B256>,
}

/// An event emitted during execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    /// Position of the log within its block
    pub log_index: u64,
}

/// An executed transaction with its block context and receipt data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTransaction {
    pub hash: B256,
    pub transaction_index: u64,
    pub block_hash: B256,
    pub block_number: u64,
    pub nonce: u64,
    pub from: Address,
    /// None for contract creation
    pub to: Option<Address>,
    pub value: U256,
    pub gas_price: U256,
    pub gas: u64,
    pub input: Bytes,
    pub v: U256,
    pub r: U256,
    pub s: U256,
    pub cumulative_gas_used: u64,
    pub gas_used: u64,
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub logs: Vec<Log>,
    /// 256-byte bloom; empty means no logs
    #[serde(default)]
    pub logs_bloom: Bytes,
    /// 1 on success, 0 on failure
    pub status: u64,
}

/// Outcome of a read-only execution.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// EVMC status code, see [`crate::error::status_is_failure`]
    pub status: i32,
    pub output: Bytes,
}

/// Outcome of a gas estimation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    pub status: i32,
    pub output: Bytes,
    pub gas_used: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncInfo {
    pub catching_up: bool,
    pub latest_block_height: u64,
}
