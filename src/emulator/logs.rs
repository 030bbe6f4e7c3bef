use serde::{Deserialize, Serialize};

use crate::backend::{Log, StoredTransaction};
use crate::translator::hexutil::{format_address, format_bytes, format_hash, format_u64};

/// EVM-formatted log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: String,
    pub transaction_hash: String,
    pub transaction_index: String,
    pub block_hash: String,
    pub log_index: String,
    pub removed: bool,
}

impl RpcLog {
    pub fn from_log(log: &Log, tx: &StoredTransaction) -> Self {
        RpcLog {
            address: format_address(&log.address),
            topics: log.topics.iter().map(format_hash).collect(),
            data: format_bytes(&log.data),
            block_number: format_u64(tx.block_number),
            transaction_hash: format_hash(&tx.hash),
            transaction_index: format_u64(tx.transaction_index),
            block_hash: format_hash(&tx.block_hash),
            log_index: format_u64(log.log_index),
            removed: false,
        }
    }
}

/// Logs of a transaction in emission order.
pub fn transaction_logs(tx: &StoredTransaction) -> Vec<RpcLog> {
    tx.logs.iter().map(|log| RpcLog::from_log(log, tx)).collect()
}

/// A 256-byte bloom as hex; an absent bloom is all zeroes.
pub fn format_bloom(bloom: &[u8]) -> String {
    if bloom.is_empty() {
        format!("0x{}", "0".repeat(512))
    } else {
        format_bytes(bloom)
    }
}
