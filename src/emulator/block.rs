use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::backend::{Block, StoredTransaction};
use crate::error::RpcError;
use crate::translator::hexutil::{format_address, format_hash, format_u64, parse_u64};

use super::transaction::RpcTransaction;

/// keccak256(rlp([])), the ommers hash of a block without uncles
pub const EMPTY_UNCLES_HASH: &str =
    "0x1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347";
/// Root of an empty Merkle-Patricia trie
pub const EMPTY_TRIE_ROOT: &str =
    "0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421";

/// Block number argument as clients send it.
///
/// Symbolic tags map to non-positive sentinels, and every non-positive
/// value resolves to the chain head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlockNumber(i64);

impl BlockNumber {
    pub const SAFE: BlockNumber = BlockNumber(-4);
    pub const FINALIZED: BlockNumber = BlockNumber(-3);
    pub const PENDING: BlockNumber = BlockNumber(-2);
    pub const LATEST: BlockNumber = BlockNumber(-1);
    pub const EARLIEST: BlockNumber = BlockNumber(0);

    pub fn value(self) -> i64 {
        self.0
    }

    /// The exact height to look up, or None for the chain head.
    pub fn height(self) -> Option<u64> {
        if self.0 <= 0 {
            None
        } else {
            Some(self.0 as u64)
        }
    }
}

impl From<u64> for BlockNumber {
    fn from(height: u64) -> Self {
        BlockNumber(i64::try_from(height).unwrap_or(i64::MAX))
    }
}

/// Parse a block number parameter: a tag or a hex quantity.
pub fn parse_block_number(param: &Value) -> Result<BlockNumber, RpcError> {
    match param.as_str() {
        Some("latest") => Ok(BlockNumber::LATEST),
        Some("pending") => Ok(BlockNumber::PENDING),
        Some("earliest") => Ok(BlockNumber::EARLIEST),
        Some("safe") => Ok(BlockNumber::SAFE),
        Some("finalized") => Ok(BlockNumber::FINALIZED),
        Some(_) => {
            let number = parse_u64(param, "block number")?;
            let number = i64::try_from(number).map_err(|_| {
                RpcError::invalid_params(format!("block number 0x{:x} out of range", number))
            })?;
            Ok(BlockNumber(number))
        }
        None => Err(RpcError::invalid_params(
            "block number must be a tag or hex string",
        )),
    }
}

/// Block parameter that defaults to `latest` when omitted.
pub fn parse_block_number_or_latest(param: Option<&Value>) -> Result<BlockNumber, RpcError> {
    param.map_or(Ok(BlockNumber::LATEST), parse_block_number)
}

/// EVM-formatted block object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    pub number: String,
    pub hash: String,
    pub parent_hash: String,
    /// Always zero, there is no proof of work
    pub nonce: String,
    pub sha3_uncles: String,
    pub logs_bloom: String,
    pub transactions_root: String,
    pub state_root: String,
    pub receipts_root: String,
    pub miner: String,
    pub difficulty: String,
    pub total_difficulty: String,
    pub extra_data: String,
    pub size: String,
    pub gas_limit: String,
    pub gas_used: String,
    pub timestamp: String,
    /// Hashes, or full objects when requested
    pub transactions: Value,
    pub uncles: Vec<String>,
}

impl RpcBlock {
    /// Shape a backend block. With `full_txs` the transaction bodies replace
    /// the hashes.
    pub fn from_block(block: &Block, full_txs: Option<&[StoredTransaction]>) -> Result<Self, RpcError> {
        let transactions = match full_txs {
            Some(txs) => {
                let objects = txs
                    .iter()
                    .map(|tx| serde_json::to_value(RpcTransaction::from_stored(tx)))
                    .collect::<Result<Vec<_>, _>>()?;
                Value::Array(objects)
            }
            None => Value::Array(
                block
                    .transactions
                    .iter()
                    .map(|h| Value::String(format_hash(h)))
                    .collect(),
            ),
        };

        debug!(
            "Shaped block: number={}, txs={}, full={}",
            block.number,
            block.transactions.len(),
            full_txs.is_some()
        );

        Ok(RpcBlock {
            number: format_u64(block.number),
            hash: format_hash(&block.hash),
            parent_hash: format_hash(&block.parent_hash),
            nonce: "0x0000000000000000".to_string(),
            sha3_uncles: EMPTY_UNCLES_HASH.to_string(),
            logs_bloom: format!("0x{}", "0".repeat(512)),
            transactions_root: format_hash(&block.transactions_root),
            state_root: format_hash(&block.state_root),
            receipts_root: EMPTY_TRIE_ROOT.to_string(),
            miner: format_address(&block.miner),
            difficulty: "0x0".to_string(),
            total_difficulty: "0x0".to_string(),
            extra_data: "0x".to_string(),
            size: format_u64(block.size),
            gas_limit: format_u64(block.gas_limit),
            gas_used: format_u64(block.gas_used),
            timestamp: format_u64(block.timestamp),
            transactions,
            uncles: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256};
    use serde_json::json;

    fn sample_block() -> Block {
        Block {
            number: 42,
            hash: B256::repeat_byte(0x42),
            parent_hash: B256::repeat_byte(0x41),
            miner: Address::ZERO,
            timestamp: 1_700_000_000,
            size: 512,
            gas_limit: 30_000_000,
            gas_used: 21_000,
            state_root: B256::ZERO,
            transactions_root: B256::ZERO,
            transactions: vec![B256::repeat_byte(0xaa)],
        }
    }

    #[test]
    fn test_parse_block_number_tags() {
        assert_eq!(parse_block_number(&json!("latest")).unwrap(), BlockNumber::LATEST);
        assert_eq!(parse_block_number(&json!("pending")).unwrap(), BlockNumber::PENDING);
        assert_eq!(parse_block_number(&json!("earliest")).unwrap(), BlockNumber::EARLIEST);
        assert_eq!(parse_block_number(&json!("safe")).unwrap(), BlockNumber::SAFE);
        assert_eq!(parse_block_number(&json!("finalized")).unwrap(), BlockNumber::FINALIZED);
        assert_eq!(parse_block_number(&json!("0xa")).unwrap().value(), 10);
        assert!(parse_block_number(&json!("newest")).is_err());
        assert!(parse_block_number(&json!(10)).is_err());
        assert!(parse_block_number(&json!("0xffffffffffffffff")).is_err());
    }

    #[test]
    fn test_non_positive_numbers_mean_head() {
        for tag in ["latest", "pending", "earliest", "safe", "finalized", "0x0"] {
            assert_eq!(parse_block_number(&json!(tag)).unwrap().height(), None, "{}", tag);
        }
        assert_eq!(parse_block_number(&json!("0x1")).unwrap().height(), Some(1));
    }

    #[test]
    fn test_missing_block_number_defaults_to_latest() {
        assert_eq!(parse_block_number_or_latest(None).unwrap(), BlockNumber::LATEST);
    }

    #[test]
    fn test_block_shape_with_hashes() {
        let block = RpcBlock::from_block(&sample_block(), None).unwrap();
        assert_eq!(block.number, "0x2a");
        assert_eq!(block.timestamp, "0x6553f100");
        assert_eq!(block.gas_used, "0x5208");
        assert_eq!(block.transactions, json!([format!("0x{}", "aa".repeat(32))]));
        assert!(block.uncles.is_empty());

        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["sha3Uncles"], EMPTY_UNCLES_HASH);
        assert_eq!(value["logsBloom"].as_str().unwrap().len(), 514);
        assert_eq!(value["parentHash"], format!("0x{}", "41".repeat(32)));
    }
}
