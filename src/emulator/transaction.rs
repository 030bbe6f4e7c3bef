use serde::{Deserialize, Serialize};

use crate::backend::StoredTransaction;
use crate::translator::hexutil::{format_address, format_bytes, format_hash, format_u256, format_u64};

use super::logs::{format_bloom, transaction_logs, RpcLog};

/// EVM-formatted transaction object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub block_hash: String,
    pub block_number: String,
    pub from: String,
    pub gas: String,
    pub gas_price: String,
    pub hash: String,
    pub input: String,
    pub nonce: String,
    /// null for contract creation
    pub to: Option<String>,
    pub transaction_index: String,
    pub value: String,
    pub v: String,
    pub r: String,
    pub s: String,
}

impl RpcTransaction {
    pub fn from_stored(tx: &StoredTransaction) -> Self {
        RpcTransaction {
            block_hash: format_hash(&tx.block_hash),
            block_number: format_u64(tx.block_number),
            from: format_address(&tx.from),
            gas: format_u64(tx.gas),
            gas_price: format_u256(tx.gas_price),
            hash: format_hash(&tx.hash),
            input: format_bytes(&tx.input),
            nonce: format_u64(tx.nonce),
            to: tx.to.as_ref().map(format_address),
            transaction_index: format_u64(tx.transaction_index),
            value: format_u256(tx.value),
            v: format_u256(tx.v),
            r: format_u256(tx.r),
            s: format_u256(tx.s),
        }
    }
}

/// EVM-formatted transaction receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    pub transaction_hash: String,
    pub transaction_index: String,
    pub block_hash: String,
    pub block_number: String,
    pub from: String,
    pub to: Option<String>,
    pub cumulative_gas_used: String,
    pub gas_used: String,
    /// Set only when the transaction created a contract
    pub contract_address: Option<String>,
    pub logs: Vec<RpcLog>,
    pub logs_bloom: String,
    /// 0x1 success, 0x0 failure
    pub status: String,
}

impl RpcReceipt {
    pub fn from_stored(tx: &StoredTransaction) -> Self {
        RpcReceipt {
            transaction_hash: format_hash(&tx.hash),
            transaction_index: format_u64(tx.transaction_index),
            block_hash: format_hash(&tx.block_hash),
            block_number: format_u64(tx.block_number),
            from: format_address(&tx.from),
            to: tx.to.as_ref().map(format_address),
            cumulative_gas_used: format_u64(tx.cumulative_gas_used),
            gas_used: format_u64(tx.gas_used),
            contract_address: tx.contract_address.as_ref().map(format_address),
            logs: transaction_logs(tx),
            logs_bloom: format_bloom(&tx.logs_bloom),
            status: format_u64(if tx.status == 1 { 1 } else { 0 }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Log;
    use alloy_primitives::{Address, Bytes, B256, U256};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn creation_tx() -> StoredTransaction {
        StoredTransaction {
            hash: B256::repeat_byte(0x01),
            transaction_index: 2,
            block_hash: B256::repeat_byte(0x02),
            block_number: 7,
            nonce: 3,
            from: Address::repeat_byte(0x0a),
            to: None,
            value: U256::from(1000),
            gas_price: U256::from(20_000_000_000u64),
            gas: 100_000,
            input: Bytes::from(vec![0x60, 0x80]),
            v: U256::from(37),
            r: U256::from(1),
            s: U256::from(2),
            cumulative_gas_used: 90_000,
            gas_used: 60_000,
            contract_address: Some(Address::repeat_byte(0x0c)),
            logs: vec![Log {
                address: Address::repeat_byte(0x0c),
                topics: vec![B256::repeat_byte(0xee)],
                data: Bytes::new(),
                log_index: 4,
            }],
            logs_bloom: Bytes::new(),
            status: 1,
        }
    }

    #[test]
    fn test_transaction_shape() {
        let value = serde_json::to_value(RpcTransaction::from_stored(&creation_tx())).unwrap();
        assert_eq!(value["to"], json!(null));
        assert_eq!(value["nonce"], "0x3");
        assert_eq!(value["gasPrice"], "0x4a817c800");
        assert_eq!(value["input"], "0x6080");
        assert_eq!(value["transactionIndex"], "0x2");
        assert_eq!(value["v"], "0x25");
    }

    #[test]
    fn test_receipt_shape() {
        let value = serde_json::to_value(RpcReceipt::from_stored(&creation_tx())).unwrap();
        assert_eq!(value["status"], "0x1");
        assert_eq!(value["gasUsed"], "0xea60");
        assert_eq!(
            value["contractAddress"],
            json!(format!("0x{}", "0c".repeat(20)))
        );
        assert_eq!(value["logs"][0]["logIndex"], "0x4");
        assert_eq!(value["logs"][0]["blockNumber"], "0x7");
        assert_eq!(value["logs"][0]["removed"], json!(false));
        assert_eq!(value["logsBloom"].as_str().unwrap().len(), 514);
    }

    #[test]
    fn test_failed_receipt_status() {
        let mut tx = creation_tx();
        tx.status = 0;
        tx.contract_address = None;
        let receipt = RpcReceipt::from_stored(&tx);
        assert_eq!(receipt.status, "0x0");
        assert_eq!(receipt.contract_address, None);
    }
}
