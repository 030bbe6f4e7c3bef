use std::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error};

use super::types::{Block, ExecutionResult, GasEstimate, StoredTransaction, SyncInfo};
use super::{Backend, BackendError, BackendResult, SyncSource};
use crate::emulator::block::BlockNumber;
use crate::translator::tx::CanonicalTransaction;

/// Error code the backend service uses for lookup misses.
pub const NOT_FOUND_CODE: i64 = -32001;

#[derive(Debug, Serialize)]
struct BackendRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct BackendRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<BackendRpcError>,
}

#[derive(Debug, Deserialize)]
struct BackendRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// Classify a JSON-RPC error object returned by the backend service.
fn classify_error(code: i64, message: &str, data: Option<&Value>) -> BackendError {
    if code == NOT_FOUND_CODE {
        match data.and_then(|d| d.get("kind")).and_then(Value::as_str) {
            Some("block") => return BackendError::BlockNotFound,
            Some("transaction") => return BackendError::TransactionNotFound,
            Some("account") => return BackendError::AccountNotFound,
            _ => {}
        }
    }
    BackendError::Other(format!("backend error {}: {}", code, message))
}

/// Backend service client speaking the `backend_*` JSON-RPC methods.
pub struct RemoteBackend {
    http_client: Client,
    rpc_url: String,
    next_id: AtomicU64,
}

impl RemoteBackend {
    pub fn new(rpc_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            rpc_url: rpc_url.to_string(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Send one JSON-RPC request and decode its result.
    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> BackendResult<T> {
        let request = BackendRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!("Sending backend request: method={}, id={}", method, request.id);

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Backend request {} failed: {}", method, e);
                BackendError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Backend returned HTTP {}: {}", status, body);
            return Err(BackendError::Unavailable(format!("HTTP {}: {}", status, body)));
        }

        let rpc_response: BackendRpcResponse = response.json().await.map_err(|e| {
            BackendError::Other(format!("failed to parse {} response: {}", method, e))
        })?;

        if let Some(err) = rpc_response.error {
            let classified = classify_error(err.code, &err.message, err.data.as_ref());
            if !matches!(
                classified,
                BackendError::BlockNotFound
                    | BackendError::TransactionNotFound
                    | BackendError::AccountNotFound
            ) {
                error!(
                    "Backend error: method={}, code={}, message={}",
                    method, err.code, err.message
                );
            }
            return Err(classified);
        }

        let result = rpc_response.result.unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| BackendError::Other(format!("malformed {} result: {}", method, e)))
    }
}

#[async_trait]
impl Backend for RemoteBackend {
    async fn latest_height(&self) -> BackendResult<u64> {
        self.request("backend_latestHeight", json!([])).await
    }

    async fn current_block(&self) -> BackendResult<Block> {
        self.request("backend_currentBlock", json!([])).await
    }

    async fn block_by_number(&self, number: u64) -> BackendResult<Block> {
        self.request("backend_blockByNumber", json!([number])).await
    }

    async fn block_by_hash(&self, hash: B256) -> BackendResult<Block> {
        self.request("backend_blockByHash", json!([hash])).await
    }

    async fn balance(&self, address: Address, height: BlockNumber) -> BackendResult<U256> {
        self.request("backend_balance", json!([address, height.value()]))
            .await
    }

    async fn code(&self, address: Address, height: BlockNumber) -> BackendResult<Bytes> {
        self.request("backend_code", json!([address, height.value()])).await
    }

    async fn storage_at(
        &self,
        address: Address,
        key: B256,
        height: BlockNumber,
    ) -> BackendResult<Bytes> {
        self.request("backend_storageAt", json!([address, key, height.value()]))
            .await
    }

    async fn nonce(&self, address: Address, height: BlockNumber) -> BackendResult<u64> {
        self.request("backend_nonce", json!([address, height.value()])).await
    }

    async fn transaction(&self, hash: B256) -> BackendResult<StoredTransaction> {
        self.request("backend_transaction", json!([hash])).await
    }

    async fn transactions_by_height(&self, height: u64) -> BackendResult<Vec<StoredTransaction>> {
        self.request("backend_transactionsByHeight", json!([height]))
            .await
    }

    async fn call(
        &self,
        tx: &CanonicalTransaction,
        sender: Address,
    ) -> BackendResult<ExecutionResult> {
        self.request("backend_call", json!([tx, sender])).await
    }

    async fn estimate_gas(
        &self,
        tx: &CanonicalTransaction,
        sender: Address,
    ) -> BackendResult<GasEstimate> {
        self.request("backend_estimateGas", json!([tx, sender])).await
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> BackendResult<B256> {
        let raw_hex = format!("0x{}", hex::encode(raw));
        self.request("backend_sendRawTransaction", json!([raw_hex]))
            .await
    }

    async fn chain_id(&self) -> BackendResult<u64> {
        self.request("backend_chainId", json!([])).await
    }

    async fn protocol_version(&self) -> BackendResult<u64> {
        self.request("backend_protocolVersion", json!([])).await
    }
}

#[async_trait]
impl SyncSource for RemoteBackend {
    async fn sync_info(&self) -> BackendResult<SyncInfo> {
        self.request("backend_syncInfo", json!([])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found_kinds() {
        let kind = |k: &str| json!({ "kind": k });
        assert_eq!(
            classify_error(NOT_FOUND_CODE, "missing", Some(&kind("block"))),
            BackendError::BlockNotFound
        );
        assert_eq!(
            classify_error(NOT_FOUND_CODE, "missing", Some(&kind("transaction"))),
            BackendError::TransactionNotFound
        );
        assert_eq!(
            classify_error(NOT_FOUND_CODE, "missing", Some(&kind("account"))),
            BackendError::AccountNotFound
        );
    }

    #[test]
    fn test_classify_other_errors() {
        assert_eq!(
            classify_error(NOT_FOUND_CODE, "missing", None),
            BackendError::Other("backend error -32001: missing".to_string())
        );
        assert_eq!(
            classify_error(-32000, "boom", Some(&json!({ "kind": "block" }))),
            BackendError::Other("backend error -32000: boom".to_string())
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        // Port 9 (discard) is closed on test hosts.
        let backend = RemoteBackend::new("http://127.0.0.1:9");
        assert!(matches!(
            backend.latest_height().await,
            Err(BackendError::Unavailable(_))
        ));
    }
}
