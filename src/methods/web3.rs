use serde_json::Value;
use tracing::debug;

use crate::error::RpcError;
use crate::translator::hexutil::{format_hash, parse_bytes, required};
use crate::translator::tx::keccak256;

/// Handler for web3_clientVersion
/// Returns the client version string.
pub async fn client_version() -> Result<Value, RpcError> {
    let version = format!("eth-facade/v{}", env!("CARGO_PKG_VERSION"));
    debug!("web3_clientVersion -> {}", version);
    Ok(Value::String(version))
}

/// Handler for web3_sha3
/// Returns the Keccak-256 hash of the given data.
pub async fn sha3(params: &[Value]) -> Result<Value, RpcError> {
    let data = parse_bytes(required(params, 0, "data")?)?;
    let result = format_hash(&keccak256(&data));

    debug!("web3_sha3: input_len={} -> {}", data.len(), result);
    Ok(Value::String(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_sha3_of_empty_input() {
        let hash = sha3(&[json!("0x")]).await.unwrap();
        assert_eq!(
            hash,
            json!("0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
        );
    }

    #[tokio::test]
    async fn test_sha3_rejects_bad_hex() {
        assert!(sha3(&[json!("0xzz")]).await.is_err());
        assert!(sha3(&[]).await.is_err());
    }

    #[tokio::test]
    async fn test_client_version_names_crate() {
        let version = client_version().await.unwrap();
        assert!(version.as_str().unwrap().starts_with("eth-facade/v"));
    }
}
