use serde_json::Value;
use tracing::debug;

use crate::backend::Backend;
use crate::error::RpcError;

/// Handler for net_version
/// Returns the network version (backend chain ID as decimal string).
pub async fn version(backend: &dyn Backend) -> Result<Value, RpcError> {
    let version = backend.chain_id().await?.to_string();
    debug!("net_version -> {}", version);
    Ok(Value::String(version))
}

/// Handler for net_listening
/// Returns true if the server is actively listening for connections.
pub async fn listening() -> Result<Value, RpcError> {
    Ok(Value::Bool(true))
}

/// Handler for net_peerCount
/// The facade has no peer-to-peer layer of its own.
pub async fn peer_count() -> Result<Value, RpcError> {
    Ok(Value::String("0x0".to_string()))
}
