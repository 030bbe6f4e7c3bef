//! RPC error taxonomy and execution status mapping.
//!
//! Every handler returns [`RpcError`]; the server converts it into a
//! JSON-RPC error object at the boundary. Backend execution outcomes are
//! classified here by a pure function over `(status code, return data)`.

use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{Revert, SolError};
use jsonrpsee::types::ErrorObjectOwned;
use thiserror::Error;

use crate::backend::BackendError;
use crate::signer::SignerError;
use crate::translator::tx::DecodeError;

/// JSON-RPC error codes used by the facade.
pub mod error_code {
    /// Invalid method parameters (malformed hex, missing fields)
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error (backend or signer failure)
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Generic server error used by go-ethereum style nodes
    pub const SERVER_ERROR: i32 = -32000;
    /// Execution reverted, carries the revert data
    pub const EXECUTION_REVERTED: i32 = 3;
}

/// Errors surfaced to RPC clients.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Malformed client input.
    #[error("{0}")]
    InvalidParams(String),

    /// The backend reported a revert status.
    #[error("{message}")]
    ExecutionReverted { message: String, data: Bytes },

    /// The backend reported a non-revert failure status.
    #[error("{0}")]
    ExecutionFailed(String),

    /// `eth_sendTransaction` from an address without a registered key.
    #[error("unknown account: {}", .0.to_checksum(None))]
    UnknownAccount(Address),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RpcError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        RpcError::InvalidParams(message.into())
    }

    /// JSON-RPC error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            RpcError::InvalidParams(_) => error_code::INVALID_PARAMS,
            RpcError::ExecutionReverted { .. } => error_code::EXECUTION_REVERTED,
            RpcError::ExecutionFailed(_) | RpcError::UnknownAccount(_) => error_code::SERVER_ERROR,
            RpcError::Backend(_) | RpcError::Signer(_) | RpcError::Internal(_) => {
                error_code::INTERNAL_ERROR
            }
        }
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        RpcError::Internal(e.to_string())
    }
}

impl From<DecodeError> for RpcError {
    fn from(e: DecodeError) -> Self {
        RpcError::InvalidParams(format!("invalid transaction: {}", e))
    }
}

impl From<RpcError> for ErrorObjectOwned {
    fn from(err: RpcError) -> Self {
        let code = err.code();
        match err {
            RpcError::ExecutionReverted { message, data } => ErrorObjectOwned::owned(
                code,
                message,
                Some(format!("0x{}", hex::encode(&data))),
            ),
            other => ErrorObjectOwned::owned(code, other.to_string(), None::<()>),
        }
    }
}

/// EVMC status code for a successful execution.
pub const STATUS_SUCCESS: i32 = 0;
/// EVMC status code for an explicit revert.
pub const STATUS_REVERT: i32 = 2;

/// Whether a backend status code belongs to the failure class.
pub fn status_is_failure(code: i32) -> bool {
    code != STATUS_SUCCESS
}

/// Human readable name of an EVMC status code.
pub fn status_name(code: i32) -> &'static str {
    match code {
        0 => "success",
        1 => "failure",
        2 => "revert",
        3 => "out of gas",
        4 => "invalid instruction",
        5 => "undefined instruction",
        6 => "stack overflow",
        7 => "stack underflow",
        8 => "bad jump destination",
        9 => "invalid memory access",
        10 => "call depth exceeded",
        11 => "static mode violation",
        12 => "precompile failure",
        13 => "contract validation failure",
        14 => "argument out of range",
        15 => "wasm unreachable instruction",
        16 => "wasm trap",
        -1 => "internal error",
        -2 => "rejected",
        -3 => "out of memory",
        _ => "unknown status",
    }
}

/// Extract the `Error(string)` reason from revert data, if it has one.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    Revert::abi_decode(data, true).ok().map(|revert| revert.reason)
}

/// Map an execution outcome to `Ok(())` or the RPC error a client expects.
///
/// Reverts follow the go-ethereum convention: code 3, message
/// `execution reverted[: reason]`, and the raw return data as `data`.
pub fn check_execution(status: i32, output: &[u8]) -> Result<(), RpcError> {
    if !status_is_failure(status) {
        return Ok(());
    }

    if status == STATUS_REVERT {
        let message = match decode_revert_reason(output) {
            Some(reason) => format!("execution reverted: {}", reason),
            None => "execution reverted".to_string(),
        };
        return Err(RpcError::ExecutionReverted {
            message,
            data: Bytes::copy_from_slice(output),
        });
    }

    Err(RpcError::ExecutionFailed(status_name(status).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revert_data(reason: &str) -> Vec<u8> {
        Revert {
            reason: reason.to_string(),
        }
        .abi_encode()
    }

    #[test]
    fn test_success_is_not_failure() {
        assert!(!status_is_failure(0));
        assert!(status_is_failure(1));
        assert!(status_is_failure(2));
        assert!(status_is_failure(-1));
        assert!(check_execution(0, b"anything").is_ok());
    }

    #[test]
    fn test_revert_with_reason() {
        let data = revert_data("insufficient balance");
        let err = check_execution(STATUS_REVERT, &data).unwrap_err();
        assert_eq!(err.code(), error_code::EXECUTION_REVERTED);
        assert_eq!(err.to_string(), "execution reverted: insufficient balance");

        match err {
            RpcError::ExecutionReverted { data: payload, .. } => assert_eq!(payload.to_vec(), data),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_revert_without_reason() {
        let err = check_execution(STATUS_REVERT, &[0xde, 0xad]).unwrap_err();
        assert_eq!(err.to_string(), "execution reverted");
        assert_eq!(err.code(), 3);
    }

    #[test]
    fn test_non_revert_failure_uses_status_name() {
        let err = check_execution(3, &[]).unwrap_err();
        assert_eq!(err.to_string(), "out of gas");
        assert_eq!(err.code(), error_code::SERVER_ERROR);
    }

    #[test]
    fn test_revert_error_object_carries_data() {
        let data = revert_data("nope");
        let obj: ErrorObjectOwned = check_execution(STATUS_REVERT, &data).unwrap_err().into();
        assert_eq!(obj.code(), 3);
        assert_eq!(obj.message(), "execution reverted: nope");
        let raw = obj.data().expect("revert data").get();
        assert_eq!(raw, format!("\"0x{}\"", hex::encode(&data)));
    }

    #[test]
    fn test_unknown_account_message() {
        let addr = Address::repeat_byte(0xab);
        let err = RpcError::UnknownAccount(addr);
        assert!(err
            .to_string()
            .to_lowercase()
            .starts_with("unknown account: 0xabab"));
        assert_eq!(err.code(), -32000);
    }

    #[test]
    fn test_invalid_params_code() {
        let obj: ErrorObjectOwned = RpcError::invalid_params("bad hex").into();
        assert_eq!(obj.code(), -32602);
        assert_eq!(obj.message(), "bad hex");
    }
}
