//! Backend port: the chain engine the facade delegates to.
//!
//! The facade only ever sees these traits. `remote` talks to a backend
//! service over JSON-RPC; `memory` is an in-process chain for tests and demos.

pub mod memory;
pub mod remote;
pub mod types;

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use thiserror::Error;

use crate::emulator::block::BlockNumber;
use crate::translator::tx::CanonicalTransaction;

pub use memory::{Account, MemoryBackend, RecordedCall};
pub use remote::RemoteBackend;
pub use types::{Block, ExecutionResult, GasEstimate, Log, StoredTransaction, SyncInfo};

/// Failures reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("block not found")]
    BlockNotFound,

    #[error("transaction not found")]
    TransactionNotFound,

    #[error("account not found")]
    AccountNotFound,

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Chain state queries, execution and submission.
///
/// The `height` argument of account queries is the block the client asked
/// for; backends are free to answer from the latest state.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn latest_height(&self) -> BackendResult<u64>;

    async fn current_block(&self) -> BackendResult<Block>;

    async fn block_by_number(&self, number: u64) -> BackendResult<Block>;

    async fn block_by_hash(&self, hash: B256) -> BackendResult<Block>;

    async fn balance(&self, address: Address, height: BlockNumber) -> BackendResult<U256>;

    async fn code(&self, address: Address, height: BlockNumber) -> BackendResult<Bytes>;

    async fn storage_at(&self, address: Address, key: B256, height: BlockNumber)
        -> BackendResult<Bytes>;

    async fn nonce(&self, address: Address, height: BlockNumber) -> BackendResult<u64>;

    /// A stored transaction together with its block context.
    async fn transaction(&self, hash: B256) -> BackendResult<StoredTransaction>;

    async fn transactions_by_height(&self, height: u64) -> BackendResult<Vec<StoredTransaction>>;

    /// Execute `tx` as `sender` without committing anything.
    async fn call(&self, tx: &CanonicalTransaction, sender: Address)
        -> BackendResult<ExecutionResult>;

    async fn estimate_gas(&self, tx: &CanonicalTransaction, sender: Address)
        -> BackendResult<GasEstimate>;

    /// Submit signed wire bytes. Returns the backend's own acknowledgment id.
    async fn send_raw_transaction(&self, raw: &[u8]) -> BackendResult<B256>;

    async fn chain_id(&self) -> BackendResult<u64>;

    async fn protocol_version(&self) -> BackendResult<u64>;
}

/// Sync progress of the node process hosting the backend.
#[async_trait]
pub trait SyncSource: Send + Sync {
    async fn sync_info(&self) -> BackendResult<SyncInfo>;
}
