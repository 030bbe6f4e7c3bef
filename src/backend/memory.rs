//! In-process chain used by tests and local demos.
//!
//! Blocks are appended explicitly; execution results are scripted rather
//! than computed. Every call and submission is recorded so tests can assert
//! on exactly what the facade asked for.

use std::collections::HashMap;

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::types::{Block, ExecutionResult, GasEstimate, StoredTransaction, SyncInfo};
use super::{Backend, BackendError, BackendResult, SyncSource};
use crate::emulator::block::BlockNumber;
use crate::translator::tx::{keccak256, CanonicalTransaction};

/// Default chain id of the in-memory chain
pub const MEMORY_CHAIN_ID: u64 = 1337;
/// Prefix mixed into acknowledgment ids so they never equal a tx hash
const ACK_PREFIX: &[u8] = b"memory-backend-ack";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: U256,
    pub nonce: u64,
    pub code: Bytes,
    pub storage: HashMap<B256, B256>,
}

/// A recorded `call` or `estimate_gas` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub sender: Address,
    pub transaction: CanonicalTransaction,
}

#[derive(Default)]
struct State {
    blocks: Vec<Block>,
    transactions: HashMap<B256, StoredTransaction>,
    accounts: HashMap<Address, Account>,
    call_result: ExecutionResult,
    estimate_result: GasEstimate,
    calls: Vec<RecordedCall>,
    estimates: Vec<RecordedCall>,
    submitted: Vec<Bytes>,
    sync: SyncInfo,
    unavailable: bool,
}

pub struct MemoryBackend {
    chain_id: u64,
    state: RwLock<State>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(MEMORY_CHAIN_ID)
    }
}

impl MemoryBackend {
    /// A chain holding only a genesis block at height 0.
    pub fn new(chain_id: u64) -> Self {
        let genesis = Block {
            number: 0,
            hash: keccak256(b"genesis"),
            parent_hash: B256::ZERO,
            miner: Address::ZERO,
            timestamp: 0,
            size: 0,
            gas_limit: 30_000_000,
            gas_used: 0,
            state_root: B256::ZERO,
            transactions_root: B256::ZERO,
            transactions: Vec::new(),
        };
        let state = State {
            blocks: vec![genesis],
            estimate_result: GasEstimate {
                gas_used: 21_000,
                ..Default::default()
            },
            ..Default::default()
        };
        Self {
            chain_id,
            state: RwLock::new(state),
        }
    }

    /// Seal a new block on top of the head holding `txs`.
    ///
    /// Block context (hash, number, index, cumulative gas) is filled into
    /// each transaction. Returns the new block.
    pub fn append_block(&self, txs: Vec<StoredTransaction>) -> Block {
        let mut state = self.state.write();
        let parent = state.blocks.last().cloned().unwrap_or_default();
        let number = parent.number + 1;

        let mut seed = parent.hash.to_vec();
        seed.extend_from_slice(&number.to_be_bytes());
        for tx in &txs {
            seed.extend_from_slice(tx.hash.as_slice());
        }
        let hash = keccak256(&seed);

        let mut cumulative = 0u64;
        let mut hashes = Vec::with_capacity(txs.len());
        for (index, mut tx) in txs.into_iter().enumerate() {
            cumulative = cumulative.saturating_add(tx.gas_used);
            tx.block_hash = hash;
            tx.block_number = number;
            tx.transaction_index = index as u64;
            tx.cumulative_gas_used = cumulative;
            hashes.push(tx.hash);
            state.transactions.insert(tx.hash, tx);
        }

        let block = Block {
            number,
            hash,
            parent_hash: parent.hash,
            miner: Address::ZERO,
            timestamp: parent.timestamp + 1,
            size: 0,
            gas_limit: parent.gas_limit,
            gas_used: cumulative,
            state_root: B256::ZERO,
            transactions_root: B256::ZERO,
            transactions: hashes,
        };
        debug!("Memory backend sealed block {} ({} txs)", number, block.transactions.len());
        state.blocks.push(block.clone());
        block
    }

    pub fn set_account(&self, address: Address, account: Account) {
        self.state.write().accounts.insert(address, account);
    }

    /// Result returned by every subsequent `call`.
    pub fn set_call_result(&self, result: ExecutionResult) {
        self.state.write().call_result = result;
    }

    /// Result returned by every subsequent `estimate_gas`.
    pub fn set_estimate_result(&self, result: GasEstimate) {
        self.state.write().estimate_result = result;
    }

    pub fn set_sync_info(&self, sync: SyncInfo) {
        self.state.write().sync = sync;
    }

    /// Make every backend operation fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unavailable = unavailable;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.read().calls.clone()
    }

    pub fn estimates(&self) -> Vec<RecordedCall> {
        self.state.read().estimates.clone()
    }

    /// Raw transactions submitted so far, in order.
    pub fn submitted(&self) -> Vec<Bytes> {
        self.state.read().submitted.clone()
    }

    /// The acknowledgment id this backend returns for `raw`.
    pub fn ack_for(raw: &[u8]) -> B256 {
        let mut buf = ACK_PREFIX.to_vec();
        buf.extend_from_slice(raw);
        keccak256(&buf)
    }

    fn check_available(&self) -> BackendResult<()> {
        if self.state.read().unavailable {
            return Err(BackendError::Unavailable("memory backend offline".to_string()));
        }
        Ok(())
    }

    fn account<T>(&self, address: &Address, f: impl FnOnce(&Account) -> T) -> BackendResult<T> {
        self.check_available()?;
        self.state
            .read()
            .accounts
            .get(address)
            .map(f)
            .ok_or(BackendError::AccountNotFound)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn latest_height(&self) -> BackendResult<u64> {
        self.check_available()?;
        Ok(self.state.read().blocks.last().map_or(0, |b| b.number))
    }

    async fn current_block(&self) -> BackendResult<Block> {
        self.check_available()?;
        self.state
            .read()
            .blocks
            .last()
            .cloned()
            .ok_or(BackendError::BlockNotFound)
    }

    async fn block_by_number(&self, number: u64) -> BackendResult<Block> {
        self.check_available()?;
        let state = self.state.read();
        usize::try_from(number)
            .ok()
            .and_then(|i| state.blocks.get(i))
            .cloned()
            .ok_or(BackendError::BlockNotFound)
    }

    async fn block_by_hash(&self, hash: B256) -> BackendResult<Block> {
        self.check_available()?;
        self.state
            .read()
            .blocks
            .iter()
            .find(|b| b.hash == hash)
            .cloned()
            .ok_or(BackendError::BlockNotFound)
    }

    async fn balance(&self, address: Address, _height: BlockNumber) -> BackendResult<U256> {
        self.account(&address, |a| a.balance)
    }

    async fn code(&self, address: Address, _height: BlockNumber) -> BackendResult<Bytes> {
        self.account(&address, |a| a.code.clone())
    }

    async fn storage_at(
        &self,
        address: Address,
        key: B256,
        _height: BlockNumber,
    ) -> BackendResult<Bytes> {
        let value = self
            .account(&address, |a| a.storage.get(&key).copied())?
            .unwrap_or_default();
        Ok(Bytes::copy_from_slice(value.as_slice()))
    }

    async fn nonce(&self, address: Address, _height: BlockNumber) -> BackendResult<u64> {
        self.account(&address, |a| a.nonce)
    }

    async fn transaction(&self, hash: B256) -> BackendResult<StoredTransaction> {
        self.check_available()?;
        self.state
            .read()
            .transactions
            .get(&hash)
            .cloned()
            .ok_or(BackendError::TransactionNotFound)
    }

    async fn transactions_by_height(&self, height: u64) -> BackendResult<Vec<StoredTransaction>> {
        self.check_available()?;
        let state = self.state.read();
        let block = usize::try_from(height)
            .ok()
            .and_then(|i| state.blocks.get(i))
            .ok_or(BackendError::BlockNotFound)?;
        Ok(block
            .transactions
            .iter()
            .filter_map(|h| state.transactions.get(h).cloned())
            .collect())
    }

    async fn call(
        &self,
        tx: &CanonicalTransaction,
        sender: Address,
    ) -> BackendResult<ExecutionResult> {
        self.check_available()?;
        let mut state = self.state.write();
        state.calls.push(RecordedCall {
            sender,
            transaction: tx.clone(),
        });
        Ok(state.call_result.clone())
    }

    async fn estimate_gas(
        &self,
        tx: &CanonicalTransaction,
        sender: Address,
    ) -> BackendResult<GasEstimate> {
        self.check_available()?;
        let mut state = self.state.write();
        state.estimates.push(RecordedCall {
            sender,
            transaction: tx.clone(),
        });
        Ok(state.estimate_result.clone())
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> BackendResult<B256> {
        self.check_available()?;
        self.state.write().submitted.push(Bytes::copy_from_slice(raw));
        Ok(Self::ack_for(raw))
    }

    async fn chain_id(&self) -> BackendResult<u64> {
        self.check_available()?;
        Ok(self.chain_id)
    }

    async fn protocol_version(&self) -> BackendResult<u64> {
        self.check_available()?;
        Ok(65)
    }
}

#[async_trait]
impl SyncSource for MemoryBackend {
    async fn sync_info(&self) -> BackendResult<SyncInfo> {
        self.check_available()?;
        Ok(self.state.read().sync)
    }
}
