use std::sync::Arc;

use alloy_primitives::Address;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::backend::{Backend, BackendError, BackendResult, Block, SyncSource};
use crate::emulator::block::{parse_block_number, parse_block_number_or_latest, BlockNumber, RpcBlock};
use crate::emulator::transaction::{RpcReceipt, RpcTransaction};
use crate::error::{check_execution, RpcError};
use crate::signer::{sign_transaction, SignerRegistry};
use crate::translator::args::{CallArgs, CallDefaults, SendTxArgs};
use crate::translator::hexutil::{
    format_address, format_bytes, format_hash, format_u256, format_u64, optional, parse_address,
    parse_bytes, parse_flag, parse_hash, parse_storage_key, parse_u64, required,
};
use crate::translator::tx::decode_raw_transaction;

/// The `eth_*` namespace over a backend.
///
/// Holds only shared, immutable values; every handler is independent of
/// the others and safe to run concurrently.
#[derive(Clone)]
pub struct EthApi {
    backend: Arc<dyn Backend>,
    sync: Arc<dyn SyncSource>,
    signers: Arc<SignerRegistry>,
    defaults: CallDefaults,
}

/// Turn a block-not-found miss into `None`.
fn found<T>(result: BackendResult<T>) -> Result<Option<T>, RpcError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(BackendError::BlockNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl EthApi {
    pub fn new(
        backend: Arc<dyn Backend>,
        sync: Arc<dyn SyncSource>,
        signers: Arc<SignerRegistry>,
        defaults: CallDefaults,
    ) -> Self {
        Self {
            backend,
            sync,
            signers,
            defaults,
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    async fn block_at(&self, number: BlockNumber) -> Result<Option<Block>, RpcError> {
        match number.height() {
            None => Ok(Some(self.backend.current_block().await?)),
            Some(height) => found(self.backend.block_by_number(height).await),
        }
    }

    async fn render_block(&self, block: &Block, full_txs: bool) -> Result<Value, RpcError> {
        let rendered = if full_txs {
            let txs = self.backend.transactions_by_height(block.number).await?;
            RpcBlock::from_block(block, Some(txs.as_slice()))?
        } else {
            RpcBlock::from_block(block, None)?
        };
        Ok(serde_json::to_value(rendered)?)
    }

    /// Transaction at `index` in `block`, or null when out of range.
    async fn transaction_at(&self, block: Option<Block>, index: u64) -> Result<Value, RpcError> {
        let Some(block) = block else {
            return Ok(Value::Null);
        };
        let Some(&hash) = usize::try_from(index)
            .ok()
            .and_then(|i| block.transactions.get(i))
        else {
            debug!(
                "Transaction index {} out of range for block {} ({} txs)",
                index,
                block.number,
                block.transactions.len()
            );
            return Ok(Value::Null);
        };

        let tx = self.backend.transaction(hash).await?;
        Ok(serde_json::to_value(RpcTransaction::from_stored(&tx))?)
    }

    /// Handler for eth_chainId
    pub async fn chain_id(&self) -> Result<Value, RpcError> {
        let id = self.backend.chain_id().await?;
        debug!("eth_chainId -> 0x{:x}", id);
        Ok(Value::String(format_u64(id)))
    }

    /// Handler for eth_blockNumber
    pub async fn block_number(&self) -> Result<Value, RpcError> {
        let height = self.backend.latest_height().await?;
        debug!("eth_blockNumber -> {}", height);
        Ok(Value::String(format_u64(height)))
    }

    /// Handler for eth_getBalance
    pub async fn get_balance(&self, params: &[Value]) -> Result<Value, RpcError> {
        let address = parse_address(required(params, 0, "address")?)?;
        let block = parse_block_number_or_latest(optional(params, 1))?;
        debug!("eth_getBalance: address={}, block={}", address, block.value());

        match self.backend.balance(address, block).await {
            Ok(balance) => Ok(Value::String(format_u256(balance))),
            Err(BackendError::AccountNotFound) => Ok(Value::String("0x0".to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Handler for eth_getCode
    pub async fn get_code(&self, params: &[Value]) -> Result<Value, RpcError> {
        let address = parse_address(required(params, 0, "address")?)?;
        let block = parse_block_number_or_latest(optional(params, 1))?;
        debug!("eth_getCode: address={}, block={}", address, block.value());

        match self.backend.code(address, block).await {
            Ok(code) => Ok(Value::String(format_bytes(&code))),
            Err(BackendError::AccountNotFound) => Ok(Value::String("0x".to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Handler for eth_getStorageAt
    pub async fn get_storage_at(&self, params: &[Value]) -> Result<Value, RpcError> {
        let address = parse_address(required(params, 0, "address")?)?;
        let key = parse_storage_key(required(params, 1, "key")?)?;
        let block = parse_block_number_or_latest(optional(params, 2))?;
        debug!(
            "eth_getStorageAt: address={}, key={}, block={}",
            address,
            key,
            block.value()
        );

        match self.backend.storage_at(address, key, block).await {
            Ok(value) => Ok(Value::String(format_bytes(&value))),
            Err(BackendError::AccountNotFound) => Ok(Value::String(format_bytes(&[0u8; 32]))),
            Err(e) => Err(e.into()),
        }
    }

    /// Handler for eth_getBlockByNumber
    pub async fn get_block_by_number(&self, params: &[Value]) -> Result<Value, RpcError> {
        let number = parse_block_number(required(params, 0, "block number")?)?;
        let full_txs = parse_flag(optional(params, 1), "full transactions flag")?;
        debug!("eth_getBlockByNumber: number={}, full={}", number.value(), full_txs);

        match self.block_at(number).await? {
            Some(block) => self.render_block(&block, full_txs).await,
            None => Ok(Value::Null),
        }
    }

    /// Handler for eth_getBlockByHash
    pub async fn get_block_by_hash(&self, params: &[Value]) -> Result<Value, RpcError> {
        let hash = parse_hash(required(params, 0, "block hash")?)?;
        let full_txs = parse_flag(optional(params, 1), "full transactions flag")?;
        debug!("eth_getBlockByHash: hash={}, full={}", hash, full_txs);

        match found(self.backend.block_by_hash(hash).await)? {
            Some(block) => self.render_block(&block, full_txs).await,
            None => Ok(Value::Null),
        }
    }

    /// Handler for eth_getBlockTransactionCountByHash
    pub async fn get_block_transaction_count_by_hash(
        &self,
        params: &[Value],
    ) -> Result<Value, RpcError> {
        let hash = parse_hash(required(params, 0, "block hash")?)?;
        debug!("eth_getBlockTransactionCountByHash: hash={}", hash);

        Ok(match found(self.backend.block_by_hash(hash).await)? {
            Some(block) => Value::String(format_u64(block.transactions.len() as u64)),
            None => Value::Null,
        })
    }

    /// Handler for eth_getBlockTransactionCountByNumber
    pub async fn get_block_transaction_count_by_number(
        &self,
        params: &[Value],
    ) -> Result<Value, RpcError> {
        let number = parse_block_number(required(params, 0, "block number")?)?;
        debug!("eth_getBlockTransactionCountByNumber: number={}", number.value());

        Ok(match self.block_at(number).await? {
            Some(block) => Value::String(format_u64(block.transactions.len() as u64)),
            None => Value::Null,
        })
    }

    /// Handler for eth_getTransactionByHash
    pub async fn get_transaction_by_hash(&self, params: &[Value]) -> Result<Value, RpcError> {
        let hash = parse_hash(required(params, 0, "transaction hash")?)?;
        debug!("eth_getTransactionByHash: hash={}", hash);

        match self.backend.transaction(hash).await {
            Ok(tx) => Ok(serde_json::to_value(RpcTransaction::from_stored(&tx))?),
            Err(BackendError::TransactionNotFound) => Ok(Value::Null),
            Err(e) => Err(e.into()),
        }
    }

    /// Handler for eth_getTransactionByBlockHashAndIndex
    pub async fn get_transaction_by_block_hash_and_index(
        &self,
        params: &[Value],
    ) -> Result<Value, RpcError> {
        let hash = parse_hash(required(params, 0, "block hash")?)?;
        let index = parse_u64(required(params, 1, "index")?, "index")?;
        debug!("eth_getTransactionByBlockHashAndIndex: hash={}, index={}", hash, index);

        let block = found(self.backend.block_by_hash(hash).await)?;
        self.transaction_at(block, index).await
    }

    /// Handler for eth_getTransactionByBlockNumberAndIndex
    pub async fn get_transaction_by_block_number_and_index(
        &self,
        params: &[Value],
    ) -> Result<Value, RpcError> {
        let number = parse_block_number(required(params, 0, "block number")?)?;
        let index = parse_u64(required(params, 1, "index")?, "index")?;
        debug!(
            "eth_getTransactionByBlockNumberAndIndex: number={}, index={}",
            number.value(),
            index
        );

        let block = self.block_at(number).await?;
        self.transaction_at(block, index).await
    }

    /// Handler for eth_getTransactionReceipt
    pub async fn get_transaction_receipt(&self, params: &[Value]) -> Result<Value, RpcError> {
        let hash = parse_hash(required(params, 0, "transaction hash")?)?;
        debug!("eth_getTransactionReceipt: hash={}", hash);

        match self.backend.transaction(hash).await {
            Ok(tx) => Ok(serde_json::to_value(RpcReceipt::from_stored(&tx))?),
            Err(BackendError::TransactionNotFound) => Ok(Value::Null),
            Err(e) => Err(e.into()),
        }
    }

    /// Handler for eth_getTransactionCount
    pub async fn get_transaction_count(&self, params: &[Value]) -> Result<Value, RpcError> {
        let address = parse_address(required(params, 0, "address")?)?;
        let block = parse_block_number_or_latest(optional(params, 1))?;
        debug!("eth_getTransactionCount: address={}, block={}", address, block.value());

        match self.backend.nonce(address, block).await {
            Ok(nonce) => Ok(Value::String(format_u64(nonce))),
            Err(BackendError::AccountNotFound) => Ok(Value::String("0x0".to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Handler for eth_sendRawTransaction
    ///
    /// Submits the bytes verbatim and answers with the hash of those bytes.
    pub async fn send_raw_transaction(&self, params: &[Value]) -> Result<Value, RpcError> {
        let raw = parse_bytes(required(params, 0, "signed transaction")?)?;
        let decoded = decode_raw_transaction(&raw)?;
        debug!(
            "eth_sendRawTransaction: type={}, nonce={}, to={:?}, len={}",
            decoded.tx_type,
            decoded.nonce,
            decoded.to,
            raw.len()
        );

        let ack = self.backend.send_raw_transaction(&raw).await?;
        info!(
            "Transaction submitted: hash={}, backend_ack={}",
            decoded.hash, ack
        );
        Ok(Value::String(format_hash(&decoded.hash)))
    }

    /// Handler for eth_sendTransaction
    ///
    /// Signs with a registered test key, binding the backend chain id.
    pub async fn send_transaction(&self, params: &[Value]) -> Result<Value, RpcError> {
        let args = SendTxArgs::from_value(required(params, 0, "transaction object")?)?;
        let from = args.from;
        debug!("eth_sendTransaction: from={}, to={:?}", from, args.to);

        let Some(key) = self.signers.key(&from) else {
            return Err(RpcError::UnknownAccount(from));
        };

        let nonce = match args.nonce {
            Some(nonce) => nonce,
            None => match self.backend.nonce(from, BlockNumber::LATEST).await {
                Ok(nonce) => nonce,
                Err(BackendError::AccountNotFound) => 0,
                Err(e) => return Err(e.into()),
            },
        };
        let chain_id = self.backend.chain_id().await?;
        let tx = args.into_transaction(nonce, &self.defaults);
        let signed = sign_transaction(key, tx, chain_id)?;

        let ack = self.backend.send_raw_transaction(&signed.raw).await?;
        info!(
            "Transaction signed and submitted: from={}, nonce={}, hash={}, backend_ack={}",
            from, nonce, signed.hash, ack
        );
        Ok(Value::String(format_hash(&signed.hash)))
    }

    /// Handler for eth_call (read-only execution)
    pub async fn call(&self, params: &[Value]) -> Result<Value, RpcError> {
        let args = CallArgs::from_value(required(params, 0, "call object")?)?;
        let block = parse_block_number_or_latest(optional(params, 1))?;
        let (from, tx) = args.into_transaction(&self.defaults);
        debug!(
            "eth_call: from={}, to={:?}, data_len={}, block={}",
            from,
            tx.to,
            tx.data.len(),
            block.value()
        );

        let result = self.backend.call(&tx, from).await?;
        check_execution(result.status, &result.output)?;
        Ok(Value::String(format_bytes(&result.output)))
    }

    /// Handler for eth_estimateGas
    pub async fn estimate_gas(&self, params: &[Value]) -> Result<Value, RpcError> {
        let args = CallArgs::from_value(required(params, 0, "call object")?)?;
        let (from, tx) = args.into_transaction(&self.defaults);
        debug!(
            "eth_estimateGas: from={}, to={:?}, gas={}, data_len={}",
            from,
            tx.to,
            tx.gas_limit,
            tx.data.len()
        );

        let estimate = self.backend.estimate_gas(&tx, from).await?;
        check_execution(estimate.status, &estimate.output)?;
        Ok(Value::String(format_u64(estimate.gas_used)))
    }

    /// Handler for eth_syncing
    pub async fn syncing(&self) -> Result<Value, RpcError> {
        let info = self.sync.sync_info().await?;
        if !info.catching_up {
            return Ok(Value::Bool(false));
        }
        debug!("eth_syncing: catching up at {}", info.latest_block_height);
        Ok(json!({ "currentBlock": format_u64(info.latest_block_height) }))
    }

    /// Handler for eth_accounts
    pub async fn accounts(&self) -> Result<Value, RpcError> {
        let accounts: Vec<Value> = self
            .signers
            .addresses()
            .iter()
            .map(|a| Value::String(format_address(a)))
            .collect();
        Ok(Value::Array(accounts))
    }

    /// Handler for eth_protocolVersion
    pub async fn protocol_version(&self) -> Result<Value, RpcError> {
        let version = self.backend.protocol_version().await?;
        Ok(Value::String(format_u64(version)))
    }

    /// Handler for eth_gasPrice
    pub async fn gas_price(&self) -> Result<Value, RpcError> {
        Ok(Value::String(format_u256(self.defaults.gas_price)))
    }

    /// Handler for eth_coinbase
    pub async fn coinbase(&self) -> Result<Value, RpcError> {
        Ok(Value::String(format_address(&Address::ZERO)))
    }

    /// Handler for eth_mining
    pub async fn mining(&self) -> Result<Value, RpcError> {
        Ok(Value::Bool(false))
    }

    /// Handler for eth_hashrate
    pub async fn hashrate(&self) -> Result<Value, RpcError> {
        Ok(Value::String("0x0".to_string()))
    }

    // Uncles never exist on this chain.

    /// Handler for eth_getUncleByBlockHashAndIndex
    pub async fn get_uncle_by_block_hash_and_index(&self) -> Result<Value, RpcError> {
        Ok(Value::Null)
    }

    /// Handler for eth_getUncleByBlockNumberAndIndex
    pub async fn get_uncle_by_block_number_and_index(&self) -> Result<Value, RpcError> {
        Ok(Value::Null)
    }

    /// Handler for eth_getUncleCountByBlockHash
    pub async fn get_uncle_count_by_block_hash(&self) -> Result<Value, RpcError> {
        Ok(Value::String("0x0".to_string()))
    }

    /// Handler for eth_getUncleCountByBlockNumber
    pub async fn get_uncle_count_by_block_number(&self) -> Result<Value, RpcError> {
        Ok(Value::String("0x0".to_string()))
    }
}
