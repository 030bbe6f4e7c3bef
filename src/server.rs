use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use jsonrpsee::server::{RpcModule, Server, ServerHandle};
use jsonrpsee::types::{ErrorObjectOwned, Params};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::backend::{Backend, RemoteBackend, SyncSource};
use crate::config::Config;
use crate::methods::{net, web3, EthApi};
use crate::signer::SignerRegistry;

/// Shared state for the RPC server.
pub struct RpcState {
    pub eth: EthApi,
}

impl RpcState {
    pub fn new(
        config: &Config,
        backend: Arc<dyn Backend>,
        sync: Arc<dyn SyncSource>,
        signers: Arc<SignerRegistry>,
    ) -> Self {
        let eth = EthApi::new(backend, sync, signers, config.call_defaults());
        Self { eth }
    }
}

/// Positional params as a JSON array. Absent params are an empty list.
fn positional(params: &Params<'_>) -> Result<Vec<Value>, ErrorObjectOwned> {
    if params.as_str().is_none() {
        return Ok(Vec::new());
    }
    params.parse::<Vec<Value>>()
}

/// Start the JSON-RPC server and run until it stops.
pub async fn start_server(config: Config) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.rpc_port));

    info!("Starting eth-facade RPC server on {}", addr);
    info!("Backend RPC: {}", config.backend_rpc_url);

    let remote = Arc::new(RemoteBackend::new(&config.backend_rpc_url));

    // Check backend reachability
    match remote.chain_id().await {
        Ok(chain_id) => info!("Backend chain ID: {} (0x{:x})", chain_id, chain_id),
        Err(e) => warn!("Could not reach backend (will retry on requests): {}", e),
    }

    let signers = Arc::new(SignerRegistry::from_hex_keys(&config.test_keys));
    if signers.is_empty() {
        warn!("No test accounts configured, eth_sendTransaction will reject every sender");
    } else {
        info!("Loaded {} test account(s)", signers.len());
    }

    let backend: Arc<dyn Backend> = remote.clone();
    let sync: Arc<dyn SyncSource> = remote;
    let state = Arc::new(RpcState::new(&config, backend, sync, signers));

    let (local_addr, handle) = launch(addr, state).await?;
    info!("eth-facade listening on http://{}", local_addr);

    // Wait for the server to finish (runs until shutdown signal)
    handle.stopped().await;

    info!("eth-facade RPC server stopped");
    Ok(())
}

/// Bind `addr` and serve the full method set with open CORS.
pub async fn launch(addr: SocketAddr, state: Arc<RpcState>) -> Result<(SocketAddr, ServerHandle)> {
    let module = build_module(state)?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([http::Method::POST, http::Method::OPTIONS])
        .allow_headers([http::header::CONTENT_TYPE]);
    let middleware = ServiceBuilder::new().layer(cors);

    let server = Server::builder()
        .set_http_middleware(middleware)
        .build(addr)
        .await
        .map_err(|e| anyhow!("Failed to bind server to {}: {}", addr, e))?;
    let local_addr = server.local_addr()?;

    Ok((local_addr, server.start(module)))
}

/// Build the RPC module with every supported method registered.
pub fn build_module(state: Arc<RpcState>) -> Result<RpcModule<Arc<RpcState>>> {
    let mut module = RpcModule::new(state);
    register_methods(&mut module)?;
    Ok(module)
}

/// Register all JSON-RPC methods on the module.
fn register_methods(module: &mut RpcModule<Arc<RpcState>>) -> Result<()> {
    // --- eth_* methods ---

    module.register_async_method("eth_chainId", |_params, ctx, _| async move {
        ctx.eth.chain_id().await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("eth_blockNumber", |_params, ctx, _| async move {
        ctx.eth.block_number().await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("eth_getBalance", |params, ctx, _| async move {
        let p = positional(&params)?;
        ctx.eth.get_balance(&p).await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("eth_getCode", |params, ctx, _| async move {
        let p = positional(&params)?;
        ctx.eth.get_code(&p).await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("eth_getStorageAt", |params, ctx, _| async move {
        let p = positional(&params)?;
        ctx.eth.get_storage_at(&p).await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("eth_getBlockByHash", |params, ctx, _| async move {
        let p = positional(&params)?;
        ctx.eth.get_block_by_hash(&p).await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("eth_getBlockByNumber", |params, ctx, _| async move {
        let p = positional(&params)?;
        ctx.eth.get_block_by_number(&p).await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method(
        "eth_getBlockTransactionCountByHash",
        |params, ctx, _| async move {
            let p = positional(&params)?;
            ctx.eth
                .get_block_transaction_count_by_hash(&p)
                .await
                .map_err(ErrorObjectOwned::from)
        },
    )?;

    module.register_async_method(
        "eth_getBlockTransactionCountByNumber",
        |params, ctx, _| async move {
            let p = positional(&params)?;
            ctx.eth
                .get_block_transaction_count_by_number(&p)
                .await
                .map_err(ErrorObjectOwned::from)
        },
    )?;

    module.register_async_method("eth_getTransactionByHash", |params, ctx, _| async move {
        let p = positional(&params)?;
        ctx.eth.get_transaction_by_hash(&p).await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method(
        "eth_getTransactionByBlockHashAndIndex",
        |params, ctx, _| async move {
            let p = positional(&params)?;
            ctx.eth
                .get_transaction_by_block_hash_and_index(&p)
                .await
                .map_err(ErrorObjectOwned::from)
        },
    )?;

    module.register_async_method(
        "eth_getTransactionByBlockNumberAndIndex",
        |params, ctx, _| async move {
            let p = positional(&params)?;
            ctx.eth
                .get_transaction_by_block_number_and_index(&p)
                .await
                .map_err(ErrorObjectOwned::from)
        },
    )?;

    module.register_async_method("eth_getTransactionReceipt", |params, ctx, _| async move {
        let p = positional(&params)?;
        ctx.eth.get_transaction_receipt(&p).await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("eth_getTransactionCount", |params, ctx, _| async move {
        let p = positional(&params)?;
        ctx.eth.get_transaction_count(&p).await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("eth_sendRawTransaction", |params, ctx, _| async move {
        let p = positional(&params)?;
        ctx.eth.send_raw_transaction(&p).await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("eth_sendTransaction", |params, ctx, _| async move {
        let p = positional(&params)?;
        ctx.eth.send_transaction(&p).await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("eth_call", |params, ctx, _| async move {
        let p = positional(&params)?;
        ctx.eth.call(&p).await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("eth_estimateGas", |params, ctx, _| async move {
        let p = positional(&params)?;
        ctx.eth.estimate_gas(&p).await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("eth_syncing", |_params, ctx, _| async move {
        ctx.eth.syncing().await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("eth_accounts", |_params, ctx, _| async move {
        ctx.eth.accounts().await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("eth_protocolVersion", |_params, ctx, _| async move {
        ctx.eth.protocol_version().await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("eth_gasPrice", |_params, ctx, _| async move {
        ctx.eth.gas_price().await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("eth_coinbase", |_params, ctx, _| async move {
        ctx.eth.coinbase().await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("eth_mining", |_params, ctx, _| async move {
        ctx.eth.mining().await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("eth_hashrate", |_params, ctx, _| async move {
        ctx.eth.hashrate().await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method(
        "eth_getUncleByBlockHashAndIndex",
        |_params, ctx, _| async move {
            ctx.eth
                .get_uncle_by_block_hash_and_index()
                .await
                .map_err(ErrorObjectOwned::from)
        },
    )?;

    module.register_async_method(
        "eth_getUncleByBlockNumberAndIndex",
        |_params, ctx, _| async move {
            ctx.eth
                .get_uncle_by_block_number_and_index()
                .await
                .map_err(ErrorObjectOwned::from)
        },
    )?;

    module.register_async_method("eth_getUncleCountByBlockHash", |_params, ctx, _| async move {
        ctx.eth
            .get_uncle_count_by_block_hash()
            .await
            .map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method(
        "eth_getUncleCountByBlockNumber",
        |_params, ctx, _| async move {
            ctx.eth
                .get_uncle_count_by_block_number()
                .await
                .map_err(ErrorObjectOwned::from)
        },
    )?;

    // --- net_* methods ---

    module.register_async_method("net_version", |_params, ctx, _| async move {
        net::version(ctx.eth.backend()).await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("net_listening", |_params, _ctx, _| async move {
        net::listening().await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("net_peerCount", |_params, _ctx, _| async move {
        net::peer_count().await.map_err(ErrorObjectOwned::from)
    })?;

    // --- web3_* methods ---

    module.register_async_method("web3_clientVersion", |_params, _ctx, _| async move {
        web3::client_version().await.map_err(ErrorObjectOwned::from)
    })?;

    module.register_async_method("web3_sha3", |params, _ctx, _| async move {
        let p = positional(&params)?;
        web3::sha3(&p).await.map_err(ErrorObjectOwned::from)
    })?;

    info!("Registered {} RPC methods", module.method_names().count());
    Ok(())
}
