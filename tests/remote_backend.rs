use std::net::SocketAddr;

use alloy_primitives::{Address, Bytes, B256, U256};
use jsonrpsee::server::{RpcModule, Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use serde_json::{json, Value};

use eth_facade::backend::{Backend, BackendError, RemoteBackend, SyncSource};
use eth_facade::emulator::BlockNumber;
use eth_facade::translator::CanonicalTransaction;

fn not_found(kind: &str) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(-32001, format!("{} not found", kind), Some(json!({ "kind": kind })))
}

/// A stand-in backend service answering a few `backend_*` methods.
async fn spawn_service() -> (SocketAddr, ServerHandle) {
    let mut module = RpcModule::new(());

    module
        .register_method("backend_latestHeight", |_, _, _| Ok::<_, ErrorObjectOwned>(json!(42)))
        .unwrap();
    module
        .register_method("backend_chainId", |_, _, _| Ok::<_, ErrorObjectOwned>(json!(10001)))
        .unwrap();
    module
        .register_method("backend_balance", |params, _, _| {
            let (address, height): (Address, i64) = params.parse()?;
            if address == Address::ZERO {
                return Err(not_found("account"));
            }
            Ok(json!(format!("0x{:x}", 1000 + height.unsigned_abs())))
        })
        .unwrap();
    module
        .register_method("backend_nonce", |params, _, _| {
            let (_address, height): (Address, i64) = params.parse()?;
            Ok::<_, ErrorObjectOwned>(json!(100 + height))
        })
        .unwrap();
    module
        .register_method("backend_blockByNumber", |_, _, _| {
            Err::<Value, _>(not_found("block"))
        })
        .unwrap();
    module
        .register_method("backend_transaction", |_, _, _| {
            Err::<Value, _>(not_found("transaction"))
        })
        .unwrap();
    module
        .register_method("backend_call", |params, _, _| {
            let (tx, _sender): (CanonicalTransaction, Address) = params.parse()?;
            Ok::<_, ErrorObjectOwned>(json!({ "status": 0, "output": tx.data }))
        })
        .unwrap();
    module
        .register_method("backend_sendRawTransaction", |_, _, _| {
            Err::<Value, _>(ErrorObjectOwned::owned(-32000, "nonce too low", None::<()>))
        })
        .unwrap();
    module
        .register_method("backend_syncInfo", |_, _, _| {
            Ok::<_, ErrorObjectOwned>(json!({ "catchingUp": true, "latestBlockHeight": 7 }))
        })
        .unwrap();

    let server = Server::builder().build("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    (addr, server.start(module))
}

#[tokio::test]
async fn test_remote_backend_round_trips() {
    let (addr, handle) = spawn_service().await;
    let backend = RemoteBackend::new(&format!("http://{}", addr));

    assert_eq!(backend.latest_height().await.unwrap(), 42);
    assert_eq!(backend.chain_id().await.unwrap(), 10001);
    assert_eq!(
        backend
            .balance(Address::repeat_byte(0x01), BlockNumber::LATEST)
            .await
            .unwrap(),
        U256::from(1001)
    );

    assert_eq!(
        backend
            .nonce(Address::repeat_byte(0x01), BlockNumber::LATEST)
            .await
            .unwrap(),
        99
    );
    assert_eq!(
        backend
            .nonce(Address::repeat_byte(0x01), BlockNumber::from(8u64))
            .await
            .unwrap(),
        108
    );

    let tx = CanonicalTransaction {
        nonce: 0,
        gas_price: U256::from(1),
        gas_limit: 21_000,
        to: Some(Address::repeat_byte(0x02)),
        value: U256::ZERO,
        data: Bytes::from(vec![0xca, 0xfe]),
    };
    let result = backend.call(&tx, Address::ZERO).await.unwrap();
    assert_eq!(result.status, 0);
    assert_eq!(result.output.to_vec(), vec![0xca, 0xfe]);

    let sync = backend.sync_info().await.unwrap();
    assert!(sync.catching_up);
    assert_eq!(sync.latest_block_height, 7);

    handle.stop().unwrap();
}

#[tokio::test]
async fn test_remote_backend_error_mapping() {
    let (addr, handle) = spawn_service().await;
    let backend = RemoteBackend::new(&format!("http://{}", addr));

    assert_eq!(
        backend.balance(Address::ZERO, BlockNumber::LATEST).await,
        Err(BackendError::AccountNotFound)
    );
    assert_eq!(
        backend.block_by_number(5).await,
        Err(BackendError::BlockNotFound)
    );
    assert_eq!(
        backend.transaction(B256::ZERO).await,
        Err(BackendError::TransactionNotFound)
    );
    assert_eq!(
        backend.send_raw_transaction(&[0xc0]).await,
        Err(BackendError::Other("backend error -32000: nonce too low".to_string()))
    );
    // Method missing on the service
    assert!(matches!(
        backend.protocol_version().await,
        Err(BackendError::Other(_))
    ));

    handle.stop().unwrap();
}
