//! eth-facade RPC server
//!
//! Entry point for the server that exposes Ethereum JSON-RPC over a
//! non-Ethereum chain backend. Loads configuration from environment/.env
//! file and starts the JSON-RPC server on the configured port.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use eth_facade::config::Config;
use eth_facade::server::start_server;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .init();

    info!("=== eth-facade ===");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("");

    info!("Configuration:");
    info!("  RPC Port: {}", config.rpc_port);
    info!("  Backend RPC: {}", config.backend_rpc_url);
    info!("  Gas cap: {}", config.rpc_gas_cap);
    info!("  Gas price: {} wei", config.rpc_gas_price);
    info!("  Test keys: {}", config.test_keys.len());
    info!("");

    // Start the RPC server
    start_server(config).await?;

    Ok(())
}
