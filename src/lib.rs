//! Ethereum JSON-RPC compatibility facade
//!
//! This crate implements a JSON-RPC server that accepts Ethereum-compatible
//! RPC calls (eth_*, net_*, web3_*) and serves them from a chain backend that
//! is not Ethereum. Standard EVM tooling (MetaMask, Hardhat, ethers.js) can
//! talk to the backend unchanged.
//!
//! # Architecture
//!
//! ```text
//! Developer (MetaMask/Hardhat/ethers.js)
//!     |
//!     | eth_* JSON-RPC calls
//!     v
//! eth-facade (this crate)
//!     |
//!     | backend_* JSON-RPC calls
//!     v
//! Chain backend service
//! ```
//!
//! # Modules
//!
//! - `config` - Environment and configuration management
//! - `server` - JSON-RPC server setup and method registration
//! - `methods` - Individual RPC method implementations (eth, net, web3)
//! - `translator` - Hex codecs, call argument defaulting, transaction RLP
//! - `emulator` - Block/transaction/receipt/log shaping into EVM format
//! - `backend` - Backend traits plus remote and in-memory adapters
//! - `signer` - Local test-key signing for eth_sendTransaction
//! - `error` - RPC error taxonomy and execution status mapping

pub mod backend;
pub mod config;
pub mod emulator;
pub mod error;
pub mod methods;
pub mod server;
pub mod signer;
pub mod translator;
