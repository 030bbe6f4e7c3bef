use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

use alloy_primitives::U256;

use crate::translator::args::{CallDefaults, DEFAULT_GAS_PRICE, DEFAULT_RPC_GAS_CAP};

/// Facade configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Backend service JSON-RPC endpoint URL
    pub backend_rpc_url: String,
    /// RPC server port
    pub rpc_port: u16,
    /// Gas ceiling for calls and defaulted sends
    pub rpc_gas_cap: u64,
    /// Flat gas price in wei
    pub rpc_gas_price: U256,
    /// Hex private keys available to eth_sendTransaction
    pub test_keys: Vec<String>,
    /// Log level
    pub log_level: String,
}

// Keys never reach the logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("backend_rpc_url", &self.backend_rpc_url)
            .field("rpc_port", &self.rpc_port)
            .field("rpc_gas_cap", &self.rpc_gas_cap)
            .field("rpc_gas_price", &self.rpc_gas_price)
            .field("test_keys", &self.test_keys.len())
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number, got {:?}", name, raw)),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    /// Call dotenvy::dotenv() before calling this.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let backend_rpc_url = lookup("BACKEND_RPC_URL")
            .unwrap_or_else(|| "http://127.0.0.1:8546".to_string());

        let rpc_port: u16 = parse_var(&lookup, "FACADE_RPC_PORT", 8545)?;
        let rpc_gas_cap: u64 = parse_var(&lookup, "RPC_GAS_CAP", DEFAULT_RPC_GAS_CAP)?;

        let rpc_gas_price = match lookup("RPC_GAS_PRICE") {
            Some(raw) => U256::from_str_radix(raw.trim(), 10)
                .with_context(|| format!("RPC_GAS_PRICE must be a decimal wei amount, got {:?}", raw))?,
            None => U256::from(DEFAULT_GAS_PRICE),
        };

        let test_keys = lookup("TEST_KEYS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let log_level = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        Ok(Config {
            backend_rpc_url,
            rpc_port,
            rpc_gas_cap,
            rpc_gas_price,
            test_keys,
            log_level,
        })
    }

    /// Defaults applied to calls and sends that omit gas fields.
    pub fn call_defaults(&self) -> CallDefaults {
        CallDefaults {
            gas_cap: self.rpc_gas_cap,
            gas_price: self.rpc_gas_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(move |name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.rpc_port, 8545);
        assert_eq!(config.backend_rpc_url, "http://127.0.0.1:8546");
        assert_eq!(config.call_defaults(), CallDefaults::default());
        assert!(config.test_keys.is_empty());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("FACADE_RPC_PORT", "9000"),
            ("RPC_GAS_CAP", "50000000"),
            ("RPC_GAS_PRICE", "1000000000"),
            ("TEST_KEYS", "0xaa, bb ,,cc"),
        ])
        .unwrap();
        assert_eq!(config.rpc_port, 9000);
        assert_eq!(config.rpc_gas_cap, 50_000_000);
        assert_eq!(config.rpc_gas_price, U256::from(1_000_000_000u64));
        assert_eq!(config.test_keys, vec!["0xaa", "bb", "cc"]);
    }

    #[test]
    fn test_invalid_numbers_fail() {
        let err = config_from(&[("FACADE_RPC_PORT", "99999")]).unwrap_err();
        assert!(err.to_string().contains("FACADE_RPC_PORT"));
        assert!(config_from(&[("RPC_GAS_CAP", "lots")]).is_err());
        assert!(config_from(&[("RPC_GAS_PRICE", "0x10")]).is_err());
    }

    #[test]
    fn test_debug_hides_keys() {
        let config = config_from(&[("TEST_KEYS", "0xdeadbeef")]).unwrap();
        assert!(!format!("{:?}", config).contains("deadbeef"));
    }
}
