//! Call and send arguments, and their defaulting into canonical transactions.

use alloy_primitives::{Address, Bytes, U256};
use serde_json::{Map, Value};

use super::hexutil::{parse_address, parse_bytes, parse_u256, parse_u64};
use super::tx::CanonicalTransaction;
use crate::error::RpcError;

/// Default gas ceiling for `eth_call` / `eth_estimateGas`.
pub const DEFAULT_RPC_GAS_CAP: u64 = 10_000_000;
/// Flat gas price reported and used when callers omit one (20 gwei).
pub const DEFAULT_GAS_PRICE: u64 = 20_000_000_000;

/// Node-configured values that fill in omitted transaction fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallDefaults {
    pub gas_cap: u64,
    pub gas_price: U256,
}

impl Default for CallDefaults {
    fn default() -> Self {
        Self {
            gas_cap: DEFAULT_RPC_GAS_CAP,
            gas_price: U256::from(DEFAULT_GAS_PRICE),
        }
    }
}

/// Fields shared by call and send arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TxFields {
    from: Option<Address>,
    to: Option<Address>,
    gas: Option<u64>,
    gas_price: Option<U256>,
    value: Option<U256>,
    data: Option<Bytes>,
    nonce: Option<u64>,
}

fn field<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.get(name).filter(|v| !v.is_null())
}

impl TxFields {
    fn from_value(value: &Value, what: &str) -> Result<Self, RpcError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RpcError::invalid_params(format!("{} must be an object", what)))?;

        // `input` is the newer name for `data`; it wins when both are given.
        let data = match field(obj, "input").or_else(|| field(obj, "data")) {
            Some(v) => Some(parse_bytes(v)?),
            None => None,
        };

        Ok(TxFields {
            from: field(obj, "from").map(parse_address).transpose()?,
            to: field(obj, "to").map(parse_address).transpose()?,
            gas: field(obj, "gas").map(|v| parse_u64(v, "gas")).transpose()?,
            gas_price: field(obj, "gasPrice")
                .map(|v| parse_u256(v, "gasPrice"))
                .transpose()?,
            value: field(obj, "value").map(|v| parse_u256(v, "value")).transpose()?,
            data,
            nonce: field(obj, "nonce").map(|v| parse_u64(v, "nonce")).transpose()?,
        })
    }
}

/// Partial transaction for read-only execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallArgs {
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub gas: Option<u64>,
    pub gas_price: Option<U256>,
    pub value: Option<U256>,
    pub data: Option<Bytes>,
}

impl CallArgs {
    pub fn from_value(value: &Value) -> Result<Self, RpcError> {
        let f = TxFields::from_value(value, "call object")?;
        Ok(CallArgs {
            from: f.from,
            to: f.to,
            gas: f.gas,
            gas_price: f.gas_price,
            value: f.value,
            data: f.data,
        })
    }

    /// Resolve into the sender and a canonical transaction.
    ///
    /// Sender and recipient fall back to the zero address, gas and gas price
    /// to the node defaults, value to zero and payload to empty. Calls
    /// always use nonce zero.
    pub fn into_transaction(self, defaults: &CallDefaults) -> (Address, CanonicalTransaction) {
        let from = self.from.unwrap_or(Address::ZERO);
        let tx = CanonicalTransaction {
            nonce: 0,
            gas_price: self.gas_price.unwrap_or(defaults.gas_price),
            gas_limit: self.gas.unwrap_or(defaults.gas_cap),
            to: Some(self.to.unwrap_or(Address::ZERO)),
            value: self.value.unwrap_or(U256::ZERO),
            data: self.data.unwrap_or_default(),
        };
        (from, tx)
    }
}

/// Partial transaction the node signs on the sender's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTxArgs {
    pub from: Address,
    /// None deploys a contract
    pub to: Option<Address>,
    pub gas: Option<u64>,
    pub gas_price: Option<U256>,
    pub value: Option<U256>,
    pub data: Option<Bytes>,
    pub nonce: Option<u64>,
}

impl SendTxArgs {
    pub fn from_value(value: &Value) -> Result<Self, RpcError> {
        let f = TxFields::from_value(value, "transaction object")?;
        let from = f
            .from
            .ok_or_else(|| RpcError::invalid_params("transaction object requires 'from'"))?;
        Ok(SendTxArgs {
            from,
            to: f.to,
            gas: f.gas,
            gas_price: f.gas_price,
            value: f.value,
            data: f.data,
            nonce: f.nonce,
        })
    }

    /// Build the unsigned transaction with `nonce` already resolved.
    pub fn into_transaction(self, nonce: u64, defaults: &CallDefaults) -> CanonicalTransaction {
        CanonicalTransaction {
            nonce,
            gas_price: self.gas_price.unwrap_or(defaults.gas_price),
            gas_limit: self.gas.unwrap_or(defaults.gas_cap),
            to: self.to,
            value: self.value.unwrap_or(U256::ZERO),
            data: self.data.unwrap_or_default(),
        }
    }
}
