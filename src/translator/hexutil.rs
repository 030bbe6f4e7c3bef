//! Decoding and encoding of the hex forms used on the Ethereum RPC wire.
//!
//! Quantities are `0x`-prefixed big-endian integers without padding, data is
//! `0x`-prefixed bytes of even length. All decoding failures become
//! `InvalidParams` so clients see them as their own mistake.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde_json::Value;

use crate::error::RpcError;

/// Fetch a required positional parameter.
pub fn required<'a>(params: &'a [Value], index: usize, name: &str) -> Result<&'a Value, RpcError> {
    match params.get(index) {
        Some(Value::Null) | None => Err(RpcError::invalid_params(format!(
            "missing value for required argument {} ({})",
            index, name
        ))),
        Some(v) => Ok(v),
    }
}

/// Fetch an optional positional parameter, treating `null` as absent.
pub fn optional(params: &[Value], index: usize) -> Option<&Value> {
    params.get(index).filter(|v| !v.is_null())
}

fn as_hex_str<'a>(value: &'a Value, what: &str) -> Result<&'a str, RpcError> {
    let s = value
        .as_str()
        .ok_or_else(|| RpcError::invalid_params(format!("{} must be a hex string", what)))?;
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| RpcError::invalid_params(format!("{} must be 0x-prefixed: {}", what, s)))
}

fn decode_even(digits: &str, what: &str) -> Result<Vec<u8>, RpcError> {
    hex::decode(digits).map_err(|e| RpcError::invalid_params(format!("invalid {} hex: {}", what, e)))
}

pub fn parse_address(value: &Value) -> Result<Address, RpcError> {
    let digits = as_hex_str(value, "address")?;
    let bytes = decode_even(digits, "address")?;
    if bytes.len() != 20 {
        return Err(RpcError::invalid_params(format!(
            "address must be 20 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(Address::from_slice(&bytes))
}

pub fn parse_hash(value: &Value) -> Result<B256, RpcError> {
    let digits = as_hex_str(value, "hash")?;
    let bytes = decode_even(digits, "hash")?;
    if bytes.len() != 32 {
        return Err(RpcError::invalid_params(format!(
            "hash must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(B256::from_slice(&bytes))
}

pub fn parse_bytes(value: &Value) -> Result<Bytes, RpcError> {
    let digits = as_hex_str(value, "data")?;
    Ok(Bytes::from(decode_even(digits, "data")?))
}

/// Storage slot keys are lenient: odd length is allowed and the value is
/// left-padded to 32 bytes. Longer input keeps its low 32 bytes.
pub fn parse_storage_key(value: &Value) -> Result<B256, RpcError> {
    let s = value
        .as_str()
        .ok_or_else(|| RpcError::invalid_params("storage key must be a hex string"))?;
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let padded = if digits.len() % 2 == 1 {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };
    let bytes = decode_even(&padded, "storage key")?;

    let mut key = [0u8; 32];
    let take = bytes.len().min(32);
    key[32 - take..].copy_from_slice(&bytes[bytes.len() - take..]);
    Ok(B256::from(key))
}

fn quantity_digits<'a>(value: &'a Value, what: &str) -> Result<&'a str, RpcError> {
    let digits = as_hex_str(value, what)?;
    if digits.is_empty() {
        return Err(RpcError::invalid_params(format!("{} has no hex digits", what)));
    }
    Ok(digits)
}

pub fn parse_u64(value: &Value, what: &str) -> Result<u64, RpcError> {
    let digits = quantity_digits(value, what)?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| RpcError::invalid_params(format!("invalid {} quantity: {}", what, e)))
}

pub fn parse_u256(value: &Value, what: &str) -> Result<U256, RpcError> {
    let digits = quantity_digits(value, what)?;
    U256::from_str_radix(digits, 16)
        .map_err(|e| RpcError::invalid_params(format!("invalid {} quantity: {}", what, e)))
}

/// Optional boolean flag, defaulting to `false`.
pub fn parse_flag(value: Option<&Value>, what: &str) -> Result<bool, RpcError> {
    match value {
        None => Ok(false),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| RpcError::invalid_params(format!("{} must be a boolean", what))),
    }
}

pub fn format_u64(value: u64) -> String {
    format!("0x{:x}", value)
}

pub fn format_u256(value: U256) -> String {
    format!("0x{:x}", value)
}

pub fn format_bytes(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

pub fn format_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address))
}

pub fn format_hash(hash: &B256) -> String {
    format!("0x{}", hex::encode(hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_address() {
        let addr = parse_address(&json!("0x000000000000000000000000000000000000dead")).unwrap();
        assert_eq!(addr.as_slice()[18..], [0xde, 0xad]);

        assert!(parse_address(&json!("000000000000000000000000000000000000dead")).is_err());
        assert!(parse_address(&json!("0xdead")).is_err());
        assert!(parse_address(&json!("0xzz0000000000000000000000000000000000dead")).is_err());
        assert!(parse_address(&json!(12)).is_err());
    }

    #[test]
    fn test_parse_quantities() {
        assert_eq!(parse_u64(&json!("0x0"), "gas").unwrap(), 0);
        assert_eq!(parse_u64(&json!("0x5208"), "gas").unwrap(), 21000);
        assert!(parse_u64(&json!("0x"), "gas").is_err());
        assert!(parse_u64(&json!("21000"), "gas").is_err());
        assert!(parse_u64(&json!("0x1ffffffffffffffff"), "gas").is_err());

        let wei = parse_u256(&json!("0xde0b6b3a7640000"), "value").unwrap();
        assert_eq!(wei, U256::from(1_000_000_000_000_000_000u64));
    }

    #[test]
    fn test_parse_bytes_requires_even_length() {
        assert_eq!(parse_bytes(&json!("0x")).unwrap().len(), 0);
        assert_eq!(parse_bytes(&json!("0xa9059cbb")).unwrap().to_vec(), vec![0xa9, 0x05, 0x9c, 0xbb]);
        assert!(parse_bytes(&json!("0xabc")).is_err());
    }

    #[test]
    fn test_parse_storage_key_pads_left() {
        let key = parse_storage_key(&json!("0x1")).unwrap();
        assert_eq!(key, B256::with_last_byte(1));

        let key = parse_storage_key(&json!("0x0102")).unwrap();
        assert_eq!(key[30..], [0x01, 0x02]);

        assert!(parse_storage_key(&json!("0xgg")).is_err());
    }

    #[test]
    fn test_required_rejects_null() {
        let params = vec![json!(null)];
        assert!(required(&params, 0, "address").is_err());
        assert!(required(&params, 1, "block").is_err());
        assert!(optional(&params, 0).is_none());
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_u64(0), "0x0");
        assert_eq!(format_u64(255), "0xff");
        assert_eq!(format_u256(U256::ZERO), "0x0");
        assert_eq!(format_bytes(&[]), "0x");
        assert_eq!(
            format_address(&Address::ZERO),
            "0x0000000000000000000000000000000000000000"
        );
    }
}
