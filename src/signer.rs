//! Local signer registry.
//!
//! Holds the test keys an operator opted in for `eth_sendTransaction`.
//! Built once, never mutated, shared by every request.

use std::collections::BTreeMap;
use std::fmt;

use alloy_primitives::{Address, U256};
use k256::ecdsa::{RecoveryId, SigningKey};
use thiserror::Error;
use tracing::{info, warn};

use crate::translator::tx::{keccak256, CanonicalTransaction, SignedTransaction};

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// Derive the Ethereum address of a secp256k1 key.
pub fn address_of(key: &SigningKey) -> Address {
    let point = key.verifying_key().to_encoded_point(false);
    // Skip the 0x04 uncompressed prefix
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Parse a hex private key, with or without `0x`.
pub fn parse_private_key(hex_key: &str) -> Result<SigningKey, SignerError> {
    let trimmed = hex_key.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(digits).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(SignerError::InvalidKey(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    SigningKey::from_slice(&bytes).map_err(|e| SignerError::InvalidKey(e.to_string()))
}

/// Address-to-key map. Iteration order is byte order of the address.
#[derive(Default)]
pub struct SignerRegistry {
    keys: BTreeMap<Address, SigningKey>,
}

impl fmt::Debug for SignerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerRegistry")
            .field("accounts", &self.addresses())
            .finish()
    }
}

impl SignerRegistry {
    /// Load hex keys, skipping entries that do not parse.
    pub fn from_hex_keys<S: AsRef<str>>(hex_keys: &[S]) -> Self {
        let mut keys = BTreeMap::new();
        for (i, hex_key) in hex_keys.iter().enumerate() {
            match parse_private_key(hex_key.as_ref()) {
                Ok(key) => {
                    let address = address_of(&key);
                    info!("Loaded test account {}", address.to_checksum(None));
                    keys.insert(address, key);
                }
                Err(e) => warn!("Skipping test key #{}: {}", i, e),
            }
        }
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key registered for `address`, if any.
    pub fn key(&self, address: &Address) -> Option<&SigningKey> {
        self.keys.get(address)
    }

    /// Registered addresses in ascending byte order.
    pub fn addresses(&self) -> Vec<Address> {
        self.keys.keys().copied().collect()
    }
}

/// Sign `tx` with `key`, binding `chain_id` per EIP-155.
pub fn sign_transaction(
    key: &SigningKey,
    tx: CanonicalTransaction,
    chain_id: u64,
) -> Result<SignedTransaction, SignerError> {
    let digest = tx.signing_hash(chain_id);
    let (mut signature, mut recovery_id) = key
        .sign_prehash_recoverable(digest.as_slice())
        .map_err(|e| SignerError::SigningFailed(e.to_string()))?;

    // EIP-2: only low-s signatures are valid
    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let v = chain_id
        .checked_mul(2)
        .and_then(|x| x.checked_add(35 + u64::from(recovery_id.to_byte())))
        .ok_or_else(|| SignerError::SigningFailed(format!("chain id {} too large", chain_id)))?;

    let bytes = signature.to_bytes();
    let r = U256::from_be_slice(&bytes[..32]);
    let s = U256::from_be_slice(&bytes[32..]);

    Ok(tx.into_signed(v, r, s))
}
