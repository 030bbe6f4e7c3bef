use alloy_primitives::{Address, Bytes, B256, U256};
use rlp::{Rlp, RlpStream};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use thiserror::Error;
use tracing::debug;

/// EIP-2718 type byte of an EIP-2930 access-list transaction.
pub const ACCESS_LIST_TX_TYPE: u8 = 0x01;
/// EIP-2718 type byte of an EIP-1559 dynamic-fee transaction.
pub const DYNAMIC_FEE_TX_TYPE: u8 = 0x02;

/// Raw transaction bytes that could not be decoded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty transaction")]
    Empty,

    #[error("unsupported transaction type: 0x{0:02x}")]
    UnsupportedType(u8),

    #[error("transaction is not an RLP list")]
    NotAList,

    #[error("unexpected RLP item count {found} for {kind} transaction")]
    FieldCount { kind: &'static str, found: usize },

    #[error("trailing bytes after transaction payload")]
    TrailingBytes,

    #[error("invalid field {field}: {reason}")]
    Field { field: &'static str, reason: String },
}

/// A fully defaulted transaction, ready for the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    /// None for contract creation
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
}

/// A legacy transaction signed with an EIP-155 replay-protected signature.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub transaction: CanonicalTransaction,
    pub v: u64,
    pub r: U256,
    pub s: U256,
    /// RLP wire encoding
    pub raw: Vec<u8>,
    /// keccak256 of `raw`
    pub hash: B256,
}

/// Fields recovered from raw signed transaction bytes.
#[derive(Debug, Clone)]
pub struct DecodedTransaction {
    /// 0 for legacy transactions
    pub tx_type: u8,
    pub chain_id: Option<u64>,
    pub nonce: u64,
    /// Gas price, or max fee per gas for dynamic-fee transactions
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub v: u64,
    pub r: U256,
    pub s: U256,
    pub hash: B256,
}

pub fn keccak256(data: &[u8]) -> B256 {
    B256::from_slice(&Keccak256::digest(data))
}

/// Big-endian bytes of `value` without leading zeros, the RLP integer form.
fn u256_to_rlp_bytes(value: &U256) -> Vec<u8> {
    let bytes = value.to_be_bytes::<32>();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

impl CanonicalTransaction {
    fn append_unsigned_fields(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        stream.append(&u256_to_rlp_bytes(&self.gas_price));
        stream.append(&self.gas_limit);
        match &self.to {
            Some(to) => stream.append(&to.as_slice().to_vec()),
            None => stream.append_empty_data(),
        };
        stream.append(&u256_to_rlp_bytes(&self.value));
        stream.append(&self.data.to_vec());
    }

    /// The EIP-155 signing payload: `rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0])`.
    pub fn signing_payload(&self, chain_id: u64) -> Vec<u8> {
        let mut stream = RlpStream::new_list(9);
        self.append_unsigned_fields(&mut stream);
        stream.append(&chain_id);
        stream.append_empty_data();
        stream.append_empty_data();
        stream.out().to_vec()
    }

    pub fn signing_hash(&self, chain_id: u64) -> B256 {
        keccak256(&self.signing_payload(chain_id))
    }

    /// Attach a signature and produce the wire encoding and hash.
    pub fn into_signed(self, v: u64, r: U256, s: U256) -> SignedTransaction {
        let mut stream = RlpStream::new_list(9);
        self.append_unsigned_fields(&mut stream);
        stream.append(&v);
        stream.append(&u256_to_rlp_bytes(&r));
        stream.append(&u256_to_rlp_bytes(&s));
        let raw = stream.out().to_vec();
        let hash = keccak256(&raw);

        SignedTransaction {
            transaction: self,
            v,
            r,
            s,
            raw,
            hash,
        }
    }
}

fn field_err(field: &'static str, err: impl std::fmt::Display) -> DecodeError {
    DecodeError::Field {
        field,
        reason: err.to_string(),
    }
}

fn u64_at(rlp: &Rlp, index: usize, field: &'static str) -> Result<u64, DecodeError> {
    rlp.val_at::<u64>(index).map_err(|e| field_err(field, e))
}

fn u256_at(rlp: &Rlp, index: usize, field: &'static str) -> Result<U256, DecodeError> {
    let bytes: Vec<u8> = rlp.val_at(index).map_err(|e| field_err(field, e))?;
    if bytes.len() > 32 {
        return Err(field_err(field, format!("{} bytes exceeds 256 bits", bytes.len())));
    }
    Ok(U256::from_be_slice(&bytes))
}

fn to_at(rlp: &Rlp, index: usize) -> Result<Option<Address>, DecodeError> {
    let bytes: Vec<u8> = rlp.val_at(index).map_err(|e| field_err("to", e))?;
    match bytes.len() {
        0 => Ok(None),
        20 => Ok(Some(Address::from_slice(&bytes))),
        n => Err(field_err("to", format!("expected 20 bytes, got {}", n))),
    }
}

fn data_at(rlp: &Rlp, index: usize) -> Result<Bytes, DecodeError> {
    let bytes: Vec<u8> = rlp.val_at(index).map_err(|e| field_err("data", e))?;
    Ok(Bytes::from(bytes))
}

/// Open the RLP list in `payload`, checking nothing trails it.
fn open_list(payload: &[u8]) -> Result<Rlp<'_>, DecodeError> {
    let rlp = Rlp::new(payload);
    if !rlp.is_list() {
        return Err(DecodeError::NotAList);
    }
    let info = rlp.payload_info().map_err(|e| field_err("payload", e))?;
    if info.total() > payload.len() {
        return Err(field_err("payload", "truncated"));
    }
    if info.total() < payload.len() {
        return Err(DecodeError::TrailingBytes);
    }
    Ok(rlp)
}

/// Decode signed transaction wire bytes.
///
/// Accepts legacy (with or without EIP-155), EIP-2930 and EIP-1559
/// envelopes. The hash is keccak256 over the exact input bytes.
pub fn decode_raw_transaction(raw: &[u8]) -> Result<DecodedTransaction, DecodeError> {
    let first = *raw.first().ok_or(DecodeError::Empty)?;
    let hash = keccak256(raw);

    // A legacy transaction starts with an RLP list header (>= 0xc0).
    if first >= 0xc0 {
        return decode_legacy(raw, hash);
    }

    match first {
        ACCESS_LIST_TX_TYPE => decode_typed(&raw[1..], first, 11, hash),
        DYNAMIC_FEE_TX_TYPE => decode_typed(&raw[1..], first, 12, hash),
        other => Err(DecodeError::UnsupportedType(other)),
    }
}

fn decode_legacy(raw: &[u8], hash: B256) -> Result<DecodedTransaction, DecodeError> {
    let rlp = open_list(raw)?;
    let count = rlp.item_count().map_err(|e| field_err("payload", e))?;
    if count != 9 {
        return Err(DecodeError::FieldCount {
            kind: "legacy",
            found: count,
        });
    }

    let v = u64_at(&rlp, 6, "v")?;
    // EIP-155: v = chainId * 2 + 35 + recovery id
    let chain_id = if v >= 35 { Some((v - 35) / 2) } else { None };

    let decoded = DecodedTransaction {
        tx_type: 0,
        chain_id,
        nonce: u64_at(&rlp, 0, "nonce")?,
        gas_price: u256_at(&rlp, 1, "gasPrice")?,
        gas_limit: u64_at(&rlp, 2, "gas")?,
        to: to_at(&rlp, 3)?,
        value: u256_at(&rlp, 4, "value")?,
        data: data_at(&rlp, 5)?,
        v,
        r: u256_at(&rlp, 7, "r")?,
        s: u256_at(&rlp, 8, "s")?,
        hash,
    };

    debug!(
        "Decoded legacy tx: nonce={}, chain_id={:?}, to={:?}",
        decoded.nonce, decoded.chain_id, decoded.to
    );
    Ok(decoded)
}

fn decode_typed(
    payload: &[u8],
    tx_type: u8,
    expected: usize,
    hash: B256,
) -> Result<DecodedTransaction, DecodeError> {
    let kind = if tx_type == DYNAMIC_FEE_TX_TYPE {
        "dynamic-fee"
    } else {
        "access-list"
    };
    let rlp = open_list(payload)?;
    let count = rlp.item_count().map_err(|e| field_err("payload", e))?;
    if count != expected {
        return Err(DecodeError::FieldCount { kind, found: count });
    }

    // Dynamic-fee transactions carry maxPriorityFeePerGas before maxFeePerGas,
    // shifting every later field by one.
    let shift = if tx_type == DYNAMIC_FEE_TX_TYPE { 1 } else { 0 };

    let decoded = DecodedTransaction {
        tx_type,
        chain_id: Some(u64_at(&rlp, 0, "chainId")?),
        nonce: u64_at(&rlp, 1, "nonce")?,
        gas_price: u256_at(&rlp, 2 + shift, "gasPrice")?,
        gas_limit: u64_at(&rlp, 3 + shift, "gas")?,
        to: to_at(&rlp, 4 + shift)?,
        value: u256_at(&rlp, 5 + shift, "value")?,
        data: data_at(&rlp, 6 + shift)?,
        v: u64_at(&rlp, 8 + shift, "yParity")?,
        r: u256_at(&rlp, 9 + shift, "r")?,
        s: u256_at(&rlp, 10 + shift, "s")?,
        hash,
    };

    debug!(
        "Decoded {} tx: nonce={}, chain_id={:?}, to={:?}",
        kind, decoded.nonce, decoded.chain_id, decoded.to
    );
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Example transaction from EIP-155.
    fn eip155_example() -> CanonicalTransaction {
        CanonicalTransaction {
            nonce: 9,
            gas_price: U256::from(20_000_000_000u64),
            gas_limit: 21000,
            to: Some(Address::repeat_byte(0x35)),
            value: U256::from(1_000_000_000_000_000_000u64),
            data: Bytes::new(),
        }
    }

    const EIP155_SIGNED: &str = "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83";

    #[test]
    fn test_eip155_signing_payload() {
        let tx = eip155_example();
        assert_eq!(
            hex::encode(tx.signing_payload(1)),
            "ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080"
        );
        assert_eq!(
            hex::encode(tx.signing_hash(1)),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn test_decode_eip155_legacy() {
        let raw = hex::decode(EIP155_SIGNED).unwrap();
        let decoded = decode_raw_transaction(&raw).unwrap();

        assert_eq!(decoded.tx_type, 0);
        assert_eq!(decoded.chain_id, Some(1));
        assert_eq!(decoded.nonce, 9);
        assert_eq!(decoded.gas_limit, 21000);
        assert_eq!(decoded.to, Some(Address::repeat_byte(0x35)));
        assert_eq!(decoded.v, 37);
        assert_eq!(decoded.hash, keccak256(&raw));
    }

    #[test]
    fn test_into_signed_reproduces_wire_bytes() {
        let raw = hex::decode(EIP155_SIGNED).unwrap();
        let decoded = decode_raw_transaction(&raw).unwrap();

        let signed = eip155_example().into_signed(decoded.v, decoded.r, decoded.s);
        assert_eq!(signed.raw, raw);
        assert_eq!(signed.hash, decoded.hash);
    }

    #[test]
    fn test_contract_creation_has_empty_to() {
        let mut tx = eip155_example();
        tx.to = None;
        let signed = tx.into_signed(37, U256::from(1), U256::from(1));
        let decoded = decode_raw_transaction(&signed.raw).unwrap();
        assert_eq!(decoded.to, None);
    }

    #[test]
    fn test_decode_dynamic_fee() {
        let to = Address::repeat_byte(0x11);
        let mut stream = RlpStream::new_list(12);
        stream.append(&5u64); // chain id
        stream.append(&3u64); // nonce
        stream.append(&1_000_000_000u64); // max priority fee
        stream.append(&2_000_000_000u64); // max fee
        stream.append(&50_000u64);
        stream.append(&to.as_slice().to_vec());
        stream.append(&7u64);
        stream.append(&vec![0xaau8, 0xbb]);
        stream.begin_list(0);
        stream.append(&1u64);
        stream.append(&vec![0x01u8; 32]);
        stream.append(&vec![0x02u8; 32]);

        let mut raw = vec![DYNAMIC_FEE_TX_TYPE];
        raw.extend_from_slice(&stream.out());

        let decoded = decode_raw_transaction(&raw).unwrap();
        assert_eq!(decoded.tx_type, 2);
        assert_eq!(decoded.chain_id, Some(5));
        assert_eq!(decoded.nonce, 3);
        assert_eq!(decoded.gas_price, U256::from(2_000_000_000u64));
        assert_eq!(decoded.gas_limit, 50_000);
        assert_eq!(decoded.to, Some(to));
        assert_eq!(decoded.value, U256::from(7));
        assert_eq!(decoded.data.to_vec(), vec![0xaa, 0xbb]);
        assert_eq!(decoded.hash, keccak256(&raw));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert_eq!(decode_raw_transaction(&[]).unwrap_err(), DecodeError::Empty);
        assert_eq!(
            decode_raw_transaction(&[0x05, 0xc0]).unwrap_err(),
            DecodeError::UnsupportedType(0x05)
        );
        assert!(matches!(
            decode_raw_transaction(&[0xc1, 0x80]).unwrap_err(),
            DecodeError::FieldCount { found: 1, .. }
        ));

        let mut raw = hex::decode(EIP155_SIGNED).unwrap();
        raw.push(0x00);
        assert_eq!(decode_raw_transaction(&raw).unwrap_err(), DecodeError::TrailingBytes);

        let mut truncated = hex::decode(EIP155_SIGNED).unwrap();
        truncated.truncate(40);
        assert!(decode_raw_transaction(&truncated).is_err());
    }
}
