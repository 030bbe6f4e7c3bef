pub mod args;
pub mod hexutil;
pub mod tx;

pub use args::{CallArgs, CallDefaults, SendTxArgs, DEFAULT_GAS_PRICE, DEFAULT_RPC_GAS_CAP};
pub use tx::{
    decode_raw_transaction, keccak256, CanonicalTransaction, DecodeError, DecodedTransaction,
    SignedTransaction,
};
