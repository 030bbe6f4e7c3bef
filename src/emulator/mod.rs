pub mod block;
pub mod logs;
pub mod transaction;

pub use block::{parse_block_number, parse_block_number_or_latest, BlockNumber, RpcBlock};
pub use logs::RpcLog;
pub use transaction::{RpcReceipt, RpcTransaction};
