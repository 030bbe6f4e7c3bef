pub mod eth;
pub mod net;
pub mod web3;

pub use eth::EthApi;
