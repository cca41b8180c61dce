//! Universal resolver network parameters and constants
//!
//! This crate provides coin-type arithmetic, reverse-name suffixes and the
//! per-network deployment constants (registry address, batch gateways).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod coin_type;
pub mod network;

pub use coin_type::{
    chain_from_coin_type, coin_type_from_chain, is_evm_coin_type, reverse_slug, reverse_suffix,
    COIN_TYPE_DEFAULT, COIN_TYPE_ETH, EVM_BIT, REVERSE_ROOT,
};
pub use network::{Network, NetworkType, DEFAULT_BATCH_GATEWAY};

/// Error types for parameter operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid network specified
    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    /// Coin type does not describe an EVM chain
    #[error("Coin type {0:#x} is not an EVM coin type")]
    NotEvmCoinType(u64),
}

/// Result type for parameter operations
pub type Result<T> = std::result::Result<T, Error>;
