//! Coin types and reverse-name suffixes (ENSIP-9, ENSIP-11, ENSIP-19)

use crate::{Error, Result};

/// High bit marking an EVM chain id encoded as a coin type
pub const EVM_BIT: u64 = 0x8000_0000;

/// Legacy coin type of Ethereum mainnet (SLIP-44)
pub const COIN_TYPE_ETH: u64 = 60;

/// Coin type of the chain-agnostic "default" EVM address
pub const COIN_TYPE_DEFAULT: u64 = EVM_BIT;

/// Top-level label of every reverse name
pub const REVERSE_ROOT: &str = "reverse";

/// Convert an EVM chain id into its coin type.
///
/// Mainnet keeps the legacy coin type 60; every other chain sets [`EVM_BIT`].
pub const fn coin_type_from_chain(chain: u64) -> u64 {
    if chain == 1 {
        COIN_TYPE_ETH
    } else {
        chain | EVM_BIT
    }
}

/// Recover the EVM chain id behind a coin type.
pub fn chain_from_coin_type(coin_type: u64) -> Result<u64> {
    if coin_type == COIN_TYPE_ETH {
        return Ok(1);
    }
    if is_evm_coin_type(coin_type) {
        Ok(coin_type ^ EVM_BIT)
    } else {
        Err(Error::NotEvmCoinType(coin_type))
    }
}

/// Check whether a coin type addresses an EVM chain (including the default).
pub const fn is_evm_coin_type(coin_type: u64) -> bool {
    coin_type == COIN_TYPE_ETH || (coin_type & EVM_BIT != 0 && coin_type >> 32 == 0)
}

/// Label that identifies a coin type inside the reverse namespace.
pub fn reverse_slug(coin_type: u64) -> String {
    match coin_type {
        COIN_TYPE_DEFAULT => "default".to_string(),
        COIN_TYPE_ETH => "addr".to_string(),
        other => format!("{:x}", other),
    }
}

/// Reverse namespace suffix for a coin type, e.g. `addr.reverse`.
pub fn reverse_suffix(coin_type: u64) -> String {
    format!("{}.{}", reverse_slug(coin_type), REVERSE_ROOT)
}
