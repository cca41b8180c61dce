//! Deployment constants per network

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Public batch gateway operated for the ENS deployment
pub const DEFAULT_BATCH_GATEWAY: &str = "https://ccip-v2.ens.xyz";

/// Network type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// Ethereum mainnet
    Mainnet,
    /// Sepolia testnet
    Sepolia,
    /// Holesky testnet
    Holesky,
}

/// Network configuration
#[derive(Debug, Clone)]
pub struct Network {
    /// Network type
    pub network_type: NetworkType,
    /// Human-readable name
    pub name: &'static str,
    /// EVM chain id
    pub chain_id: u64,
    /// Registry contract address (hex)
    pub registry: &'static str,
    /// Batch gateways used when a caller supplies none
    pub batch_gateways: &'static [&'static str],
}

impl Network {
    /// Get mainnet parameters
    pub const fn mainnet() -> Self {
        Self {
            network_type: NetworkType::Mainnet,
            name: "mainnet",
            chain_id: 1,
            registry: "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e",
            batch_gateways: &[DEFAULT_BATCH_GATEWAY],
        }
    }

    /// Get sepolia parameters
    pub const fn sepolia() -> Self {
        Self {
            network_type: NetworkType::Sepolia,
            name: "sepolia",
            chain_id: 11_155_111,
            registry: "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e",
            batch_gateways: &[DEFAULT_BATCH_GATEWAY],
        }
    }

    /// Get holesky parameters
    pub const fn holesky() -> Self {
        Self {
            network_type: NetworkType::Holesky,
            name: "holesky",
            chain_id: 17_000,
            registry: "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e",
            batch_gateways: &[DEFAULT_BATCH_GATEWAY],
        }
    }

    /// Get network by type
    pub const fn from_type(network_type: NetworkType) -> Self {
        match network_type {
            NetworkType::Mainnet => Self::mainnet(),
            NetworkType::Sepolia => Self::sepolia(),
            NetworkType::Holesky => Self::holesky(),
        }
    }

    /// Look a network up by name
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Self::mainnet()),
            "sepolia" => Ok(Self::sepolia()),
            "holesky" => Ok(Self::holesky()),
            other => Err(Error::InvalidNetwork(other.to_string())),
        }
    }

    /// Batch gateways as owned strings
    pub fn default_batch_gateways(&self) -> Vec<String> {
        self.batch_gateways.iter().map(|url| url.to_string()).collect()
    }
}
