//! Resolver configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use ur_core::{Address, Error, Result};
use ur_params::{Network, DEFAULT_BATCH_GATEWAY};

/// Resolver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Longest chain of deferrals followed for one record
    pub max_redirect_depth: usize,
    /// Deadline for a whole request (milliseconds)
    pub request_timeout_ms: u64,
    /// Deadline for one gateway endpoint before trying the next (milliseconds)
    pub endpoint_timeout_ms: u64,
    /// Batch gateways used when a caller passes none
    pub batch_gateways: Vec<String>,
    /// Sender reported to batch gateways
    pub batch_sender: Address,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_redirect_depth: 8,
            request_timeout_ms: 30_000,
            endpoint_timeout_ms: 10_000,
            batch_gateways: vec![DEFAULT_BATCH_GATEWAY.to_string()],
            batch_sender: Address::ZERO,
        }
    }
}

impl ResolverConfig {
    /// Defaults with the batch gateways of a network
    pub fn for_network(network: &Network) -> Self {
        Self {
            batch_gateways: network.default_batch_gateways(),
            ..Default::default()
        }
    }

    /// Request deadline
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Per-endpoint deadline
    pub fn endpoint_timeout(&self) -> Duration {
        Duration::from_millis(self.endpoint_timeout_ms)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_redirect_depth == 0 {
            return Err(Error::Config("max_redirect_depth must be at least 1".to_string()));
        }
        if self.request_timeout_ms == 0 || self.endpoint_timeout_ms == 0 {
            return Err(Error::Config("timeouts must be non-zero".to_string()));
        }
        if let Some(bad) = self
            .batch_gateways
            .iter()
            .find(|url| !(url.starts_with("https://") || url.starts_with("http://")))
        {
            return Err(Error::Config(format!("batch gateway is not an http(s) url: {}", bad)));
        }
        Ok(())
    }
}
