//! Configuration storage
//!
//! One JSON document holding the RPC endpoint, transport settings and
//! resolver configuration.

use crate::{Error, HttpGateway, Result, RpcClient, TransportConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use ur_params::{Network, NetworkType};
use ur_resolver::{ResolverConfig, UniversalResolver};

/// Persistent configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredConfig {
    /// Network preset
    pub network: NetworkType,
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Transport settings
    pub transport: TransportConfig,
    /// Resolver settings
    pub resolver: ResolverConfig,
}

impl Default for StoredConfig {
    fn default() -> Self {
        let network = Network::mainnet();
        Self {
            network: network.network_type,
            rpc_url: "http://127.0.0.1:8545".to_string(),
            transport: TransportConfig::default(),
            resolver: ResolverConfig::for_network(&network),
        }
    }
}

impl StoredConfig {
    /// Reject configurations that cannot be used
    pub fn validate(&self) -> Result<()> {
        if !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://")) {
            return Err(Error::Config(format!("rpc_url is not an http(s) url: {}", self.rpc_url)));
        }
        self.resolver
            .validate()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Wire an RPC-backed resolver from this configuration
    pub fn build_resolver(&self) -> Result<UniversalResolver> {
        self.validate()?;
        let network = Network::from_type(self.network);
        let rpc = Arc::new(RpcClient::for_network(&self.transport, self.rpc_url.clone(), &network)?);
        let gateway = Arc::new(HttpGateway::from_config(&self.transport)?);
        info!(
            "Resolver on {} via {} ({})",
            network.name,
            self.rpc_url,
            self.transport.mode.name()
        );
        Ok(UniversalResolver::with_config(rpc.clone(), rpc, gateway, self.resolver.clone()))
    }
}

/// Configuration storage manager
pub struct ConfigStorage {
    path: PathBuf,
    config: StoredConfig,
}

impl ConfigStorage {
    /// Open the configuration at `path`, using defaults when the file is missing
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = if path.exists() {
            let json = std::fs::read_to_string(&path)?;
            Self::parse(&json)?
        } else {
            StoredConfig::default()
        };
        Ok(Self { path, config })
    }

    /// Parse a configuration document
    pub fn parse(json: &str) -> Result<StoredConfig> {
        serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Write the configuration back to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.config)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get current configuration
    pub fn get(&self) -> &StoredConfig {
        &self.config
    }

    /// Update configuration
    pub fn update(&mut self, config: StoredConfig) {
        self.config = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransportMode;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ConfigStorage::open(dir.path().join("ur.json")).unwrap();
        assert_eq!(storage.get(), &StoredConfig::default());
        assert!(storage.get().validate().is_ok());
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ur.json");

        let mut storage = ConfigStorage::open(&path).unwrap();
        let mut config = storage.get().clone();
        config.network = NetworkType::Sepolia;
        config.rpc_url = "https://rpc.sepolia.example".to_string();
        config.transport.mode = TransportMode::Socks5;
        config.resolver.max_redirect_depth = 4;
        storage.update(config.clone());
        storage.save().unwrap();

        let reopened = ConfigStorage::open(&path).unwrap();
        assert_eq!(reopened.get(), &config);
    }

    #[test]
    fn test_partial_document() {
        let config = ConfigStorage::parse(r#"{"rpc_url":"https://rpc.example","resolver":{"max_redirect_depth":2}}"#)
            .unwrap();
        assert_eq!(config.network, NetworkType::Mainnet);
        assert_eq!(config.resolver.max_redirect_depth, 2);
        assert_eq!(config.resolver.endpoint_timeout_ms, 10_000);
        assert_eq!(config.transport.mode, TransportMode::Direct);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ConfigStorage::parse("{not json").is_err());

        let config = StoredConfig {
            rpc_url: "ws://node".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = StoredConfig::default();
        config.resolver.max_redirect_depth = 0;
        assert!(config.build_resolver().is_err());
    }

    #[test]
    fn test_build_resolver() {
        let resolver = StoredConfig::default().build_resolver().unwrap();
        assert_eq!(resolver.config().max_redirect_depth, 8);
    }
}
