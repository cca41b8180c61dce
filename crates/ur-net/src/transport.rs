//! HTTP transport used for gateways and JSON-RPC
//!
//! Direct connections or a SOCKS5 proxy (`socks5h`, so hostnames are
//! resolved by the proxy).

use crate::debug_log::log_debug_event;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Transport mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Direct connection
    #[default]
    Direct,
    /// SOCKS5 proxy
    Socks5,
}

impl TransportMode {
    /// Get mode name
    pub fn name(&self) -> &str {
        match self {
            Self::Direct => "Direct",
            Self::Socks5 => "SOCKS5 Proxy",
        }
    }

    /// Check if traffic leaves through a proxy
    pub fn is_proxied(&self) -> bool {
        matches!(self, Self::Socks5)
    }
}

/// SOCKS5 configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Socks5Config {
    /// Host address
    pub host: String,
    /// Port
    pub port: u16,
    /// Username (optional)
    #[serde(default)]
    pub username: Option<String>,
    /// Password (optional)
    #[serde(default)]
    pub password: Option<String>,
}

impl Socks5Config {
    /// Get proxy URL
    pub fn proxy_url(&self) -> String {
        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            format!("socks5h://{}:{}@{}:{}", user, pass, self.host, self.port)
        } else {
            format!("socks5h://{}:{}", self.host, self.port)
        }
    }
}

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Transport mode
    pub mode: TransportMode,
    /// SOCKS5 config (if mode is SOCKS5)
    pub socks5: Option<Socks5Config>,
    /// Per HTTP request timeout (seconds)
    pub request_timeout_secs: u64,
    /// User-Agent header
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::Direct,
            socks5: None,
            request_timeout_secs: 30,
            user_agent: concat!("ur-net/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl TransportConfig {
    /// Per HTTP request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Build an HTTP client honoring the mode
    pub fn build_http_client(&self) -> Result<reqwest::Client> {
        let socks5_summary = self
            .socks5
            .as_ref()
            .map(|socks5| {
                let has_auth = socks5.username.as_ref().is_some_and(|u| !u.is_empty())
                    || socks5.password.as_ref().is_some_and(|p| !p.is_empty());
                format!("proxy={}:{} auth={}", socks5.host, socks5.port, has_auth)
            })
            .unwrap_or_else(|| "none".to_string());
        log_debug_event(
            "transport.rs:TransportConfig::build_http_client",
            "build_http_client",
            &format!("mode={:?} socks5={}", self.mode, socks5_summary),
        );

        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request timeout must be non-zero".to_string()));
        }

        let mut client_builder = reqwest::Client::builder()
            .timeout(self.request_timeout())
            .user_agent(self.user_agent.clone());

        match self.mode {
            TransportMode::Socks5 => {
                let socks5 = self
                    .socks5
                    .as_ref()
                    .ok_or_else(|| Error::Config("SOCKS5 config not provided".to_string()))?;
                let proxy_url = socks5.proxy_url();
                debug!("Creating HTTP client with SOCKS5 proxy: {}:{}", socks5.host, socks5.port);
                let proxy = reqwest::Proxy::all(&proxy_url)
                    .map_err(|e| Error::Config(format!("Failed to create SOCKS5 proxy: {}", e)))?;
                client_builder = client_builder.proxy(proxy);
            }
            TransportMode::Direct => {
                if self.socks5.is_some() {
                    warn!("SOCKS5 settings present but transport mode is direct");
                }
                client_builder = client_builder.no_proxy();
            }
        }

        client_builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))
    }
}
