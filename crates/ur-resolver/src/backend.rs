//! Collaborator interfaces
//!
//! The engine never talks to a chain or to HTTP directly. Everything it
//! needs from the outside world goes through these three traits, which are
//! shared as `Arc<dyn ...>` across concurrent requests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ur_core::{Address, Node, Result};

/// Capability of an authority, resolved once per walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverKind {
    /// Answers `resolve(bytes,bytes)` for any descendant name
    Extended,
    /// Answers profile calls only for names it directly owns
    ExactMatch,
}

impl ResolverKind {
    /// Whether wildcard queries are accepted
    pub fn is_extended(&self) -> bool {
        matches!(self, ResolverKind::Extended)
    }
}

/// Result of calling an authority
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// Returned data
    Return(Vec<u8>),
    /// Reverted with data
    Revert(Vec<u8>),
}

/// Authoritative registry (read-only)
#[async_trait]
pub trait Registry: Send + Sync {
    /// Authority bound to `node`, if any
    async fn lookup(&self, node: &Node) -> Result<Option<Address>>;

    /// Capability of an authority
    async fn capabilities(&self, authority: &Address) -> Result<ResolverKind>;
}

/// Calls into authorities
#[async_trait]
pub trait ProfileTransport: Send + Sync {
    /// Call `to` with `data`
    async fn call(&self, to: &Address, data: &[u8]) -> Result<CallOutcome>;
}

/// Fetches deferred payloads from gateways
#[async_trait]
pub trait GatewayFetcher: Send + Sync {
    /// Fetch `data` on behalf of `sender` from `url`, returning the response payload
    async fn fetch(&self, url: &str, sender: &Address, data: &[u8]) -> Result<Vec<u8>>;
}
