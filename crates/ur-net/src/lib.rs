//! Network adapters for the universal resolver
//!
//! HTTP transport (direct or SOCKS5), an EIP-3668 gateway client, a JSON-RPC
//! `eth_call` client acting as registry and profile transport, and stored
//! JSON configuration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod debug_log;
pub mod error;
pub mod gateway;
pub mod rpc;
mod transport;
pub mod transport_config;

// Re-export main types
pub use debug_log::log_debug_event;
pub use error::{Error, Result};
pub use gateway::{GatewayRequest, HttpGateway};
pub use rpc::RpcClient;
pub use transport::{Socks5Config, TransportConfig, TransportMode};
pub use transport_config::{ConfigStorage, StoredConfig};
