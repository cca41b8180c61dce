//! JSON-RPC `eth_call` client
//!
//! Serves as both the registry and the profile transport: registry lookups
//! are `resolver(bytes32)` calls on the registry contract, capabilities are
//! checked with `supportsInterface(bytes4)`.
//!
//! Requests and responses use the `ethers` call and error types but go over
//! the configured `reqwest` client, so SOCKS5 routing applies to RPC too.

use crate::debug_log::log_debug_event;
use crate::{Error, Result, TransportConfig};
use async_trait::async_trait;
use ethers::providers::JsonRpcError;
use ethers::types::{BlockNumber, Bytes, TransactionRequest, H160};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use ur_core::abi::{self, ParamType, Token, TokenExt};
use ur_core::{selector, Address, Node};
use ur_params::Network;
use ur_resolver::{CallOutcome, ProfileTransport, Registry, ResolverKind};

/// Interface id of `resolve(bytes,bytes)`
pub const EXTENDED_INTERFACE_ID: [u8; 4] = [0x90, 0x61, 0xb9, 0x23];

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: (&'a TransactionRequest, BlockNumber),
}

/// JSON-RPC response envelope
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    /// Successful result
    #[serde(default)]
    pub result: Option<Bytes>,
    /// Error object
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// Turn an `eth_call` response into a call outcome
pub fn parse_call_response(response: RpcResponse) -> Result<CallOutcome> {
    if let Some(error) = response.error {
        let revert = match &error.data {
            Some(serde_json::Value::String(data)) => ur_core::parse_hex_bytes(data).ok(),
            Some(serde_json::Value::Object(inner)) => inner
                .get("data")
                .and_then(|d| d.as_str())
                .and_then(|d| ur_core::parse_hex_bytes(d).ok()),
            _ => None,
        };
        return match revert {
            Some(data) => Ok(CallOutcome::Revert(data)),
            None => Err(Error::Rpc {
                code: error.code,
                message: error.message,
            }),
        };
    }
    let result = response
        .result
        .ok_or_else(|| Error::InvalidResponse("response has neither result nor error".to_string()))?;
    Ok(CallOutcome::Return(result.to_vec()))
}

/// `eth_call` client bound to one registry contract
#[derive(Clone)]
pub struct RpcClient {
    client: reqwest::Client,
    url: String,
    registry: Address,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    /// Create a client for `url` using `registry` as the registry contract
    pub fn new(client: reqwest::Client, url: impl Into<String>, registry: Address) -> Self {
        Self {
            client,
            url: url.into(),
            registry,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Client for a network preset
    pub fn for_network(config: &TransportConfig, url: impl Into<String>, network: &Network) -> Result<Self> {
        let registry: Address = network
            .registry
            .parse()
            .map_err(|e| Error::Config(format!("registry address of {}: {}", network.name, e)))?;
        Ok(Self::new(config.build_http_client()?, url, registry))
    }

    /// Registry contract
    pub fn registry(&self) -> Address {
        self.registry
    }

    /// Execute `eth_call` at the latest block
    pub async fn eth_call(&self, to: &Address, data: &[u8]) -> Result<CallOutcome> {
        let tx = TransactionRequest::new()
            .to(H160::from(*to))
            .data(Bytes::from(data.to_vec()));
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: "eth_call",
            params: (&tx, BlockNumber::Latest),
        };
        debug!("eth_call to {} ({} bytes)", to, data.len());
        log_debug_event(
            "rpc.rs:RpcClient::eth_call",
            "eth_call",
            &format!("to={} id={}", to, request.id),
        );

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(&self.url, e))?;

        if !response.status().is_success() {
            return Err(Error::Status {
                code: response.status().as_u16(),
                message: format!("RPC endpoint {}", self.url),
            });
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(format!("JSON decode error: {}", e)))?;
        parse_call_response(body)
    }
}

#[async_trait]
impl Registry for RpcClient {
    async fn lookup(&self, node: &Node) -> ur_core::Result<Option<Address>> {
        let data = abi::encode_call(
            selector("resolver(bytes32)"),
            &[Token::FixedBytes(node.as_bytes().to_vec())],
        );
        let outcome = self
            .eth_call(&self.registry, &data)
            .await
            .map_err(|e| ur_core::Error::Registry(e.to_string()))?;
        match outcome {
            CallOutcome::Return(bytes) => {
                let authority = abi::decode_single(ParamType::Address, &bytes)
                    .and_then(TokenExt::take_address)
                    .map_err(|e| ur_core::Error::Registry(format!("resolver(bytes32): {}", e)))?;
                Ok(Some(authority).filter(|a| !a.is_zero()))
            }
            CallOutcome::Revert(bytes) => Err(ur_core::Error::Registry(format!(
                "registry reverted: 0x{}",
                hex::encode(bytes)
            ))),
        }
    }

    async fn capabilities(&self, authority: &Address) -> ur_core::Result<ResolverKind> {
        let data = abi::encode_call(
            selector("supportsInterface(bytes4)"),
            &[Token::FixedBytes(EXTENDED_INTERFACE_ID.to_vec())],
        );
        let outcome = self
            .eth_call(authority, &data)
            .await
            .map_err(|e| ur_core::Error::Registry(e.to_string()))?;
        let extended = match outcome {
            CallOutcome::Return(bytes) => abi::decode_single(ParamType::Bool, &bytes)
                .and_then(TokenExt::take_bool)
                .unwrap_or(false),
            CallOutcome::Revert(_) => false,
        };
        Ok(if extended {
            ResolverKind::Extended
        } else {
            ResolverKind::ExactMatch
        })
    }
}

#[async_trait]
impl ProfileTransport for RpcClient {
    async fn call(&self, to: &Address, data: &[u8]) -> ur_core::Result<CallOutcome> {
        self.eth_call(to, data)
            .await
            .map_err(|e| ur_core::Error::ProfileCallFailed(e.to_string()))
    }
}
