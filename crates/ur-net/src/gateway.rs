//! EIP-3668 gateway client
//!
//! URLs may carry `{sender}` and `{data}` placeholders. A URL with `{data}`
//! is fetched with GET, any other URL receives a JSON POST of
//! `{"sender", "data"}`. Gateways answer `{"data": "0x..."}`; error bodies
//! may carry `{"message": "..."}`.

use crate::debug_log::log_debug_event;
use crate::{Error, Result, TransportConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use ur_core::Address;
use ur_resolver::GatewayFetcher;

/// Request shape for one gateway URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayRequest {
    /// GET the expanded URL
    Get(String),
    /// POST a JSON body to the expanded URL
    Post {
        /// Expanded URL
        url: String,
        /// Body
        body: GatewayBody,
    },
}

/// JSON body of a POST request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayBody {
    /// Lowercase hex sender
    pub sender: String,
    /// Hex calldata
    pub data: String,
}

#[derive(Deserialize)]
struct GatewayReply {
    data: String,
}

#[derive(Deserialize)]
struct GatewayFailure {
    message: String,
}

/// Expand a gateway URL template for one request
pub fn build_request(url: &str, sender: &Address, data: &[u8]) -> GatewayRequest {
    let sender = sender.to_string();
    let data = format!("0x{}", hex::encode(data));
    let expanded = url.replace("{sender}", &sender);
    if url.contains("{data}") {
        GatewayRequest::Get(expanded.replace("{data}", &data))
    } else {
        GatewayRequest::Post {
            url: expanded,
            body: GatewayBody { sender, data },
        }
    }
}

/// Interpret a gateway HTTP response
pub fn parse_response(status: u16, body: &str) -> Result<Vec<u8>> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<GatewayFailure>(body)
            .map(|f| f.message)
            .unwrap_or_else(|_| body.trim().to_string());
        return Err(Error::Status {
            code: status,
            message,
        });
    }
    let reply: GatewayReply = serde_json::from_str(body)
        .map_err(|e| Error::InvalidResponse(format!("gateway body: {}", e)))?;
    ur_core::parse_hex_bytes(&reply.data)
        .map_err(|_| Error::InvalidResponse(format!("gateway data is not hex: {}", reply.data)))
}

/// HTTP gateway fetcher
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
}

impl HttpGateway {
    /// Wrap an existing client
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build from transport settings
    pub fn from_config(config: &TransportConfig) -> Result<Self> {
        Ok(Self::new(config.build_http_client()?))
    }

    /// Perform one gateway request
    pub async fn request(&self, url: &str, sender: &Address, data: &[u8]) -> Result<Vec<u8>> {
        let request = build_request(url, sender, data);
        let (target, builder) = match &request {
            GatewayRequest::Get(target) => (target.as_str(), self.client.get(target)),
            GatewayRequest::Post { url, body } => (url.as_str(), self.client.post(url).json(body)),
        };
        debug!("Gateway fetch: {} ({} bytes)", url, data.len());
        log_debug_event(
            "gateway.rs:HttpGateway::request",
            "gateway_fetch",
            &format!("url={} get={}", url, matches!(request, GatewayRequest::Get(_))),
        );

        let response = builder
            .send()
            .await
            .map_err(|e| Error::from_reqwest(target, e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::from_reqwest(target, e))?;

        let result = parse_response(status, &body);
        if let Err(e) = &result {
            log_debug_event("gateway.rs:HttpGateway::request", "gateway_error", &e.to_string());
        }
        result
    }
}

#[async_trait]
impl GatewayFetcher for HttpGateway {
    async fn fetch(&self, url: &str, sender: &Address, data: &[u8]) -> ur_core::Result<Vec<u8>> {
        Ok(self.request(url, sender, data).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENDER: Address = Address([0xab; 20]);

    #[test]
    fn test_get_template() {
        let request = build_request("https://gw.example/{sender}/{data}.json", &SENDER, &[0x12, 0x34]);
        assert_eq!(
            request,
            GatewayRequest::Get(format!("https://gw.example/0x{}/0x1234.json", "ab".repeat(20)))
        );
    }

    #[test]
    fn test_post_template() {
        let request = build_request("https://gw.example/{sender}", &SENDER, &[0xff]);
        let GatewayRequest::Post { url, body } = request else {
            panic!("expected POST");
        };
        assert_eq!(url, format!("https://gw.example/0x{}", "ab".repeat(20)));
        assert_eq!(body.data, "0xff");
        assert_eq!(body.sender, SENDER.to_string());
    }

    #[test]
    fn test_parse_ok() {
        assert_eq!(parse_response(200, r#"{"data":"0xdeadbeef"}"#).unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(parse_response(200, r#"{"data":"0x"}"#).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_parse_status() {
        match parse_response(404, r#"{"message":"unknown name"}"#).unwrap_err() {
            Error::Status { code, message } => {
                assert_eq!(code, 404);
                assert_eq!(message, "unknown name");
            }
            other => panic!("unexpected {:?}", other),
        }
        match parse_response(502, "Bad Gateway\n").unwrap_err() {
            Error::Status { code, message } => {
                assert_eq!(code, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(parse_response(200, "<html>"), Err(Error::InvalidResponse(_))));
        assert!(matches!(parse_response(200, r#"{"data":"zz"}"#), Err(Error::InvalidResponse(_))));
        assert!(matches!(parse_response(200, r#"{"result":"0x"}"#), Err(Error::InvalidResponse(_))));
    }
}
