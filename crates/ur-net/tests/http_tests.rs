//! HTTP adapter tests against a local server
//!
//! The server answers each accepted connection with the next scripted
//! response and records the raw requests it saw.

use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use ur_core::abi::{self, Token};
use ur_core::{Address, Node, RecordQuery, RecordValue};
use ur_net::{HttpGateway, RpcClient, TransportConfig};
use ur_resolver::{GatewayFetcher, Registry, ResolverKind, UniversalResolver};

const SENDER: Address = Address([0xab; 20]);
const REGISTRY: Address = Address([0x01; 20]);

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// Serve `responses` in order, one per connection
async fn serve(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            seen.push(read_request(&mut socket).await);
            let reply = format!(
                "HTTP/1.1 {} Scripted\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        }
        seen
    });
    (format!("http://{}", addr), handle)
}

fn rpc_result(data: &[u8]) -> String {
    format!(r#"{{"jsonrpc":"2.0","id":1,"result":"0x{}"}}"#, hex::encode(data))
}

fn gateway() -> HttpGateway {
    HttpGateway::from_config(&TransportConfig::default()).unwrap()
}

fn rpc(url: &str) -> RpcClient {
    RpcClient::new(TransportConfig::default().build_http_client().unwrap(), url, REGISTRY)
}

// ============================================================================
// Gateway
// ============================================================================

#[tokio::test]
async fn test_gateway_post() {
    let (base, server) = serve(vec![(200, r#"{"data":"0xbeef"}"#.to_string())]).await;
    let data = gateway()
        .fetch(&format!("{}/gw/{{sender}}", base), &SENDER, &[0x12, 0x34])
        .await
        .unwrap();
    assert_eq!(data, vec![0xbe, 0xef]);

    let seen = server.await.unwrap();
    assert!(seen[0].starts_with(&format!("POST /gw/0x{} ", "ab".repeat(20))));
    assert!(seen[0].contains(r#""data":"0x1234""#));
}

#[tokio::test]
async fn test_gateway_get() {
    let (base, server) = serve(vec![(200, r#"{"data":"0x"}"#.to_string())]).await;
    let data = gateway()
        .fetch(&format!("{}/{{sender}}/{{data}}.json", base), &SENDER, &[0x12, 0x34])
        .await
        .unwrap();
    assert!(data.is_empty());

    let seen = server.await.unwrap();
    assert!(seen[0].starts_with(&format!("GET /0x{}/0x1234.json ", "ab".repeat(20))));
}

#[tokio::test]
async fn test_gateway_status_error() {
    let (base, server) = serve(vec![(404, r#"{"message":"unknown name"}"#.to_string())]).await;
    let err = gateway()
        .fetch(&format!("{}/gw", base), &SENDER, &[0x01])
        .await
        .unwrap_err();
    match err {
        ur_core::Error::GatewayStatus { code, message } => {
            assert_eq!(code, 404);
            assert_eq!(message, "unknown name");
        }
        other => panic!("unexpected {:?}", other),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn test_gateway_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = gateway()
        .fetch(&format!("http://{}/gw", addr), &SENDER, &[0x01])
        .await
        .unwrap_err();
    assert!(matches!(err, ur_core::Error::FetchNetwork(_)));
    assert!(err.is_retryable());
}

// ============================================================================
// JSON-RPC
// ============================================================================

#[tokio::test]
async fn test_registry_lookup() {
    let authority = abi::encode(&[abi::address(Address([0x11; 20]))]);
    let zero = abi::encode(&[abi::address(Address::ZERO)]);
    let (url, server) = serve(vec![(200, rpc_result(&authority)), (200, rpc_result(&zero))]).await;
    let client = rpc(&url);

    let node = Node::namehash("nick.eth");
    assert_eq!(client.lookup(&node).await.unwrap(), Some(Address([0x11; 20])));
    assert_eq!(client.lookup(&node).await.unwrap(), None);

    let seen = server.await.unwrap();
    assert!(seen[0].contains("0x0178b8bf"));
    assert!(seen[0].contains(&hex::encode(node.as_bytes())));
    assert!(seen[0].contains(&REGISTRY.to_string()));
}

#[tokio::test]
async fn test_capabilities() {
    let yes = abi::encode(&[Token::Bool(true)]);
    let (url, server) = serve(vec![(200, rpc_result(&yes)), (200, rpc_result(&[]))]).await;
    let client = rpc(&url);

    assert_eq!(client.capabilities(&Address([0x11; 20])).await.unwrap(), ResolverKind::Extended);
    assert_eq!(client.capabilities(&Address([0x11; 20])).await.unwrap(), ResolverKind::ExactMatch);

    let seen = server.await.unwrap();
    assert!(seen[0].contains("0x01ffc9a79061b923"));
}

#[tokio::test]
async fn test_rpc_error_is_registry_failure() {
    let (url, server) = serve(vec![(
        200,
        r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32005,"message":"rate limited"}}"#.to_string(),
    )])
    .await;
    let err = rpc(&url).lookup(&Node::namehash("eth")).await.unwrap_err();
    assert!(matches!(err, ur_core::Error::Registry(_)));
    assert!(err.to_string().contains("rate limited"));
    server.await.unwrap();
}

#[tokio::test]
async fn test_resolve_over_rpc() {
    let authority = Address([0x22; 20]);
    let text = abi::encode(&[Token::String("https://nick.example".to_string())]);
    let (url, server) = serve(vec![
        (200, rpc_result(&abi::encode(&[abi::address(authority)]))),
        (200, rpc_result(&abi::encode(&[Token::Bool(false)]))),
        (200, rpc_result(&text)),
    ])
    .await;

    let client = Arc::new(rpc(&url));
    let resolver = UniversalResolver::new(client.clone(), client, Arc::new(gateway()));
    let query = RecordQuery::text("url");
    let resolution = resolver.resolve("nick.eth", &[query.clone()], &[]).await.unwrap();

    assert!(resolution.binding.found);
    assert_eq!(resolution.binding.authority, authority);
    assert_eq!(
        resolution.records[0].value(&query),
        Some(RecordValue::Text("https://nick.example".to_string()))
    );

    let seen = server.await.unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen[2].contains(&authority.to_string()));
}
