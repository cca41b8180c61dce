//! In-memory collaborators for tests
//!
//! `MemoryRegistry` maps names to authorities, `MockChain` simulates the
//! authorities themselves (on-chain, extended, deferring, misbehaving) and
//! `MockGateway` plays both plain gateways and batch gateways.

use crate::backend::{CallOutcome, GatewayFetcher, ProfileTransport, Registry, ResolverKind};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use ur_core::abi::{self, ParamType, Token, TokenExt};
use ur_core::{
    selector, Address, BatchQuery, BatchReply, DeferredAnswer, Error, Node, RecordQuery, Result,
    SubResponse,
};

/// Resumption entrypoint used by the simulated authorities
pub const CALLBACK_SIGNATURE: &str = "resolveCallback(bytes,bytes)";

/// Signature of the extended entrypoint
pub const RESOLVE_SIGNATURE: &str = "resolve(bytes,bytes)";

/// Calldata of `query` against `name`
pub fn calldata(name: &str, query: &RecordQuery) -> Vec<u8> {
    query
        .encode_call(&Node::namehash(name))
        .expect("test query must encode")
}

/// ABI-encoded `address` answer
pub fn address_answer(addr: Address) -> Vec<u8> {
    abi::encode(&[abi::address(addr)])
}

/// ABI-encoded `bytes` answer
pub fn bytes_answer(bytes: &[u8]) -> Vec<u8> {
    abi::encode(&[Token::Bytes(bytes.to_vec())])
}

/// ABI-encoded `string` answer
pub fn string_answer(s: &str) -> Vec<u8> {
    abi::encode(&[Token::String(s.to_string())])
}

fn error_string(reason: &str) -> Vec<u8> {
    abi::encode_call(
        selector("Error(string)"),
        &[Token::String(reason.to_string())],
    )
}

// ============================================================================
// Registry
// ============================================================================

/// Registry backed by hash maps
#[derive(Default)]
pub struct MemoryRegistry {
    authorities: RwLock<HashMap<Node, Address>>,
    kinds: RwLock<HashMap<Address, ResolverKind>>,
    lookups: AtomicUsize,
    failing: AtomicBool,
    hanging: AtomicBool,
}

impl MemoryRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `authority`
    pub fn set_authority(&self, name: &str, authority: Address, kind: ResolverKind) {
        self.authorities.write().insert(Node::namehash(name), authority);
        self.kinds.write().insert(authority, kind);
    }

    /// Make every lookup fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every lookup wait forever
    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    /// Number of lookups served
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn lookup(&self, node: &Node) -> Result<Option<Address>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Registry("registry unavailable".to_string()));
        }
        Ok(self.authorities.read().get(node).copied())
    }

    async fn capabilities(&self, authority: &Address) -> Result<ResolverKind> {
        Ok(self
            .kinds
            .read()
            .get(authority)
            .copied()
            .unwrap_or(ResolverKind::ExactMatch))
    }
}

// ============================================================================
// Authorities
// ============================================================================

#[derive(Debug, Clone)]
enum Authority {
    /// Answers exact calldata from local records
    OnChain { records: HashMap<Vec<u8>, Vec<u8>> },
    /// Answers `resolve(bytes,bytes)` from local records
    Extended { records: HashMap<Vec<u8>, Vec<u8>> },
    /// Defers every query to `endpoints`, request = profile calldata
    Offchain { endpoints: Vec<String>, extended: bool },
    /// Defers `hops` times before answering
    Redirect {
        endpoints: Vec<String>,
        hops: u64,
        answer: Vec<u8>,
    },
    /// Raises a signal naming someone else as origin
    Spoofing { claimed: Address, endpoints: Vec<String> },
    /// Reverts everything
    Reverting { reason: String },
}

/// Simulated authorities behind a profile transport
#[derive(Default)]
pub struct MockChain {
    authorities: RwLock<HashMap<Address, Authority>>,
    calls: AtomicUsize,
}

impl MockChain {
    /// No authorities
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact-match record answered on-chain
    pub fn add_onchain_record(&self, authority: Address, name: &str, query: &RecordQuery, answer: Vec<u8>) {
        let mut authorities = self.authorities.write();
        let entry = authorities.entry(authority).or_insert_with(|| Authority::OnChain {
            records: HashMap::new(),
        });
        if let Authority::OnChain { records } = entry {
            records.insert(calldata(name, query), answer);
        }
    }

    /// Record answered on-chain through `resolve(bytes,bytes)`
    pub fn add_extended_record(&self, authority: Address, name: &str, query: &RecordQuery, answer: Vec<u8>) {
        let mut authorities = self.authorities.write();
        let entry = authorities.entry(authority).or_insert_with(|| Authority::Extended {
            records: HashMap::new(),
        });
        if let Authority::Extended { records } = entry {
            records.insert(calldata(name, query), answer);
        }
    }

    /// Authority deferring every query to `endpoints`
    pub fn add_offchain_authority(&self, authority: Address, endpoints: &[&str], extended: bool) {
        self.authorities.write().insert(
            authority,
            Authority::Offchain {
                endpoints: endpoints.iter().map(|s| s.to_string()).collect(),
                extended,
            },
        );
    }

    /// Authority raising `hops` signals in a row before returning `answer`
    pub fn add_redirect_chain(&self, authority: Address, endpoints: &[&str], hops: u64, answer: Vec<u8>) {
        self.authorities.write().insert(
            authority,
            Authority::Redirect {
                endpoints: endpoints.iter().map(|s| s.to_string()).collect(),
                hops,
                answer,
            },
        );
    }

    /// Authority whose signals claim another origin
    pub fn add_spoofing_authority(&self, authority: Address, claimed: Address, endpoints: &[&str]) {
        self.authorities.write().insert(
            authority,
            Authority::Spoofing {
                claimed,
                endpoints: endpoints.iter().map(|s| s.to_string()).collect(),
            },
        );
    }

    /// Authority reverting every call with `Error(reason)`
    pub fn add_reverting_authority(&self, authority: Address, reason: &str) {
        self.authorities.write().insert(
            authority,
            Authority::Reverting {
                reason: reason.to_string(),
            },
        );
    }

    /// Number of calls received
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn split_pair(args: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
    let mut tokens = abi::decode(&[ParamType::Bytes, ParamType::Bytes], args)
        .ok()?
        .into_iter();
    let first = tokens.next()?.take_bytes().ok()?;
    let second = tokens.next()?.take_bytes().ok()?;
    Some((first, second))
}

fn defer(origin: Address, endpoints: &[String], request: Vec<u8>, carry: Vec<u8>) -> CallOutcome {
    CallOutcome::Revert(
        DeferredAnswer {
            origin,
            endpoints: endpoints.to_vec(),
            request,
            callback: selector(CALLBACK_SIGNATURE),
            carry,
        }
        .encode(),
    )
}

fn hop_carry(n: u64) -> Vec<u8> {
    abi::encode(&[abi::uint(n)])
}

impl Authority {
    fn handle(&self, me: Address, data: &[u8]) -> CallOutcome {
        let (sel, args) = abi::split_selector(data).unwrap_or(([0; 4], &[][..]));
        let is_callback = sel == selector(CALLBACK_SIGNATURE);
        let is_resolve = sel == selector(RESOLVE_SIGNATURE);

        match self {
            Authority::OnChain { records } => match records.get(data) {
                Some(answer) => CallOutcome::Return(answer.clone()),
                None => CallOutcome::Revert(Vec::new()),
            },
            Authority::Extended { records } => {
                let Some((_dns, inner)) = split_pair(args).filter(|_| is_resolve) else {
                    return CallOutcome::Revert(error_string("expected resolve(bytes,bytes)"));
                };
                match records.get(&inner) {
                    Some(answer) => CallOutcome::Return(bytes_answer(answer)),
                    None => CallOutcome::Revert(error_string("unsupported profile")),
                }
            }
            Authority::Offchain { endpoints, extended } => {
                if is_callback {
                    let Some((response, _carry)) = split_pair(args) else {
                        return CallOutcome::Revert(error_string("bad callback"));
                    };
                    return if *extended {
                        CallOutcome::Return(bytes_answer(&response))
                    } else {
                        CallOutcome::Return(response)
                    };
                }
                let inner = if *extended {
                    match split_pair(args).filter(|_| is_resolve) {
                        Some((_dns, inner)) => inner,
                        None => return CallOutcome::Revert(error_string("expected resolve(bytes,bytes)")),
                    }
                } else {
                    data.to_vec()
                };
                defer(me, endpoints, inner.clone(), inner)
            }
            Authority::Redirect {
                endpoints,
                hops,
                answer,
            } => {
                if !is_callback {
                    return defer(me, endpoints, b"hop".to_vec(), hop_carry(1));
                }
                let n = split_pair(args)
                    .and_then(|(_, carry)| abi::decode_single(abi::uint_type(), &carry).ok())
                    .and_then(|t| t.take_uint().ok())
                    .unwrap_or(0);
                if n < *hops {
                    defer(me, endpoints, b"hop".to_vec(), hop_carry(n + 1))
                } else {
                    CallOutcome::Return(answer.clone())
                }
            }
            Authority::Spoofing { claimed, endpoints } => {
                defer(*claimed, endpoints, data.to_vec(), Vec::new())
            }
            Authority::Reverting { reason } => CallOutcome::Revert(error_string(reason)),
        }
    }
}

#[async_trait]
impl ProfileTransport for MockChain {
    async fn call(&self, to: &Address, data: &[u8]) -> Result<CallOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let authority = self.authorities.read().get(to).cloned();
        match authority {
            Some(authority) => Ok(authority.handle(*to, data)),
            None => Err(Error::ProfileCallFailed(format!("no contract at {}", to))),
        }
    }
}

// ============================================================================
// Gateways
// ============================================================================

/// How an endpoint behaves when fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointBehavior {
    /// Answer from the configured records, 404 when unknown
    Serve,
    /// Return the request unchanged
    Echo,
    /// Fail with an HTTP status
    Status(u16, String),
    /// Fail to connect
    NetworkError,
    /// Never answer
    Hang,
    /// Answer with an unparseable body
    Malformed,
}

/// Gateway and batch gateway simulator
#[derive(Default)]
pub struct MockGateway {
    answers: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
    behaviors: RwLock<HashMap<String, EndpointBehavior>>,
    batch_endpoints: RwLock<HashSet<String>>,
    fetched: Mutex<Vec<String>>,
    batch_sizes: Mutex<Vec<usize>>,
}

impl MockGateway {
    /// Gateway serving nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `request` with `response`
    pub fn set_raw_answer(&self, request: &[u8], response: &[u8]) {
        self.answers.write().insert(request.to_vec(), response.to_vec());
    }

    /// Answer the profile calldata of `query` on `name`
    pub fn set_record(&self, name: &str, query: &RecordQuery, answer: Vec<u8>) {
        self.answers.write().insert(calldata(name, query), answer);
    }

    /// Override the behavior of one endpoint
    pub fn set_behavior(&self, url: &str, behavior: EndpointBehavior) {
        self.behaviors.write().insert(url.to_string(), behavior);
    }

    /// Treat `url` as a batch gateway
    pub fn add_batch_endpoint(&self, url: &str) {
        self.batch_endpoints.write().insert(url.to_string());
    }

    /// Every url fetched by the client, in order
    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }

    /// Number of batch requests served
    pub fn batch_calls(&self) -> usize {
        self.batch_sizes.lock().len()
    }

    /// Sub-request count of every batch served
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().clone()
    }

    fn behavior(&self, url: &str) -> EndpointBehavior {
        self.behaviors
            .read()
            .get(url)
            .cloned()
            .unwrap_or(EndpointBehavior::Serve)
    }

    fn serve_now(&self, url: &str, behavior: &EndpointBehavior, data: &[u8]) -> Option<Result<Vec<u8>>> {
        let result = match behavior {
            EndpointBehavior::Serve => self.answers.read().get(data).cloned().ok_or_else(|| {
                Error::GatewayStatus {
                    code: 404,
                    message: "unsupported".to_string(),
                }
            }),
            EndpointBehavior::Echo => Ok(data.to_vec()),
            EndpointBehavior::Status(code, message) => Err(Error::GatewayStatus {
                code: *code,
                message: message.clone(),
            }),
            EndpointBehavior::NetworkError => {
                Err(Error::FetchNetwork(format!("connection refused: {}", url)))
            }
            EndpointBehavior::Malformed => {
                Err(Error::MalformedFetchResponse(format!("invalid json from {}", url)))
            }
            EndpointBehavior::Hang => return None,
        };
        Some(result)
    }

    /// What the batch gateway itself does for one sub-request
    fn serve_sub(&self, urls: &[String], data: &[u8]) -> SubResponse {
        let batch_endpoints = self.batch_endpoints.read().clone();
        let mut last = ur_core::GatewayError::new(404, "no usable endpoint");
        for url in urls.iter().filter(|u| !batch_endpoints.contains(*u)) {
            let behavior = self.behavior(url);
            let result = self
                .serve_now(url, &behavior, data)
                .unwrap_or_else(|| Err(Error::FetchTimeout(url.clone())));
            match result {
                Ok(response) => return Ok(response),
                Err(e) => {
                    let retry = e.is_retryable();
                    last = e
                        .gateway_errors()
                        .into_iter()
                        .next()
                        .unwrap_or_else(|| ur_core::GatewayError::new(500, e.to_string()));
                    if !retry {
                        break;
                    }
                }
            }
        }
        Err(last)
    }
}

#[async_trait]
impl GatewayFetcher for MockGateway {
    async fn fetch(&self, url: &str, _sender: &Address, data: &[u8]) -> Result<Vec<u8>> {
        self.fetched.lock().push(url.to_string());
        let behavior = self.behavior(url);
        let is_batch = self.batch_endpoints.read().contains(url);

        if is_batch && behavior == EndpointBehavior::Serve {
            let query = BatchQuery::decode(data)?;
            self.batch_sizes.lock().push(query.len());
            let responses = query
                .requests
                .iter()
                .map(|(_sender, urls, data)| self.serve_sub(urls, data))
                .collect();
            return Ok(BatchReply { responses }.encode());
        }

        match self.serve_now(url, &behavior, data) {
            Some(result) => result,
            None => {
                std::future::pending::<()>().await;
                Err(Error::FetchTimeout(url.to_string()))
            }
        }
    }
}
