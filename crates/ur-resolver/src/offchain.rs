//! Offchain fetch protocol (CCIP-Read)
//!
//! An authority defers by reverting with an `OffchainLookup` signal. The
//! protocol fetches the request from the signal's endpoints, resumes the
//! origin with the response and repeats while the origin keeps deferring,
//! up to a fixed number of signals.

use crate::backend::{CallOutcome, GatewayFetcher, ProfileTransport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use ur_core::{Address, DeferredAnswer, Error, Result};

/// Outcome of one call into an authority
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Final answer
    Answer(Vec<u8>),
    /// Deferred to a gateway
    Deferred(DeferredAnswer),
}

/// Client side of the deferral protocol
#[derive(Clone)]
pub struct OffchainProtocol {
    transport: Arc<dyn ProfileTransport>,
    fetcher: Arc<dyn GatewayFetcher>,
    max_depth: usize,
    endpoint_timeout: Duration,
}

impl OffchainProtocol {
    /// Create a protocol driver
    pub fn new(
        transport: Arc<dyn ProfileTransport>,
        fetcher: Arc<dyn GatewayFetcher>,
        max_depth: usize,
        endpoint_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            fetcher,
            max_depth,
            endpoint_timeout,
        }
    }

    /// Longest chain of signals followed
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Call an authority and classify the outcome.
    pub async fn call(&self, to: &Address, data: &[u8]) -> Result<Step> {
        self.invoke(to, data, false).await
    }

    async fn invoke(&self, to: &Address, data: &[u8], resumed: bool) -> Result<Step> {
        let revert = match self.transport.call(to, data).await? {
            CallOutcome::Return(answer) => return Ok(Step::Answer(answer)),
            CallOutcome::Revert(revert) => revert,
        };

        match DeferredAnswer::decode(&revert)? {
            Some(signal) if signal.origin != *to => Err(Error::ProfileCallFailed(format!(
                "OffchainLookup sender {} does not match {}",
                signal.origin, to
            ))),
            Some(signal) => {
                debug!(
                    "{} deferred to {} endpoint(s), callback 0x{}",
                    to,
                    signal.endpoints.len(),
                    hex::encode(signal.callback)
                );
                Ok(Step::Deferred(signal))
            }
            None if resumed => Err(Error::ResumptionReverted(revert)),
            None => Err(Error::ProfileReverted(revert)),
        }
    }

    /// Fetch a signal's request from the first endpoint that answers.
    ///
    /// Retryable failures move on to the next endpoint; anything else stops.
    pub async fn fetch_first(&self, signal: &DeferredAnswer) -> Result<Vec<u8>> {
        self.fetch_skipping(signal, &[]).await
    }

    /// Like [`Self::fetch_first`], leaving out batch gateways, which only
    /// answer batched queries.
    async fn fetch_skipping(&self, signal: &DeferredAnswer, batch_gateways: &[String]) -> Result<Vec<u8>> {
        let mut last_error = None;
        for url in signal.endpoints.iter().filter(|url| !batch_gateways.contains(*url)) {
            let attempt = tokio::time::timeout(
                self.endpoint_timeout,
                self.fetcher.fetch(url, &signal.origin, &signal.request),
            )
            .await
            .unwrap_or_else(|_| Err(Error::FetchTimeout(url.clone())));

            match attempt {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() => {
                    warn!("Gateway {} failed ({}), trying next endpoint: {}", url, e.category(), e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error
            .unwrap_or_else(|| Error::FetchNetwork("OffchainLookup has no endpoints".to_string())))
    }

    /// Follow a signal until the origin answers.
    pub async fn resolve(&self, signal: DeferredAnswer) -> Result<Vec<u8>> {
        self.follow(signal, None, &[]).await
    }

    /// Follow a signal whose first response was already fetched (by a batch).
    pub async fn resume(&self, signal: DeferredAnswer, response: Vec<u8>) -> Result<Vec<u8>> {
        self.follow(signal, Some(response), &[]).await
    }

    /// Follow a signal, fetching every hop individually from its endpoints
    /// other than `batch_gateways`. `prefetched` answers the first hop.
    pub async fn follow(
        &self,
        mut signal: DeferredAnswer,
        mut prefetched: Option<Vec<u8>>,
        batch_gateways: &[String],
    ) -> Result<Vec<u8>> {
        let mut depth = 1;
        loop {
            if depth > self.max_depth {
                warn!("Deferral chain from {} exceeded {} signals", signal.origin, self.max_depth);
                return Err(Error::RedirectDepthExceeded(self.max_depth));
            }
            let response = match prefetched.take() {
                Some(response) => response,
                None => self.fetch_skipping(&signal, batch_gateways).await?,
            };
            let calldata = signal.callback_data(&response);
            match self.invoke(&signal.origin, &calldata, true).await? {
                Step::Answer(answer) => return Ok(answer),
                Step::Deferred(next) => {
                    signal = next;
                    depth += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EndpointBehavior, MockChain, MockGateway};

    fn protocol(chain: &Arc<MockChain>, gateway: &Arc<MockGateway>, max_depth: usize) -> OffchainProtocol {
        OffchainProtocol::new(
            chain.clone(),
            gateway.clone(),
            max_depth,
            Duration::from_secs(1),
        )
    }

    fn signal(endpoints: &[&str]) -> DeferredAnswer {
        DeferredAnswer {
            origin: Address([7; 20]),
            endpoints: endpoints.iter().map(|s| s.to_string()).collect(),
            request: b"ping".to_vec(),
            callback: [0; 4],
            carry: vec![],
        }
    }

    #[tokio::test]
    async fn test_fallback_to_next_endpoint() {
        let chain = Arc::new(MockChain::new());
        let gateway = Arc::new(MockGateway::new());
        gateway.set_behavior("https://a", EndpointBehavior::NetworkError);
        gateway.set_behavior("https://b", EndpointBehavior::Status(503, "busy".to_string()));
        gateway.set_raw_answer(b"ping", b"pong");

        let p = protocol(&chain, &gateway, 8);
        let response = p
            .fetch_first(&signal(&["https://a", "https://b", "https://c"]))
            .await
            .unwrap();
        assert_eq!(response, b"pong");
        assert_eq!(gateway.fetched_urls(), vec!["https://a", "https://b", "https://c"]);
    }

    #[tokio::test]
    async fn test_client_error_stops_fallback() {
        let chain = Arc::new(MockChain::new());
        let gateway = Arc::new(MockGateway::new());
        gateway.set_behavior("https://a", EndpointBehavior::Status(404, "unknown".to_string()));
        gateway.set_raw_answer(b"ping", b"pong");

        let p = protocol(&chain, &gateway, 8);
        let err = p
            .fetch_first(&signal(&["https://a", "https://b"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::GatewayStatus { code: 404, .. }));
        assert_eq!(gateway.fetched_urls(), vec!["https://a"]);
    }

    #[tokio::test]
    async fn test_all_endpoints_fail_with_last_error() {
        let chain = Arc::new(MockChain::new());
        let gateway = Arc::new(MockGateway::new());
        gateway.set_behavior("https://a", EndpointBehavior::Status(500, "first".to_string()));
        gateway.set_behavior("https://b", EndpointBehavior::Status(502, "second".to_string()));

        let p = protocol(&chain, &gateway, 8);
        let err = p
            .fetch_first(&signal(&["https://a", "https://b"]))
            .await
            .unwrap_err();
        match err {
            Error::GatewayStatus { code, message } => {
                assert_eq!(code, 502);
                assert_eq!(message, "second");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_endpoints() {
        let chain = Arc::new(MockChain::new());
        let gateway = Arc::new(MockGateway::new());
        let p = protocol(&chain, &gateway, 8);
        let err = p.fetch_first(&signal(&[])).await.unwrap_err();
        assert!(matches!(err, Error::FetchNetwork(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_endpoint_timeout_advances() {
        let chain = Arc::new(MockChain::new());
        let gateway = Arc::new(MockGateway::new());
        gateway.set_behavior("https://slow", EndpointBehavior::Hang);
        gateway.set_raw_answer(b"ping", b"pong");

        let p = protocol(&chain, &gateway, 8);
        let response = p
            .fetch_first(&signal(&["https://slow", "https://fast"]))
            .await
            .unwrap();
        assert_eq!(response, b"pong");
    }

    #[tokio::test]
    async fn test_malformed_response_is_terminal() {
        let chain = Arc::new(MockChain::new());
        let gateway = Arc::new(MockGateway::new());
        gateway.set_behavior("https://a", EndpointBehavior::Malformed);
        gateway.set_raw_answer(b"ping", b"pong");

        let p = protocol(&chain, &gateway, 8);
        let err = p
            .fetch_first(&signal(&["https://a", "https://b"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedFetchResponse(_)));
    }

    #[tokio::test]
    async fn test_redirect_chain_within_bound() {
        let chain = Arc::new(MockChain::new());
        let gateway = Arc::new(MockGateway::new());
        let origin = Address([0x44; 20]);
        chain.add_redirect_chain(origin, &["https://hop"], 8, b"done".to_vec());
        gateway.set_behavior("https://hop", EndpointBehavior::Echo);

        let p = protocol(&chain, &gateway, 8);
        let first = match p.call(&origin, b"start").await.unwrap() {
            Step::Deferred(signal) => signal,
            other => panic!("expected deferral, got {:?}", other),
        };
        assert_eq!(p.resolve(first).await.unwrap(), b"done");
    }

    #[tokio::test]
    async fn test_redirect_chain_over_bound() {
        let chain = Arc::new(MockChain::new());
        let gateway = Arc::new(MockGateway::new());
        let origin = Address([0x44; 20]);
        chain.add_redirect_chain(origin, &["https://hop"], 9, b"done".to_vec());
        gateway.set_behavior("https://hop", EndpointBehavior::Echo);

        let p = protocol(&chain, &gateway, 8);
        let Step::Deferred(first) = p.call(&origin, b"start").await.unwrap() else {
            panic!("expected deferral");
        };
        let err = p.resolve(first).await.unwrap_err();
        assert!(matches!(err, Error::RedirectDepthExceeded(8)));
        // the ninth signal is never fetched
        assert_eq!(gateway.fetched_urls().len(), 8);
    }

    #[tokio::test]
    async fn test_sender_mismatch_rejected() {
        let chain = Arc::new(MockChain::new());
        let gateway = Arc::new(MockGateway::new());
        let origin = Address([0x55; 20]);
        chain.add_spoofing_authority(origin, Address([0x66; 20]), &["https://x"]);

        let p = protocol(&chain, &gateway, 8);
        let err = p.call(&origin, b"anything").await.unwrap_err();
        assert!(matches!(err, Error::ProfileCallFailed(_)));
    }

    #[tokio::test]
    async fn test_direct_revert_vs_resumption_revert() {
        let chain = Arc::new(MockChain::new());
        let gateway = Arc::new(MockGateway::new());
        let origin = Address([0x77; 20]);
        chain.add_reverting_authority(origin, "nope");

        let p = protocol(&chain, &gateway, 8);
        let err = p.call(&origin, b"x").await.unwrap_err();
        assert!(matches!(err, Error::ProfileReverted(_)));

        let err = p
            .resume(
                DeferredAnswer {
                    origin,
                    endpoints: vec![],
                    request: vec![],
                    callback: [1, 2, 3, 4],
                    carry: vec![],
                },
                b"response".to_vec(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ResumptionReverted(_)));
    }

    #[tokio::test]
    async fn test_follow_skips_batch_gateways() {
        let chain = Arc::new(MockChain::new());
        let gateway = Arc::new(MockGateway::new());
        let origin = Address([0x45; 20]);
        chain.add_redirect_chain(origin, &["https://batch", "https://hop"], 3, b"done".to_vec());
        gateway.set_behavior("https://batch", EndpointBehavior::Status(400, "batch only".to_string()));
        gateway.set_behavior("https://hop", EndpointBehavior::Echo);

        let p = protocol(&chain, &gateway, 8);
        let Step::Deferred(first) = p.call(&origin, b"start").await.unwrap() else {
            panic!("expected deferral");
        };
        let answer = p
            .follow(first, Some(b"hop".to_vec()), &["https://batch".to_string()])
            .await
            .unwrap();
        assert_eq!(answer, b"done");
        assert_eq!(gateway.fetched_urls(), vec!["https://hop", "https://hop"]);
    }
}
