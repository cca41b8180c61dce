//! Batch gateway multiplexer
//!
//! Deferred entries that list a batch gateway among their endpoints are
//! grouped by that gateway and fetched in one `query(...)` round trip.
//! Results come back slot by slot, in request order.

use crate::backend::GatewayFetcher;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use ur_core::{Address, BatchQuery, BatchReply, DeferredAnswer, Error, Result, SubResponse};

/// Entries sharing one batch endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchGroup {
    /// Batch gateway url
    pub endpoint: String,
    /// Indices into the planned entry list, in entry order
    pub members: Vec<usize>,
}

/// Plan which deferred entries travel through which batch gateway.
///
/// Each entry joins the first of `batch_endpoints` that also appears among
/// its own endpoints. Returns the groups (ordered by first member) and the
/// indices of entries that share no batch endpoint.
pub fn plan(entries: &[&DeferredAnswer], batch_endpoints: &[String]) -> (Vec<BatchGroup>, Vec<usize>) {
    let mut groups: Vec<BatchGroup> = Vec::new();
    let mut singles = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let chosen = batch_endpoints
            .iter()
            .find(|batch| entry.endpoints.iter().any(|url| url == *batch));
        match chosen {
            Some(endpoint) => match groups.iter_mut().find(|g| &g.endpoint == endpoint) {
                Some(group) => group.members.push(index),
                None => groups.push(BatchGroup {
                    endpoint: endpoint.clone(),
                    members: vec![index],
                }),
            },
            None => singles.push(index),
        }
    }

    (groups, singles)
}

/// Client for batch gateways
#[derive(Clone)]
pub struct BatchMultiplexer {
    fetcher: Arc<dyn GatewayFetcher>,
    sender: Address,
    timeout: Duration,
}

impl BatchMultiplexer {
    /// Create a multiplexer reporting `sender` to batch gateways
    pub fn new(fetcher: Arc<dyn GatewayFetcher>, sender: Address, timeout: Duration) -> Self {
        Self {
            fetcher,
            sender,
            timeout,
        }
    }

    /// Fetch every sub-request of `query` through `url` in one round trip.
    ///
    /// `Err` means the whole batch failed; otherwise there is exactly one
    /// slot per sub-request.
    pub async fn batch_fetch(&self, url: &str, query: &BatchQuery) -> Result<Vec<SubResponse>> {
        info!("Batching {} request(s) through {}", query.len(), url);
        let calldata = query.encode();
        let body = tokio::time::timeout(self.timeout, self.fetcher.fetch(url, &self.sender, &calldata))
            .await
            .unwrap_or_else(|_| Err(Error::FetchTimeout(url.to_string())))?;

        let reply = BatchReply::decode(&body, query.len()).map_err(|e| match e {
            Error::Abi(msg) => Error::MalformedFetchResponse(msg),
            other => other,
        })?;
        let failed = reply.responses.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            debug!("{} of {} batched request(s) failed", failed, query.len());
        }
        Ok(reply.responses)
    }
}
