//! Resolution engine
//!
//! One `resolve` call walks the name once, issues every profile call
//! concurrently, then settles the deferred ones: entries sharing a batch
//! gateway go out together, the rest follow the deferral protocol on their
//! own. Every query yields exactly one [`RecordResult`], in query order.

use crate::backend::{GatewayFetcher, ProfileTransport, Registry, ResolverKind};
use crate::batch::{self, BatchGroup, BatchMultiplexer};
use crate::cancel::CancelToken;
use crate::config::ResolverConfig;
use crate::offchain::{OffchainProtocol, Step};
use crate::walker::{walk, AuthorityBinding};
use futures::future::join_all;
use std::sync::Arc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use ur_core::abi::{self, ParamType, Token, TokenExt};
use ur_core::{
    selector, BatchQuery, DeferredAnswer, EncodedName, Error, RecordQuery, RecordResult, Result,
};

/// Extended entrypoint taking the DNS-encoded name and the profile calldata
const RESOLVE_SIGNATURE: &str = "resolve(bytes,bytes)";

/// Answer to one `resolve` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Normalized name
    pub name: EncodedName,
    /// Walk result
    pub binding: AuthorityBinding,
    /// One result per query, in query order
    pub records: Vec<RecordResult>,
}

impl Resolution {
    /// Lookup of the root name with no queries, nothing walked
    pub fn empty() -> Self {
        let name = EncodedName::root();
        Self {
            binding: AuthorityBinding::unwalked(&name),
            records: Vec::new(),
            name,
        }
    }

    /// Suffix of the name the authority was found on
    pub fn basename(&self) -> &str {
        self.name.suffix(self.binding.basename_offset)
    }
}

/// First-phase outcome of one query
enum Attempt {
    Done(RecordResult),
    Deferred(DeferredAnswer),
}

/// Universal resolver
#[derive(Clone)]
pub struct UniversalResolver {
    registry: Arc<dyn Registry>,
    offchain: OffchainProtocol,
    batch: BatchMultiplexer,
    config: ResolverConfig,
}

impl UniversalResolver {
    /// Create a resolver with default configuration
    pub fn new(
        registry: Arc<dyn Registry>,
        transport: Arc<dyn ProfileTransport>,
        fetcher: Arc<dyn GatewayFetcher>,
    ) -> Self {
        Self::with_config(registry, transport, fetcher, ResolverConfig::default())
    }

    /// Create a resolver with custom configuration
    pub fn with_config(
        registry: Arc<dyn Registry>,
        transport: Arc<dyn ProfileTransport>,
        fetcher: Arc<dyn GatewayFetcher>,
        config: ResolverConfig,
    ) -> Self {
        let offchain = OffchainProtocol::new(
            transport,
            fetcher.clone(),
            config.max_redirect_depth,
            config.endpoint_timeout(),
        );
        let batch = BatchMultiplexer::new(fetcher, config.batch_sender, config.endpoint_timeout());
        Self {
            registry,
            offchain,
            batch,
            config,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `queries` against `name`.
    ///
    /// An empty `batch_endpoints` falls back to the configured batch gateways.
    pub async fn resolve(
        &self,
        name: &str,
        queries: &[RecordQuery],
        batch_endpoints: &[String],
    ) -> Result<Resolution> {
        self.resolve_with_cancel(name, queries, batch_endpoints, &CancelToken::new())
            .await
    }

    /// Resolve with a caller-owned cancellation token.
    ///
    /// Timeout or cancellation fails every record; only invalid names and
    /// registry failures return `Err`.
    pub async fn resolve_with_cancel(
        &self,
        name: &str,
        queries: &[RecordQuery],
        batch_endpoints: &[String],
        cancel: &CancelToken,
    ) -> Result<Resolution> {
        let deadline = Instant::now() + self.config.request_timeout();
        self.resolve_until(name, queries, batch_endpoints, cancel, deadline)
            .await
    }

    /// Resolve with an absolute deadline shared with other work of the caller.
    pub async fn resolve_until(
        &self,
        name: &str,
        queries: &[RecordQuery],
        batch_endpoints: &[String],
        cancel: &CancelToken,
        deadline: Instant,
    ) -> Result<Resolution> {
        let name = EncodedName::parse(name)?;
        if queries.is_empty() {
            return Ok(Resolution {
                binding: AuthorityBinding::unwalked(&name),
                records: Vec::new(),
                name,
            });
        }

        let binding = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let binding = AuthorityBinding::unwalked(&name);
                return Ok(abort(name, binding, queries.len(), &Error::Cancelled));
            }
            _ = sleep_until(deadline) => {
                let binding = AuthorityBinding::unwalked(&name);
                return Ok(abort(name, binding, queries.len(), &Error::Timeout));
            }
            binding = walk(self.registry.as_ref(), &name) => binding.map_err(|e| {
                warn!("Walk of {} failed ({}): {}", name, e.category(), e);
                e
            })?,
        };

        if !binding.found {
            let err = Error::NoAuthorityFound(name.to_string());
            return Ok(abort(name, binding, queries.len(), &err));
        }

        let batch_endpoints = if batch_endpoints.is_empty() {
            self.config.batch_gateways.as_slice()
        } else {
            batch_endpoints
        };

        let records = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(abort(name, binding, queries.len(), &Error::Cancelled)),
            _ = sleep_until(deadline) => return Ok(abort(name, binding, queries.len(), &Error::Timeout)),
            records = self.resolve_records(&name, &binding, queries, batch_endpoints) => records,
        };

        Ok(Resolution {
            name,
            binding,
            records,
        })
    }

    async fn resolve_records(
        &self,
        name: &EncodedName,
        binding: &AuthorityBinding,
        queries: &[RecordQuery],
        batch_endpoints: &[String],
    ) -> Vec<RecordResult> {
        let attempts = join_all(queries.iter().map(|q| self.attempt(name, binding, q))).await;

        let mut slots: Vec<Option<RecordResult>> = Vec::with_capacity(queries.len());
        let mut deferred: Vec<(usize, DeferredAnswer)> = Vec::new();
        for (index, attempt) in attempts.into_iter().enumerate() {
            match attempt {
                Attempt::Done(result) => slots.push(Some(result)),
                Attempt::Deferred(signal) => {
                    slots.push(None);
                    deferred.push((index, signal));
                }
            }
        }

        if !deferred.is_empty() {
            let signals: Vec<&DeferredAnswer> = deferred.iter().map(|(_, s)| s).collect();
            let (groups, singles) = batch::plan(&signals, batch_endpoints);
            debug!(
                "{} deferred record(s) for {}: {} batch group(s), {} individual",
                deferred.len(),
                name,
                groups.len(),
                singles.len()
            );

            let group_futures = groups
                .iter()
                .map(|group| self.settle_group(binding.kind, group, &deferred, batch_endpoints));
            let single_futures = singles.iter().map(|&i| {
                let (slot, signal) = &deferred[i];
                async move {
                    let outcome = self.offchain.follow(signal.clone(), None, batch_endpoints).await;
                    (*slot, finish(binding.kind, outcome, true, false))
                }
            });
            let (grouped, single) =
                futures::future::join(join_all(group_futures), join_all(single_futures)).await;

            for (slot, result) in grouped.into_iter().flatten().chain(single) {
                slots[slot] = Some(result);
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    RecordResult::failed(&Error::Config("record left unresolved".to_string()), false, false)
                })
            })
            .collect()
    }

    async fn attempt(&self, name: &EncodedName, binding: &AuthorityBinding, query: &RecordQuery) -> Attempt {
        let calldata = match query.encode_call(&name.node()) {
            Ok(data) => data,
            Err(e) => return Attempt::Done(RecordResult::failed(&e, false, false)),
        };

        let data = match binding.kind {
            ResolverKind::Extended => abi::encode_call(
                selector(RESOLVE_SIGNATURE),
                &[
                    Token::Bytes(name.dns_encoded().to_vec()),
                    Token::Bytes(calldata),
                ],
            ),
            ResolverKind::ExactMatch if binding.is_wildcard() => {
                let err = Error::WildcardUnsupported(name.suffix(binding.basename_offset).to_string());
                return Attempt::Done(RecordResult::failed(&err, false, false));
            }
            ResolverKind::ExactMatch => calldata,
        };

        match self.offchain.call(&binding.authority, &data).await {
            Ok(Step::Answer(answer)) => Attempt::Done(finish(binding.kind, Ok(answer), false, false)),
            Ok(Step::Deferred(signal)) => Attempt::Deferred(signal),
            Err(e) => Attempt::Done(RecordResult::failed(&e, false, false)),
        }
    }

    async fn settle_group(
        &self,
        kind: ResolverKind,
        group: &BatchGroup,
        deferred: &[(usize, DeferredAnswer)],
        batch_endpoints: &[String],
    ) -> Vec<(usize, RecordResult)> {
        let mut query = BatchQuery::default();
        for &member in &group.members {
            query.push(&deferred[member].1);
        }

        let responses = match self.batch.batch_fetch(&group.endpoint, &query).await {
            Ok(responses) => responses,
            Err(e) => {
                info!(
                    "Batch through {} failed for {} record(s) ({}): {}",
                    group.endpoint,
                    group.members.len(),
                    e.category(),
                    e
                );
                return group
                    .members
                    .iter()
                    .map(|&member| (deferred[member].0, RecordResult::failed(&e, true, true)))
                    .collect();
            }
        };

        let resumed = group.members.iter().zip(responses).map(|(&member, response)| {
            let (slot, signal) = &deferred[member];
            async move {
                let outcome = match response {
                    Ok(body) => {
                        self.offchain
                            .follow(signal.clone(), Some(body), batch_endpoints)
                            .await
                    }
                    Err(gateway_error) => Err(Error::BatchPartialFailure(vec![gateway_error])),
                };
                (*slot, finish(kind, outcome, true, true))
            }
        });
        join_all(resumed).await
    }
}

/// Build the record result, unwrapping the `bytes` envelope of extended answers
fn finish(kind: ResolverKind, outcome: Result<Vec<u8>>, offchain: bool, batched: bool) -> RecordResult {
    let unwrapped = outcome.and_then(|answer| match kind {
        ResolverKind::Extended => abi::decode_single(ParamType::Bytes, &answer)?.take_bytes(),
        ResolverKind::ExactMatch => Ok(answer),
    });
    match unwrapped {
        Ok(answer) => RecordResult::ok(answer, offchain, batched),
        Err(e) => RecordResult::failed(&e, offchain, batched),
    }
}

/// Fail every record with a request-level error
fn abort(name: EncodedName, binding: AuthorityBinding, count: usize, err: &Error) -> Resolution {
    debug_assert!(err.is_request_fatal());
    info!("Resolution of {} aborted ({}): {}", name, err.category(), err);
    Resolution {
        name,
        binding,
        records: (0..count).map(|_| RecordResult::failed(err, false, false)).collect(),
    }
}
