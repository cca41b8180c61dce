//! Universal name resolution
//!
//! Walks a name up to its authority, issues the profile calls, follows
//! off-chain deferrals (CCIP-Read) through gateways, collapses them through
//! batch gateways and verifies primary names by forward resolution.
//!
//! The registry, the profile transport and the gateway client are injected
//! through the traits in [`backend`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod batch;
pub mod calldata;
pub mod cancel;
pub mod config;
pub mod engine;
pub mod offchain;
pub mod profile;
pub mod reverse;
pub mod surface;
pub mod walker;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use backend::{CallOutcome, GatewayFetcher, ProfileTransport, Registry, ResolverKind};
pub use batch::{BatchGroup, BatchMultiplexer};
pub use calldata::CallAnswer;
pub use cancel::CancelToken;
pub use config::ResolverConfig;
pub use engine::{Resolution, UniversalResolver};
pub use offchain::{OffchainProtocol, Step};
pub use profile::{Profile, ProfileRequest};
pub use reverse::{PrimaryName, PrimaryNameStatus, ReverseResolver};
pub use surface::{RecordResponse, ResolveResponse, ReverseResponse};
pub use walker::{walk, AuthorityBinding};

pub use ur_core::{Error, Result};
