//! Reverse resolution with forward verification
//!
//! The reverse leg asks `<addr>.<slug>.reverse` for a name. A name only
//! becomes the primary name once the forward leg resolves that name's
//! address for the same coin type back to the input address.

use crate::cancel::CancelToken;
use crate::engine::{Resolution, UniversalResolver};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};
use ur_core::{parse_hex_bytes, EncodedName, Error, RecordQuery, RecordValue, Result};
use ur_params::{is_evm_coin_type, reverse_suffix, COIN_TYPE_DEFAULT};

/// Why a primary name was or was not verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryNameStatus {
    /// Forward address matches
    Verified,
    /// No reverse record
    NoPrimaryName,
    /// Reverse record is not a normalized name
    InvalidName,
    /// Forward address missing or failed
    ForwardUnresolved,
    /// Forward address points elsewhere
    VerificationMismatch,
}

/// Outcome of a reverse lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryName {
    /// Address bytes that were looked up
    pub address: Vec<u8>,
    /// Coin type that was looked up
    pub coin_type: u64,
    /// Reverse leg, against the reverse record that produced the candidate
    pub reverse_leg: Resolution,
    /// Forward leg, [`Resolution::empty`] when no normalized name was claimed
    pub forward_leg: Resolution,
    /// Verified primary name
    pub verified_name: Option<String>,
    /// Verification verdict
    pub status: PrimaryNameStatus,
}

impl PrimaryName {
    /// Candidate name claimed by the reverse record
    pub fn claimed_name(&self) -> Option<String> {
        claimed_name(&self.reverse_leg)
    }
}

fn claimed_name(leg: &Resolution) -> Option<String> {
    match leg.records.first()?.value(&RecordQuery::Name)? {
        RecordValue::Name(name) if !name.is_empty() => Some(name),
        _ => None,
    }
}

/// Build `<lowercase hex>.<slug>.reverse`
pub fn reverse_name(address: &[u8], coin_type: u64) -> String {
    format!("{}.{}", hex::encode(address), reverse_suffix(coin_type))
}

/// Reverse resolver on top of a [`UniversalResolver`]
#[derive(Clone)]
pub struct ReverseResolver {
    resolver: UniversalResolver,
}

impl ReverseResolver {
    /// Wrap a resolver
    pub fn new(resolver: UniversalResolver) -> Self {
        Self { resolver }
    }

    /// Underlying resolver
    pub fn resolver(&self) -> &UniversalResolver {
        &self.resolver
    }

    /// Find and verify the primary name of `address` for `coin_type`.
    pub async fn reverse(
        &self,
        address: &str,
        coin_type: u64,
        batch_endpoints: &[String],
    ) -> Result<PrimaryName> {
        self.reverse_with_cancel(address, coin_type, batch_endpoints, &CancelToken::new())
            .await
    }

    /// Reverse lookup with a caller-owned cancellation token.
    ///
    /// Every leg shares one request deadline.
    pub async fn reverse_with_cancel(
        &self,
        address: &str,
        coin_type: u64,
        batch_endpoints: &[String],
        cancel: &CancelToken,
    ) -> Result<PrimaryName> {
        let address = parse_hex_bytes(address)?;
        if address.is_empty() {
            return Err(Error::InvalidAddress("empty address".to_string()));
        }
        if is_evm_coin_type(coin_type) && address.len() != 20 {
            return Err(Error::InvalidAddress(format!(
                "EVM address must be 20 bytes, got {}",
                address.len()
            )));
        }

        let deadline = Instant::now() + self.resolver.config().request_timeout();
        let expired = || cancel.is_cancelled() || Instant::now() >= deadline;

        let name_query = [RecordQuery::Name];
        let mut reverse_leg = self
            .resolver
            .resolve_until(
                &reverse_name(&address, coin_type),
                &name_query,
                batch_endpoints,
                cancel,
                deadline,
            )
            .await?;

        // chain-specific EVM records fall back to the default reverse record
        if claimed_name(&reverse_leg).is_none()
            && is_evm_coin_type(coin_type)
            && coin_type != COIN_TYPE_DEFAULT
            && !expired()
        {
            let fallback = self
                .resolver
                .resolve_until(
                    &reverse_name(&address, COIN_TYPE_DEFAULT),
                    &name_query,
                    batch_endpoints,
                    cancel,
                    deadline,
                )
                .await?;
            if claimed_name(&fallback).is_some() {
                debug!("Using default reverse record for 0x{}", hex::encode(&address));
                reverse_leg = fallback;
            }
        }

        let mut result = PrimaryName {
            address,
            coin_type,
            reverse_leg,
            forward_leg: Resolution::empty(),
            verified_name: None,
            status: PrimaryNameStatus::NoPrimaryName,
        };

        let Some(candidate) = result.claimed_name() else {
            debug!("No primary name for 0x{}", hex::encode(&result.address));
            return Ok(result);
        };

        match EncodedName::parse(&candidate) {
            Ok(parsed) if parsed.name() == candidate => {}
            _ => {
                info!("Reverse record {:?} is not a normalized name", candidate);
                result.status = PrimaryNameStatus::InvalidName;
                return Ok(result);
            }
        }

        let forward_leg = self
            .resolver
            .resolve_until(
                &candidate,
                &[RecordQuery::addr(coin_type)],
                batch_endpoints,
                cancel,
                deadline,
            )
            .await?;

        let forward_address = forward_leg
            .records
            .first()
            .and_then(|r| r.value(&RecordQuery::addr(coin_type)));
        let status = match forward_address {
            Some(RecordValue::Address(bytes)) if bytes == result.address => PrimaryNameStatus::Verified,
            Some(RecordValue::Address(bytes)) if !bytes.is_empty() => {
                PrimaryNameStatus::VerificationMismatch
            }
            _ => PrimaryNameStatus::ForwardUnresolved,
        };
        if status == PrimaryNameStatus::Verified {
            result.verified_name = Some(candidate.clone());
        }
        result.status = status;
        info!("Primary name {} for 0x{}: {:?}", candidate, hex::encode(&result.address), result.status);
        result.forward_leg = forward_leg;
        Ok(result)
    }
}
