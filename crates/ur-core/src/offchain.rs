//! Deferred-answer and batch gateway wire formats
//!
//! An authority that cannot answer from local state reverts with
//! `OffchainLookup(address,string[],bytes,bytes4,bytes)`. The caller fetches
//! `request` from one of `endpoints` and resumes `origin` with
//! `callback(response, carry)`.
//!
//! A batch gateway answers `query((address,string[],bytes)[])` with
//! `(bool[] failures, bytes[] responses)`; a failed slot carries an encoded
//! error instead of a response.

use crate::abi::{self, ParamType, Token, TokenExt};
use crate::{selector, Address, Error, Result};
use serde::{Deserialize, Serialize};

/// Canonical signature of the deferral revert
pub const OFFCHAIN_LOOKUP_SIGNATURE: &str = "OffchainLookup(address,string[],bytes,bytes4,bytes)";

/// Signature of the batch gateway entrypoint
pub const BATCH_QUERY_SIGNATURE: &str = "query((address,string[],bytes)[])";

/// Signature of a single gateway failure
pub const HTTP_ERROR_SIGNATURE: &str = "HttpError(uint16,string)";

/// Signature of the aggregated batch failure reported in record data
pub const BATCHED_HTTP_ERROR_SIGNATURE: &str = "HttpError((uint16,string)[])";

/// Signature of a plain revert reason
pub const ERROR_STRING_SIGNATURE: &str = "Error(string)";

/// `(code, message)` reported for one failed gateway sub-request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayError {
    /// HTTP-like status code
    pub code: u16,
    /// Human readable message
    pub message: String,
}

impl GatewayError {
    /// Create a gateway error
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Encode as `HttpError(uint16,string)`
    pub fn encode(&self) -> Vec<u8> {
        abi::encode_call(
            selector(HTTP_ERROR_SIGNATURE),
            &[
                abi::uint(u64::from(self.code)),
                Token::String(self.message.clone()),
            ],
        )
    }

    /// Interpret the payload of a failed batch slot.
    ///
    /// `HttpError(uint16,string)` keeps its code, `Error(string)` becomes a
    /// 500 with the reason, anything else a 500 carrying the raw hex.
    pub fn decode(data: &[u8]) -> Self {
        if let Some((sel, args)) = abi::split_selector(data) {
            if sel == selector(HTTP_ERROR_SIGNATURE) {
                if let Ok(mut tokens) = abi::decode(&[abi::uint_type(), ParamType::String], args) {
                    let message = tokens.pop().and_then(|t| t.take_string().ok());
                    let code = tokens.pop().and_then(|t| t.take_uint().ok());
                    if let (Some(code), Some(message)) = (code, message) {
                        let code = u16::try_from(code).unwrap_or(500);
                        return Self::new(code, message);
                    }
                }
            } else if sel == selector(ERROR_STRING_SIGNATURE) {
                if let Ok(reason) =
                    abi::decode_single(ParamType::String, args).and_then(TokenExt::take_string)
                {
                    return Self::new(500, reason);
                }
            }
        }
        Self::new(500, format!("0x{}", hex::encode(data)))
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.code, self.message)
    }
}

/// Outcome of one batch sub-request
pub type SubResponse = std::result::Result<Vec<u8>, GatewayError>;

/// Decoded `OffchainLookup` signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredAnswer {
    /// Contract that raised the signal and must be resumed
    pub origin: Address,
    /// Candidate endpoints, tried in order
    pub endpoints: Vec<String>,
    /// Payload to fetch
    pub request: Vec<u8>,
    /// Resumption entrypoint on `origin`
    pub callback: [u8; 4],
    /// Opaque state passed back unmodified
    pub carry: Vec<u8>,
}

impl DeferredAnswer {
    fn param_types() -> [ParamType; 5] {
        [
            ParamType::Address,
            ParamType::Array(Box::new(ParamType::String)),
            ParamType::Bytes,
            ParamType::FixedBytes(4),
            ParamType::Bytes,
        ]
    }

    /// Decode revert data. Returns `Ok(None)` when the data is some other revert.
    pub fn decode(revert: &[u8]) -> Result<Option<Self>> {
        let Some((sel, args)) = abi::split_selector(revert) else {
            return Ok(None);
        };
        if sel != selector(OFFCHAIN_LOOKUP_SIGNATURE) {
            return Ok(None);
        }

        let mut tokens = abi::decode(&Self::param_types(), args)?.into_iter();
        let mut next = || {
            tokens
                .next()
                .ok_or_else(|| Error::Abi("truncated OffchainLookup".to_string()))
        };
        let origin = next()?.take_address()?;
        let endpoints = next()?
            .take_items()?
            .into_iter()
            .map(TokenExt::take_string)
            .collect::<Result<Vec<_>>>()?;
        let request = next()?.take_bytes()?;
        let callback_bytes = next()?.take_bytes()?;
        let carry = next()?.take_bytes()?;

        let callback: [u8; 4] = callback_bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::Abi("callback selector must be 4 bytes".to_string()))?;

        Ok(Some(Self {
            origin,
            endpoints,
            request,
            callback,
            carry,
        }))
    }

    /// Encode as revert data
    pub fn encode(&self) -> Vec<u8> {
        abi::encode_call(
            selector(OFFCHAIN_LOOKUP_SIGNATURE),
            &[
                abi::address(self.origin),
                Token::Array(self.endpoints.iter().cloned().map(Token::String).collect()),
                Token::Bytes(self.request.clone()),
                Token::FixedBytes(self.callback.to_vec()),
                Token::Bytes(self.carry.clone()),
            ],
        )
    }

    /// Calldata resuming `origin` with a fetched response
    pub fn callback_data(&self, response: &[u8]) -> Vec<u8> {
        abi::encode_call(
            self.callback,
            &[Token::Bytes(response.to_vec()), Token::Bytes(self.carry.clone())],
        )
    }
}

/// Batched fetch request addressed to a batch gateway
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchQuery {
    /// `(sender, urls, data)` per sub-request
    pub requests: Vec<(Address, Vec<String>, Vec<u8>)>,
}

impl BatchQuery {
    fn param_type() -> ParamType {
        ParamType::Array(Box::new(ParamType::Tuple(vec![
            ParamType::Address,
            ParamType::Array(Box::new(ParamType::String)),
            ParamType::Bytes,
        ])))
    }

    /// Add a sub-request built from a deferral
    pub fn push(&mut self, signal: &DeferredAnswer) {
        self.requests
            .push((signal.origin, signal.endpoints.clone(), signal.request.clone()));
    }

    /// Number of sub-requests
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// True when nothing was queued
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Encode as `query(...)` calldata
    pub fn encode(&self) -> Vec<u8> {
        let items = self
            .requests
            .iter()
            .map(|(sender, urls, data)| {
                Token::Tuple(vec![
                    abi::address(*sender),
                    Token::Array(urls.iter().cloned().map(Token::String).collect()),
                    Token::Bytes(data.clone()),
                ])
            })
            .collect();
        abi::encode_call(selector(BATCH_QUERY_SIGNATURE), &[Token::Array(items)])
    }

    /// Decode `query(...)` calldata, as a batch gateway does
    pub fn decode(calldata: &[u8]) -> Result<Self> {
        let (sel, args) = abi::split_selector(calldata)
            .ok_or_else(|| Error::Abi("batch calldata too short".to_string()))?;
        if sel != selector(BATCH_QUERY_SIGNATURE) {
            return Err(Error::Abi(format!(
                "unexpected batch selector 0x{}",
                hex::encode(sel)
            )));
        }
        let items = abi::decode_single(Self::param_type(), args)?.take_items()?;
        let mut requests = Vec::with_capacity(items.len());
        for item in items {
            let mut fields = item.take_items()?.into_iter();
            let (Some(sender), Some(urls), Some(data)) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(Error::Abi("batch sub-request needs 3 fields".to_string()));
            };
            let urls = urls
                .take_items()?
                .into_iter()
                .map(TokenExt::take_string)
                .collect::<Result<Vec<_>>>()?;
            requests.push((sender.take_address()?, urls, data.take_bytes()?));
        }
        Ok(Self { requests })
    }
}

/// Batch gateway answer, one slot per sub-request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReply {
    /// Per-slot outcome, in request order
    pub responses: Vec<SubResponse>,
}

impl BatchReply {
    /// Decode `(bool[] failures, bytes[] responses)`, checking both lengths
    /// against the number of sub-requests sent.
    pub fn decode(data: &[u8], expected: usize) -> Result<Self> {
        let mut tokens = abi::decode(
            &[
                ParamType::Array(Box::new(ParamType::Bool)),
                ParamType::Array(Box::new(ParamType::Bytes)),
            ],
            data,
        )?
        .into_iter();
        let (Some(failures), Some(payloads)) = (tokens.next(), tokens.next()) else {
            return Err(Error::Abi("batch reply needs 2 fields".to_string()));
        };
        let failures = failures
            .take_items()?
            .into_iter()
            .map(TokenExt::take_bool)
            .collect::<Result<Vec<_>>>()?;
        let payloads = payloads
            .take_items()?
            .into_iter()
            .map(TokenExt::take_bytes)
            .collect::<Result<Vec<_>>>()?;

        if failures.len() != payloads.len() || failures.len() != expected {
            return Err(Error::MalformedFetchResponse(format!(
                "batch reply length mismatch: {} failures, {} responses, {} requests",
                failures.len(),
                payloads.len(),
                expected
            )));
        }

        let responses = failures
            .into_iter()
            .zip(payloads)
            .map(|(failed, payload)| {
                if failed {
                    Err(GatewayError::decode(&payload))
                } else {
                    Ok(payload)
                }
            })
            .collect();
        Ok(Self { responses })
    }

    /// Encode, as a batch gateway does
    pub fn encode(&self) -> Vec<u8> {
        let mut failures = Vec::with_capacity(self.responses.len());
        let mut payloads = Vec::with_capacity(self.responses.len());
        for response in &self.responses {
            match response {
                Ok(data) => {
                    failures.push(Token::Bool(false));
                    payloads.push(Token::Bytes(data.clone()));
                }
                Err(err) => {
                    failures.push(Token::Bool(true));
                    payloads.push(Token::Bytes(err.encode()));
                }
            }
        }
        abi::encode(&[Token::Array(failures), Token::Array(payloads)])
    }
}

/// Encode a list of gateway errors as `HttpError((uint16,string)[])`
pub fn encode_batched_errors(errors: &[GatewayError]) -> Vec<u8> {
    let items = errors
        .iter()
        .map(|e| {
            Token::Tuple(vec![
                abi::uint(u64::from(e.code)),
                Token::String(e.message.clone()),
            ])
        })
        .collect();
    abi::encode_call(selector(BATCHED_HTTP_ERROR_SIGNATURE), &[Token::Array(items)])
}

/// Decode `HttpError((uint16,string)[])`
pub fn decode_batched_errors(data: &[u8]) -> Option<Vec<GatewayError>> {
    let (sel, args) = abi::split_selector(data)?;
    if sel != selector(BATCHED_HTTP_ERROR_SIGNATURE) {
        return None;
    }
    let ty = ParamType::Array(Box::new(ParamType::Tuple(vec![
        abi::uint_type(),
        ParamType::String,
    ])));
    let items = abi::decode_single(ty, args).ok()?.take_items().ok()?;
    items
        .into_iter()
        .map(|item| {
            let mut fields = item.take_items().ok()?.into_iter();
            let code = fields.next()?.take_uint().ok()?;
            let message = fields.next()?.take_string().ok()?;
            Some(GatewayError::new(u16::try_from(code).ok()?, message))
        })
        .collect()
}
