//! Error types for the universal resolver
//!
//! Every failure is scoped as narrowly as possible: most variants end up in a
//! single [`RecordResult`](crate::RecordResult) and never abort sibling work.
//! Only the variants for which [`Error::is_request_fatal`] holds stop a whole
//! request.

use crate::offchain::GatewayError;
use std::fmt;

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Resolver errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Name could not be normalized or encoded
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Address could not be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// ABI payload could not be encoded or decoded
    #[error("ABI error: {0}")]
    Abi(String),

    /// No suffix of the name has an authority
    #[error("No authority found for {0}")]
    NoAuthorityFound(String),

    /// Record kind cannot be addressed to a profile endpoint
    #[error("Unsupported record kind: {0}")]
    UnsupportedRecordKind(String),

    /// Exact-match authority asked to answer for a descendant name
    #[error("Authority for {0} does not support wildcard resolution")]
    WildcardUnsupported(String),

    /// Profile transport failed to reach the authority
    #[error("Profile call failed: {0}")]
    ProfileCallFailed(String),

    /// Authority reverted a direct profile call
    #[error("Profile call reverted: 0x{}", hex::encode(.0))]
    ProfileReverted(Vec<u8>),

    /// Authority reverted the resumption call after a fetch
    #[error("Resumption reverted: 0x{}", hex::encode(.0))]
    ResumptionReverted(Vec<u8>),

    /// Endpoint unreachable
    #[error("Fetch network error: {0}")]
    FetchNetwork(String),

    /// Endpoint did not answer in time
    #[error("Fetch timed out: {0}")]
    FetchTimeout(String),

    /// Endpoint answered with an error status
    #[error("Gateway status {code}: {message}")]
    GatewayStatus {
        /// HTTP status code
        code: u16,
        /// Message reported by the gateway
        message: String,
    },

    /// Endpoint answered with an unparseable body
    #[error("Malformed fetch response: {0}")]
    MalformedFetchResponse(String),

    /// Sub-request of a batch failed
    #[error("Batch sub-request failed: {}", format_gateway_errors(.0))]
    BatchPartialFailure(Vec<GatewayError>),

    /// Deferral chain longer than the configured bound
    #[error("Too many redirects (max {0})")]
    RedirectDepthExceeded(usize),

    /// Registry collaborator failed
    #[error("Registry error: {0}")]
    Registry(String),

    /// Request-level deadline elapsed
    #[error("Request timed out")]
    Timeout,

    /// Request cancelled by the caller
    #[error("Request cancelled")]
    Cancelled,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn format_gateway_errors(errors: &[GatewayError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}:{}", e.code, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Whether a candidate endpoint failing this way lets the caller try the next one.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::FetchNetwork(_) | Error::FetchTimeout(_) => true,
            Error::GatewayStatus { code, .. } => *code >= 500,
            _ => false,
        }
    }

    /// Whether this error aborts the whole request instead of a single record.
    pub fn is_request_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidName(_)
                | Error::NoAuthorityFound(_)
                | Error::Registry(_)
                | Error::Timeout
                | Error::Cancelled
                | Error::Config(_)
        )
    }

    /// `(code, message)` pairs describing this error as a gateway failure.
    pub fn gateway_errors(&self) -> Vec<GatewayError> {
        match self {
            Error::BatchPartialFailure(errors) => errors.clone(),
            Error::GatewayStatus { code, message } => vec![GatewayError::new(*code, message)],
            Error::FetchTimeout(_) | Error::Timeout => vec![GatewayError::new(504, self.to_string())],
            other => vec![GatewayError::new(500, other.to_string())],
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidName(_) | Error::InvalidAddress(_) => ErrorCategory::Input,
            Error::Abi(_) | Error::Serialization(_) => ErrorCategory::Encoding,
            Error::NoAuthorityFound(_) | Error::Registry(_) => ErrorCategory::Registry,
            Error::UnsupportedRecordKind(_)
            | Error::WildcardUnsupported(_)
            | Error::ProfileCallFailed(_)
            | Error::ProfileReverted(_)
            | Error::ResumptionReverted(_) => ErrorCategory::Profile,
            Error::FetchNetwork(_)
            | Error::FetchTimeout(_)
            | Error::GatewayStatus { .. }
            | Error::MalformedFetchResponse(_)
            | Error::RedirectDepthExceeded(_) => ErrorCategory::Offchain,
            Error::BatchPartialFailure(_) => ErrorCategory::Batch,
            Error::Timeout | Error::Cancelled => ErrorCategory::Request,
            Error::Config(_) => ErrorCategory::Internal,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller-supplied name or address
    Input,
    /// ABI or JSON encoding
    Encoding,
    /// Authority lookup
    Registry,
    /// Direct or resumed profile call
    Profile,
    /// Off-chain fetch
    Offchain,
    /// Batch gateway
    Batch,
    /// Request lifetime
    Request,
    /// Internal/system errors
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Input => write!(f, "Input"),
            ErrorCategory::Encoding => write!(f, "Encoding"),
            ErrorCategory::Registry => write!(f, "Registry"),
            ErrorCategory::Profile => write!(f, "Profile"),
            ErrorCategory::Offchain => write!(f, "Offchain"),
            ErrorCategory::Batch => write!(f, "Batch"),
            ErrorCategory::Request => write!(f, "Request"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}
