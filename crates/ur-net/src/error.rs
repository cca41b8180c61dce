//! Error types

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Request timed out
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Non-2xx HTTP status
    #[error("HTTP status {code}: {message}")]
    Status {
        /// HTTP status code
        code: u16,
        /// Message reported by the server
        message: String,
    },

    /// Body could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON-RPC error object without revert data
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// JSON-RPC error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Classify a reqwest failure against `url`
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(url.to_string())
        } else if err.is_decode() {
            Error::InvalidResponse(format!("{}: {}", url, err))
        } else {
            Error::Connection(format!("{}: {}", url, err))
        }
    }
}

impl From<Error> for ur_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Connection(msg) => ur_core::Error::FetchNetwork(msg),
            Error::Timeout(url) => ur_core::Error::FetchTimeout(url),
            Error::Status { code, message } => ur_core::Error::GatewayStatus { code, message },
            Error::InvalidResponse(msg) => ur_core::Error::MalformedFetchResponse(msg),
            Error::Json(e) => ur_core::Error::MalformedFetchResponse(e.to_string()),
            Error::Rpc { .. } => ur_core::Error::ProfileCallFailed(err.to_string()),
            Error::Config(msg) => ur_core::Error::Config(msg),
            Error::Io(e) => ur_core::Error::FetchNetwork(e.to_string()),
        }
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
