//! Backend error taxonomy.
//!
//! Upload failures are classified into the buckets the telemetry record
//! reports (`BackendConnectionErrors`). Classification is coarse on
//! purpose: the service only distinguishes timeouts, refusals, unknown
//! hosts and the two HTTP status families.

use std::error::Error as StdError;

use thiserror::Error;

/// Connection error class reported in telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Request timed out or was cancelled in flight.
    Timeout,
    /// Service returned a 4xx status.
    Http4xx(u16),
    /// Service returned a 5xx status.
    Http5xx(u16),
    /// DNS resolution or connection establishment failed.
    UnknownHost,
    /// The remote refused the connection.
    Refused,
    /// Anything else.
    Other,
}

/// Errors from the backend client.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Service responded with a non-success status.
    #[error("service returned HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated for logging.
        message: String,
    },

    /// Request never completed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Request signing failed.
    #[error("failed to sign request: {0}")]
    Signing(String),

    /// Credentials could not be retrieved from the provider chain.
    #[error("failed to retrieve credentials: {0}")]
    Credentials(String),

    /// No region configured or discoverable.
    #[error("unable to determine a region; set one via --region, config, or AWS_REGION")]
    NoRegion,

    /// Endpoint override or constructed endpoint is not a valid URL.
    #[error("invalid endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        /// The offending endpoint string.
        endpoint: String,
        /// Parse failure.
        #[source]
        source: url::ParseError,
    },

    /// Response body could not be decoded.
    #[error("failed to decode service response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl BackendError {
    /// Classify this error for telemetry counting.
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::Http { status, .. } if (400..500).contains(status) => ErrorClass::Http4xx(*status),
            Self::Http { status, .. } if (500..600).contains(status) => ErrorClass::Http5xx(*status),
            Self::Http { .. } => ErrorClass::Other,
            Self::Transport(err) => classify_transport(err),
            _ => ErrorClass::Other,
        }
    }
}

fn classify_transport(err: &reqwest::Error) -> ErrorClass {
    if err.is_timeout() || is_timeout_message(&err.to_string()) {
        return ErrorClass::Timeout;
    }
    if let Some(kind) = io_error_kind(err) {
        if kind == std::io::ErrorKind::ConnectionRefused {
            return ErrorClass::Refused;
        }
    }
    if err.is_connect() {
        return ErrorClass::UnknownHost;
    }
    ErrorClass::Other
}

/// Timeout detection by message, for errors that reach us wrapped in
/// layers that hide the typed cause.
fn is_timeout_message(message: &str) -> bool {
    message.contains("request canceled")
        || message.contains("deadline exceeded")
        || message.contains("timeout")
        || message.contains("timed out")
}

/// Walk the source chain looking for an IO error kind.
fn io_error_kind(err: &reqwest::Error) -> Option<std::io::ErrorKind> {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<std::io::Error>() {
            return Some(io_err.kind());
        }
        source = inner.source();
    }
    None
}
