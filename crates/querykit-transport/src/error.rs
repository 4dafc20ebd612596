//! Transport error types

use std::time::Duration;
use thiserror::Error;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur before a response is received.
///
/// A response with a non-2xx status is *not* a transport error; it is
/// returned as an [`HttpResponse`](crate::HttpResponse) and classified by the
/// caller.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP protocol error (malformed response, body read failure, ...)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Connection could not be established or was reset
    #[error("Connection error: {0}")]
    Connection(String),

    /// The attempt did not complete within its timeout
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the attempt while it was in flight
    #[error("Request cancelled")]
    Cancelled,

    /// The request could not be built (bad URL, header, body)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Map a reqwest failure, keeping timeouts and connection failures apart.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }

    /// `true` when no response was produced even though the request itself
    /// was well formed: timeouts, connection, protocol and I/O failures, and
    /// sends interrupted mid-flight. Only [`TransportError::InvalidRequest`]
    /// is excluded, since sending it again cannot succeed.
    pub fn is_network_failure(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_))
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidRequest(format!("body serialization failed: {err}"))
    }
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidRequest(format!("invalid URL: {err}"))
    }
}
