//! Error types for querykit
//!
//! Two families live here:
//!
//! - [`ClassifiedError`]: the outcome of a failed query attempt, annotated
//!   with a retry-relevant [`ErrorKind`]. It is delivered as data inside
//!   [`AsyncResult::Failure`](querykit_core::AsyncResult::Failure), never
//!   raised.
//! - [`Error`]: setup failures (bad configuration, invalid base URL) returned
//!   through the crate [`Result`] alias.

use crate::decode::DecodeError;
use chrono::{DateTime, Utc};
use querykit_transport::{HttpResponse, TransportError};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for setup and configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Setup and configuration errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A URL could not be parsed or joined.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// An environment variable or config field held an unusable value.
    #[error("Invalid value for {name}: {value:?}")]
    InvalidConfig {
        /// Variable or field name
        name: &'static str,
        /// The rejected value
        value: String,
    },

    /// A header name or value contained invalid characters.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// The transport could not be constructed.
    #[error("Transport setup failed: {0}")]
    Transport(#[from] TransportError),
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}

/// Retry-relevant category of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// HTTP 4xx other than 429. The request itself is wrong; terminal.
    Client,
    /// HTTP 5xx. Retryable.
    Server,
    /// No response: connection failure, protocol failure or timeout. Retryable.
    Network,
    /// The response body failed decoding or validation. Terminal.
    Parse,
    /// HTTP 429. Retryable, honoring any `Retry-After` hint.
    RateLimited,
}

impl ErrorKind {
    /// Classify a non-2xx HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => ErrorKind::RateLimited,
            s if s >= 500 => ErrorKind::Server,
            _ => ErrorKind::Client,
        }
    }

    /// Whether an error of this kind may be retried at all.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Server | ErrorKind::Network | ErrorKind::RateLimited
        )
    }

    /// Stable lowercase name, as used in logs and UI notifications.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Client => "client",
            ErrorKind::Server => "server",
            ErrorKind::Network => "network",
            ErrorKind::Parse => "parse",
            ErrorKind::RateLimited => "rateLimited",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed attempt, annotated with its retry-relevant category.
///
/// Fields are private: a classified error is built once per failed attempt
/// and then only read.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} error: {message}")]
pub struct ClassifiedError {
    kind: ErrorKind,
    message: String,
    status_code: Option<u16>,
    retry_after: Option<Duration>,
    payload: Option<serde_json::Value>,
}

impl ClassifiedError {
    /// Create an error of `kind` with a human-readable message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            retry_after: None,
            payload: None,
        }
    }

    /// Attach the HTTP status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    /// Attach a server-provided minimum delay before the next attempt.
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    /// Attach server-provided problem details or validation issues.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Classify a non-2xx response.
    ///
    /// The body is kept as `payload` when it is JSON (problem details), and
    /// the message is taken from its `detail`, `title` or `message` field
    /// when present.
    pub fn from_response(response: &HttpResponse) -> Self {
        Self::from_response_at(response, Utc::now())
    }

    fn from_response_at(response: &HttpResponse, now: DateTime<Utc>) -> Self {
        let status = response.status;
        let payload = serde_json::from_slice::<serde_json::Value>(&response.body).ok();
        let message = payload
            .as_ref()
            .and_then(problem_message)
            .unwrap_or_else(|| fallback_message(response));

        let mut error = Self::new(ErrorKind::from_status(status), message).with_status(status);
        if let Some(delay) = response
            .header("retry-after")
            .and_then(|value| parse_retry_after(value, now))
        {
            error = error.with_retry_after(delay);
        }
        if let Some(payload) = payload {
            error = error.with_payload(payload);
        }
        error
    }

    /// Classify a failure to obtain a response.
    ///
    /// Network failures, as judged by
    /// [`TransportError::is_network_failure`], are [`ErrorKind::Network`].
    /// Requests that could not even be built are a caller defect and are
    /// classified as [`ErrorKind::Client`].
    pub fn from_transport(error: &TransportError) -> Self {
        let kind = if error.is_network_failure() {
            ErrorKind::Network
        } else {
            ErrorKind::Client
        };
        Self::new(kind, error.to_string())
    }

    /// Classify a decode failure; the issues become the payload.
    pub fn from_decode(error: DecodeError) -> Self {
        let message = error.to_string();
        let payload = serde_json::to_value(error.issues()).unwrap_or(serde_json::Value::Null);
        Self::new(ErrorKind::Parse, message).with_payload(payload)
    }

    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable description.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status, when a response was received.
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Server-provided minimum delay before retrying.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Problem details or validation issues, when available.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref()
    }

    /// Shorthand for `self.kind().is_retryable()`.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Parse a `Retry-After` header value.
///
/// Accepts delta-seconds (`"120"`) and HTTP-dates
/// (`"Wed, 21 Oct 2015 07:28:00 GMT"`). Dates in the past yield zero.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

fn problem_message(payload: &serde_json::Value) -> Option<String> {
    ["detail", "title", "message"]
        .iter()
        .find_map(|key| payload.get(key).and_then(|v| v.as_str()))
        .map(str::to_owned)
}

fn fallback_message(response: &HttpResponse) -> String {
    const MAX_BODY_CHARS: usize = 200;

    let text = response.text();
    let text = text.trim();
    if !text.is_empty() {
        return text.chars().take(MAX_BODY_CHARS).collect();
    }

    http::StatusCode::from_u16(response.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("HTTP {}", response.status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::ValidationIssue;
    use http::{HeaderMap, HeaderValue};
    use rstest::rstest;

    fn response(status: u16, body: &'static str) -> HttpResponse {
        HttpResponse::new(status, HeaderMap::new(), body)
    }

    #[rstest]
    #[case(400, ErrorKind::Client)]
    #[case(401, ErrorKind::Client)]
    #[case(404, ErrorKind::Client)]
    #[case(422, ErrorKind::Client)]
    #[case(429, ErrorKind::RateLimited)]
    #[case(500, ErrorKind::Server)]
    #[case(502, ErrorKind::Server)]
    #[case(503, ErrorKind::Server)]
    #[case(304, ErrorKind::Client)]
    fn test_status_classification(#[case] status: u16, #[case] expected: ErrorKind) {
        assert_eq!(ErrorKind::from_status(status), expected);
        assert_eq!(ClassifiedError::from_response(&response(status, "")).kind(), expected);
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Server.is_retryable());
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(!ErrorKind::Client.is_retryable());
        assert!(!ErrorKind::Parse.is_retryable());
    }

    #[test]
    fn test_problem_details_become_payload() {
        let body = r#"{"type":"about:blank","title":"Not Found","detail":"no such order"}"#;
        let error = ClassifiedError::from_response(&response(404, body));

        assert_eq!(error.kind(), ErrorKind::Client);
        assert_eq!(error.status_code(), Some(404));
        assert_eq!(error.message(), "no such order");
        assert_eq!(error.payload().unwrap()["title"], "Not Found");
        assert_eq!(error.to_string(), "client error: no such order");
    }

    #[test]
    fn test_plain_text_body_used_as_message() {
        let error = ClassifiedError::from_response(&response(502, "  upstream died  "));
        assert_eq!(error.message(), "upstream died");
        assert!(error.payload().is_none());
    }

    #[test]
    fn test_empty_body_uses_reason_phrase() {
        let error = ClassifiedError::from_response(&response(503, ""));
        assert_eq!(error.message(), "Service Unavailable");
    }

    #[test]
    fn test_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("7"));
        let error = ClassifiedError::from_response(&HttpResponse::new(429, headers, ""));

        assert_eq!(error.kind(), ErrorKind::RateLimited);
        assert_eq!(error.retry_after(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_retry_after_http_date() {
        let now = DateTime::parse_from_rfc3339("2015-10-21T07:27:30Z")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(30))
        );
        // already passed
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", now),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after("soon", now), None);
    }

    #[test]
    fn test_transport_classification() {
        let timeout = ClassifiedError::from_transport(&TransportError::Timeout(Duration::from_secs(1)));
        assert_eq!(timeout.kind(), ErrorKind::Network);
        assert_eq!(timeout.status_code(), None);

        let refused = ClassifiedError::from_transport(&TransportError::Connection("refused".into()));
        assert_eq!(refused.kind(), ErrorKind::Network);

        let bad = ClassifiedError::from_transport(&TransportError::InvalidRequest("header".into()));
        assert_eq!(bad.kind(), ErrorKind::Client);

        // An interrupted send the caller did not ask for agrees with the
        // transport's own judgement.
        let interrupted = TransportError::Cancelled;
        assert!(interrupted.is_network_failure());
        assert_eq!(ClassifiedError::from_transport(&interrupted).kind(), ErrorKind::Network);
    }

    #[test]
    fn test_decode_classification_carries_issues() {
        let error = ClassifiedError::from_decode(DecodeError::new(vec![ValidationIssue::new(
            "items[0].id",
            "must be positive",
        )]));

        assert_eq!(error.kind(), ErrorKind::Parse);
        assert!(!error.is_retryable());
        let payload = error.payload().unwrap();
        assert_eq!(payload[0]["path"], "items[0].id");
        assert_eq!(payload[0]["message"], "must be positive");
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ErrorKind::RateLimited.to_string(), "rateLimited");
        assert_eq!(
            serde_json::to_value(ErrorKind::RateLimited).unwrap(),
            serde_json::json!("rateLimited")
        );
    }
}
