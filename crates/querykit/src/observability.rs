//! Structured logging for query execution
//!
//! Every attempt and every terminal outcome is logged through this module so
//! field names stay consistent (`method`, `path`, `attempt`, `status`,
//! `elapsed_ms`, `kind`).

use crate::error::ClassifiedError;
use querykit_transport::HttpRequest;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Attempt metadata for structured logging
#[derive(Debug, Clone)]
pub struct AttemptMetadata {
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request path, without query string
    pub path: String,
    /// 0-indexed attempt number
    pub attempt: u32,
    /// Request body size in bytes (optional)
    pub body_size: Option<usize>,
}

impl AttemptMetadata {
    /// Describe attempt number `attempt` of `request`
    pub fn new(request: &HttpRequest, attempt: u32) -> Self {
        Self {
            method: request.method.to_string(),
            path: request.url.path().to_string(),
            attempt,
            body_size: request.body.as_ref().map(|b| b.len()),
        }
    }

    /// Log attempt being sent
    pub fn log_start(&self) {
        debug!(
            method = %self.method,
            path = %self.path,
            attempt = self.attempt,
            body_size = self.body_size,
            "Sending attempt"
        );
    }

    /// Log a received response, whatever its status
    pub fn log_response(&self, status: u16, body_size: usize, elapsed: Duration) {
        debug!(
            method = %self.method,
            path = %self.path,
            attempt = self.attempt,
            status,
            body_size,
            elapsed_ms = elapsed.as_millis(),
            "Attempt received response"
        );
    }

    /// Log a classified attempt failure that will be retried
    pub fn log_retry(&self, error: &ClassifiedError, delay: Duration) {
        warn!(
            method = %self.method,
            path = %self.path,
            attempt = self.attempt,
            kind = %error.kind(),
            status = error.status_code(),
            delay_ms = delay.as_millis(),
            error = %error.message(),
            "Attempt failed, retrying"
        );
    }
}

/// Log the terminal outcome of an execution
pub fn log_success(method: &str, path: &str, attempts: u32, elapsed: Duration) {
    info!(
        method = %method,
        path = %path,
        attempts,
        elapsed_ms = elapsed.as_millis(),
        "Query succeeded"
    );
}

/// Log a terminal failure; `exhausted` marks retried-and-gave-up failures
pub fn log_failure(
    method: &str,
    path: &str,
    attempts: u32,
    elapsed: Duration,
    error: &ClassifiedError,
    exhausted: bool,
) {
    warn!(
        method = %method,
        path = %path,
        attempts,
        elapsed_ms = elapsed.as_millis(),
        kind = %error.kind(),
        status = error.status_code(),
        exhausted,
        error = %error.message(),
        "Query failed"
    );
}

/// Log a cancelled execution
pub fn log_cancelled(method: &str, path: &str, attempts: u32) {
    debug!(method = %method, path = %path, attempts, "Query cancelled");
}

/// Timer for measuring request duration
///
/// Uses tokio's clock so paused-time tests see consistent values.
#[derive(Debug, Clone, Copy)]
pub struct RequestTimer {
    start: Instant,
}

impl RequestTimer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Install a `fmt` subscriber filtered by `RUST_LOG`.
///
/// Does nothing if a global subscriber is already set.
#[cfg(feature = "trace")]
#[cfg_attr(docsrs, doc(cfg(feature = "trace")))]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
