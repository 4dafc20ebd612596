//! Retry policy for query execution
//!
//! Builds on the backoff schedules from `querykit-core` with the pieces that
//! need a [`ClassifiedError`]: the retry predicate and the `Retry-After`
//! floor.

use crate::error::ClassifiedError;
use querykit_core::retry::{BackoffStrategy, ExponentialBackoff};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type RetryPredicate = Arc<dyn Fn(&ClassifiedError) -> bool + Send + Sync>;

/// How a query is retried.
///
/// # Default Configuration
///
/// - `max_retries`: 2 (three attempts in total)
/// - `per_attempt_timeout`: 30s
/// - `backoff`: [`ExponentialBackoff::default()`] (500ms, doubling, ±10%)
/// - predicate: retry every retryable kind
///
/// `Client` and `Parse` errors are never retried; the predicate can only
/// narrow which of the retryable kinds are retried.
///
/// # Examples
///
/// ```rust
/// use querykit::{ErrorKind, RetryPolicy};
/// use querykit_core::retry::FixedBackoff;
/// use std::time::Duration;
///
/// // Retry server errors only, three times, one second apart
/// let policy = RetryPolicy::builder()
///     .max_retries(3)
///     .backoff(FixedBackoff::new(Duration::from_secs(1)))
///     .per_attempt_timeout(Duration::from_secs(5))
///     .retry_if(|err| err.kind() == ErrorKind::Server)
///     .build();
///
/// assert_eq!(policy.max_retries(), 3);
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    per_attempt_timeout: Duration,
    backoff: Arc<dyn BackoffStrategy>,
    retryable: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicyBuilder::default().build()
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("per_attempt_timeout", &self.per_attempt_timeout)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// Create a new builder for configuring a retry policy.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// A single attempt with the given timeout.
    pub fn no_retries(per_attempt_timeout: Duration) -> Self {
        Self::builder()
            .max_retries(0)
            .per_attempt_timeout(per_attempt_timeout)
            .build()
    }

    /// Retries allowed after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Upper bound on each individual attempt.
    pub fn per_attempt_timeout(&self) -> Duration {
        self.per_attempt_timeout
    }

    /// Whether `error` may be retried under this policy.
    pub fn should_retry(&self, error: &ClassifiedError) -> bool {
        error.is_retryable() && (self.retryable)(error)
    }

    /// How long to wait after failed attempt number `attempt` (0-indexed).
    ///
    /// The server's `Retry-After` hint, when present, is a floor.
    pub fn delay_for(&self, attempt: u32, error: &ClassifiedError) -> Duration {
        let scheduled = self.backoff.next_delay(attempt);
        error
            .retry_after()
            .map_or(scheduled, |floor| scheduled.max(floor))
    }
}

/// Builder for [`RetryPolicy`].
pub struct RetryPolicyBuilder {
    max_retries: u32,
    per_attempt_timeout: Duration,
    backoff: Arc<dyn BackoffStrategy>,
    retryable: RetryPredicate,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self {
            max_retries: 2,
            per_attempt_timeout: Duration::from_secs(30),
            backoff: Arc::new(ExponentialBackoff::default()),
            retryable: Arc::new(|_: &ClassifiedError| true),
        }
    }
}

impl RetryPolicyBuilder {
    /// Set the maximum number of retries after the first attempt.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the timeout applied to each attempt.
    pub fn per_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.per_attempt_timeout = timeout;
        self
    }

    /// Set the delay schedule between attempts.
    pub fn backoff(mut self, backoff: impl BackoffStrategy + 'static) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Narrow which retryable errors are retried.
    pub fn retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&ClassifiedError) -> bool + Send + Sync + 'static,
    {
        self.retryable = Arc::new(predicate);
        self
    }

    /// Build the retry policy.
    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            per_attempt_timeout: self.per_attempt_timeout,
            backoff: self.backoff,
            retryable: self.retryable,
        }
    }
}
