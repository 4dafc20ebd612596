//! The backoff schedule trait and its simplest implementations.

use std::time::Duration;

/// A schedule of delays between retry attempts.
///
/// `attempt` is the 0-indexed number of the attempt that just failed, so
/// `next_delay(0)` is the wait before the first retry.
///
/// Implementations should return non-negative delays (guaranteed by
/// [`Duration`]); a non-decreasing schedule is recommended but not required.
///
/// Any `Fn(u32) -> Duration` closure is a strategy:
///
/// ```rust
/// use querykit_core::retry::BackoffStrategy;
/// use std::time::Duration;
///
/// let linear = |attempt: u32| Duration::from_millis(50 * u64::from(attempt + 1));
/// assert_eq!(linear.next_delay(2), Duration::from_millis(150));
/// ```
pub trait BackoffStrategy: Send + Sync {
    /// Delay to wait after `attempt` failed, before the next attempt starts.
    fn next_delay(&self, attempt: u32) -> Duration;
}

impl<F> BackoffStrategy for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn next_delay(&self, attempt: u32) -> Duration {
        self(attempt)
    }
}

/// Wait the same amount of time before every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    /// Create a schedule that always waits `delay`.
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Retry immediately.
    pub const fn none() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl BackoffStrategy for FixedBackoff {
    fn next_delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}
