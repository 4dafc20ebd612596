//! Exponential backoff with jitter.

use super::strategy::BackoffStrategy;
use rand::Rng;
use std::time::Duration;

const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
const DEFAULT_MULTIPLIER: f64 = 2.0;
const DEFAULT_JITTER: f64 = 0.1;

/// Delays that grow geometrically after each failed attempt.
///
/// The wait after failed attempt `n` (0-indexed) is
///
/// ```text
/// min(initial_delay * multiplier^n * (1 + jitter * r), max_delay)    r ∈ [-1, 1]
/// ```
///
/// so with the defaults (500ms, ×2, ±10%, 30s cap) three failures wait about
/// 0.5s, 1s and 2s.
///
/// # Examples
///
/// ```rust
/// use querykit_core::retry::{BackoffStrategy, ExponentialBackoff};
/// use std::time::Duration;
///
/// let first = ExponentialBackoff::default().next_delay(0);
/// assert!(first >= Duration::from_millis(450) && first <= Duration::from_millis(550));
///
/// let backoff = ExponentialBackoff::builder()
///     .initial_delay(Duration::from_millis(100))
///     .max_delay(Duration::from_secs(5))
///     .multiplier(3.0)
///     .jitter(0.0)
///     .build();
/// assert_eq!(backoff.next_delay(2), Duration::from_millis(900));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: f64,
}

impl ExponentialBackoff {
    /// Start configuring a schedule from the defaults.
    pub fn builder() -> ExponentialBackoffBuilder {
        ExponentialBackoffBuilder::default()
    }

    /// The delay before the first retry, before jitter.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Upper bound on any single delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// The un-jittered delay after failed attempt `attempt`, in seconds.
    fn nominal_secs(&self, attempt: u32) -> f64 {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        ExponentialBackoffBuilder::default().build()
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Duration {
        let nominal = self.nominal_secs(attempt);
        let spread = if self.jitter > 0.0 {
            self.jitter * rand::thread_rng().gen_range(-1.0..=1.0)
        } else {
            0.0
        };

        let secs = (nominal * (1.0 + spread)).clamp(0.0, self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
    }
}

/// Builder for [`ExponentialBackoff`].
#[derive(Debug, Clone)]
pub struct ExponentialBackoffBuilder {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: f64,
}

impl Default for ExponentialBackoffBuilder {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl ExponentialBackoffBuilder {
    /// Delay before the first retry. Default: 500ms
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Cap on any single delay. Default: 30s
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Growth factor per failed attempt, raised to at least 1.0 so the
    /// schedule never shrinks. Default: 2.0
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = if multiplier.is_nan() { 1.0 } else { multiplier.max(1.0) };
        self
    }

    /// Relative randomization, clamped to `0.0..=1.0`; 0.1 means ±10%.
    /// Default: 0.1
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_nan() { 0.0 } else { jitter.clamp(0.0, 1.0) };
        self
    }

    /// Finish the schedule.
    pub fn build(self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            multiplier: self.multiplier,
            jitter: self.jitter,
        }
    }
}
