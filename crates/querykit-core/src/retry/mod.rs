//! Backoff schedules for retried operations.
//!
//! A [`BackoffStrategy`] only answers "how long to wait before retry number
//! `n`". Deciding *whether* to retry, and how many times, is the job of the
//! caller's retry policy.
//!
//! # Key Types
//!
//! - [`BackoffStrategy`] - delay schedule trait, also implemented for closures
//! - [`ExponentialBackoff`] - exponential growth with jitter and a cap
//! - [`FixedBackoff`] - the same delay before every retry
//!
//! # Examples
//!
//! ```rust
//! use querykit_core::retry::{BackoffStrategy, ExponentialBackoff};
//! use std::time::Duration;
//!
//! let backoff = ExponentialBackoff::builder()
//!     .initial_delay(Duration::from_millis(100))
//!     .jitter(0.0)
//!     .build();
//!
//! assert_eq!(backoff.next_delay(0), Duration::from_millis(100));
//! assert_eq!(backoff.next_delay(1), Duration::from_millis(200));
//! ```

mod exponential;
mod strategy;

pub use exponential::{ExponentialBackoff, ExponentialBackoffBuilder};
pub use strategy::{BackoffStrategy, FixedBackoff};
