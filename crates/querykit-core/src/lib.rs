#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Core value types shared across the querykit crates.
//!
//! This crate holds the pieces that do no I/O:
//!
//! - **Operation lifecycle** via [`AsyncResult`], a closed four-state enum
//!   (`NotStarted`, `InProgress`, `Failure`, `Success`) with total `fold`,
//!   `map` and predicate helpers
//! - **Backoff schedules** via the [`retry::BackoffStrategy`] trait
//!   - Exponential backoff with jitter
//!   - Fixed delays
//!   - Plain closures
//!
//! # Examples
//!
//! Using the prelude for convenient imports:
//!
//! ```rust
//! use querykit_core::prelude::*;
//! use std::time::Duration;
//!
//! let backoff = ExponentialBackoff::builder()
//!     .initial_delay(Duration::from_millis(100))
//!     .build();
//! let _first_wait = backoff.next_delay(0);
//!
//! let state: AsyncResult<String, u32> = AsyncResult::in_progress();
//! assert!(state.is_in_progress());
//! ```

pub mod async_result;
pub mod retry;

pub use async_result::AsyncResult;

/// Convenient re-exports of commonly used items.
///
/// ```rust
/// use querykit_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::async_result::AsyncResult;
    pub use crate::retry::{BackoffStrategy, ExponentialBackoff, ExponentialBackoffBuilder, FixedBackoff};
}
