//! # querykit
//!
//! Retrying HTTP query execution with a typed operation lifecycle:
//! - Four-state [`AsyncResult`] for every query
//! - Error classification into client, server, network, parse and
//!   rate-limited failures
//! - Bounded retries with exponential backoff and `Retry-After` floors
//! - Per-attempt timeouts and cooperative cancellation
//! - Exhaustive skip/limit pagination
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use querykit::{AsyncResult, JsonDecoder, QueryExecutor};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug, Clone, serde::Deserialize)]
//! struct Order {
//!     id: u64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let executor = QueryExecutor::builder()
//!         .base_url("https://api.example.com/v1/")
//!         .bearer_token("token")
//!         .build()?;
//!
//!     let handle = executor.spawn(
//!         executor.get("orders/42")?,
//!         JsonDecoder::<Order>::new(),
//!         executor.policy().clone(),
//!     );
//!
//!     match handle.wait().await {
//!         Some(AsyncResult::Success(order)) => println!("{order:?}"),
//!         Some(AsyncResult::Failure(err)) => eprintln!("{err}"),
//!         _ => {}
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Re-export commonly used types
pub use config::ExecutorConfig;
pub use decode::{DecodeError, Decoder, JsonDecoder, ValidationIssue};
pub use enrich::{HeaderEnricher, NoEnrichment, StaticEnricher};
pub use error::{ClassifiedError, Error, ErrorKind, Result};
pub use executor::{QueryExecutor, QueryExecutorBuilder};
pub use handle::{QueryGroup, QueryHandle};
pub use pagination::{FetchAllError, PageRequest, PagedResponse, PaginatedFetcher, fetch_all};
pub use policy::{RetryPolicy, RetryPolicyBuilder};
pub use querykit_core::AsyncResult;

// Module declarations
pub mod config;
pub mod decode;
pub mod enrich;
pub mod error;
pub mod executor;
pub mod handle;
pub mod observability;
pub mod pagination;
pub mod policy;

// Re-export key dependencies for convenience
pub use querykit_core::retry;
pub use querykit_transport as transport;
pub use tokio_util::sync::CancellationToken;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenient re-exports of commonly used items.
pub mod prelude {
    pub use crate::{
        AsyncResult, CancellationToken, ClassifiedError, ErrorKind, JsonDecoder, PaginatedFetcher,
        QueryExecutor, QueryGroup, QueryHandle, RetryPolicy,
    };
}
