//! Transport abstraction layer for querykit
//!
//! Provides the [`Transport`] capability that the query executor consumes:
//! one HTTP exchange per call, bounded by a timeout and abortable through a
//! cancellation token.
//!
//! # Architecture
//!
//! - **Transport trait**: generic interface for any transport implementation
//! - **HTTP transport**: REST client via reqwest
//! - **Error handling**: failures to obtain a response, kept apart from
//!   non-2xx responses

#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! # Usage
//!
//! ```no_run
//! use querykit_transport::{HttpRequest, HttpTransport, Transport};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> querykit_transport::Result<()> {
//! let transport = HttpTransport::new()?;
//! let request = HttpRequest::parse(http::Method::GET, "https://api.example.com/items")?;
//! let response = transport
//!     .send(request, Duration::from_secs(10), &CancellationToken::new())
//!     .await?;
//! println!("{}", response.status);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod http;
pub mod traits;

// Re-export commonly used types
pub use error::{Result, TransportError};
pub use http::{HttpTransport, HttpTransportConfig};
pub use traits::{HttpRequest, HttpResponse, Transport};
