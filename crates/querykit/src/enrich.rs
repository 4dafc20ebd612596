//! Per-attempt header enrichment
//!
//! Authentication and locale headers are not the executor's business: it
//! calls a [`HeaderEnricher`] once before every attempt and sends whatever
//! comes back. Token refresh between retries therefore works without any
//! extra plumbing.

use crate::error::{Error, Result};
use http::header::{ACCEPT_LANGUAGE, AUTHORIZATION};
use http::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Adds headers to an outgoing attempt.
///
/// Closures of the right shape are enrichers:
///
/// ```rust
/// use http::{HeaderMap, HeaderValue};
/// use querykit::HeaderEnricher;
///
/// let tracing = |mut headers: HeaderMap| {
///     headers.insert("x-request-source", HeaderValue::from_static("dashboard"));
///     headers
/// };
/// let headers = tracing.enrich(HeaderMap::new());
/// assert_eq!(headers["x-request-source"], "dashboard");
/// ```
pub trait HeaderEnricher: Send + Sync {
    /// Return `base` with any extra headers applied.
    fn enrich(&self, base: HeaderMap) -> HeaderMap;
}

impl<F> HeaderEnricher for F
where
    F: Fn(HeaderMap) -> HeaderMap + Send + Sync,
{
    fn enrich(&self, base: HeaderMap) -> HeaderMap {
        self(base)
    }
}

/// Leaves headers untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEnrichment;

impl HeaderEnricher for NoEnrichment {
    fn enrich(&self, base: HeaderMap) -> HeaderMap {
        base
    }
}

/// Adds a fixed bearer token and `Accept-Language`.
///
/// Headers already present on the request win, so a single call can
/// override either value.
#[derive(Clone, Default)]
pub struct StaticEnricher {
    authorization: Option<HeaderValue>,
    accept_language: Option<HeaderValue>,
}

impl StaticEnricher {
    /// An enricher that adds nothing until configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `Authorization: Bearer <token>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the token contains characters not
    /// allowed in a header value.
    pub fn bearer_token(mut self, token: &SecretString) -> Result<Self> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|_| Error::InvalidHeader("bearer token contains invalid characters".into()))?;
        value.set_sensitive(true);
        self.authorization = Some(value);
        Ok(self)
    }

    /// Send `Accept-Language: <language>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if `language` is not a valid header value.
    pub fn accept_language(mut self, language: &str) -> Result<Self> {
        let value = HeaderValue::from_str(language)
            .map_err(|e| Error::InvalidHeader(format!("accept-language {language:?}: {e}")))?;
        self.accept_language = Some(value);
        Ok(self)
    }
}

impl fmt::Debug for StaticEnricher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticEnricher")
            .field("authorization", &self.authorization.as_ref().map(|_| "[REDACTED]"))
            .field("accept_language", &self.accept_language)
            .finish()
    }
}

impl HeaderEnricher for StaticEnricher {
    fn enrich(&self, mut base: HeaderMap) -> HeaderMap {
        if let Some(value) = &self.authorization {
            base.entry(AUTHORIZATION).or_insert_with(|| value.clone());
        }
        if let Some(value) = &self.accept_language {
            base.entry(ACCEPT_LANGUAGE).or_insert_with(|| value.clone());
        }
        base
    }
}
