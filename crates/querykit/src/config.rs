//! Configuration for the query executor

use crate::error::{Error, Result};
use crate::policy::RetryPolicy;
use http::HeaderMap;
use querykit_core::retry::ExponentialBackoff;
use querykit_transport::HttpTransportConfig;
use secrecy::SecretString;
use std::time::Duration;
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Configuration for a [`QueryExecutor`](crate::QueryExecutor).
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Base URL relative request paths are resolved against
    pub base_url: Option<Url>,

    /// Timeout applied to each individual attempt
    pub per_attempt_timeout: Duration,

    /// Retries allowed after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry
    pub initial_backoff: Duration,

    /// Upper bound on any retry delay
    pub max_backoff: Duration,

    /// Headers sent with every request
    pub default_headers: HeaderMap,

    /// Bearer token sent as `Authorization`
    pub bearer_token: Option<SecretString>,

    /// `Accept-Language` sent with every request
    pub accept_language: Option<String>,

    /// Connection tuning for the default HTTP transport
    pub transport: HttpTransportConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let backoff = ExponentialBackoff::default();
        Self {
            base_url: None,
            per_attempt_timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: backoff.initial_delay(),
            max_backoff: backoff.max_delay(),
            default_headers: HeaderMap::new(),
            bearer_token: None,
            accept_language: None,
            transport: HttpTransportConfig::default(),
        }
    }
}

impl ExecutorConfig {
    /// Load configuration from the environment, reading a `.env` file first
    /// if one exists.
    ///
    /// This will look for:
    /// - `QUERYKIT_BASE_URL` for the base URL
    /// - `QUERYKIT_TIMEOUT_SECS` for the per-attempt timeout (in seconds)
    /// - `QUERYKIT_MAX_RETRIES` for the retry count
    /// - `QUERYKIT_BEARER_TOKEN` for authentication
    /// - `QUERYKIT_ACCEPT_LANGUAGE` for the `Accept-Language` header
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a variable is set but cannot be
    /// parsed.
    #[cfg(feature = "env")]
    #[cfg_attr(docsrs, doc(cfg(feature = "env")))]
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_vars(|name| std::env::var(name).ok())
    }

    #[cfg_attr(not(feature = "env"), allow(dead_code))]
    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(base_url) = var("QUERYKIT_BASE_URL") {
            config.base_url = Some(Url::parse(&base_url).map_err(|_| Error::InvalidConfig {
                name: "QUERYKIT_BASE_URL",
                value: base_url,
            })?);
        }

        if let Some(timeout) = var("QUERYKIT_TIMEOUT_SECS") {
            let secs = timeout.trim().parse::<u64>().map_err(|_| Error::InvalidConfig {
                name: "QUERYKIT_TIMEOUT_SECS",
                value: timeout.clone(),
            })?;
            config.per_attempt_timeout = Duration::from_secs(secs);
        }

        if let Some(retries) = var("QUERYKIT_MAX_RETRIES") {
            config.max_retries = retries.trim().parse().map_err(|_| Error::InvalidConfig {
                name: "QUERYKIT_MAX_RETRIES",
                value: retries.clone(),
            })?;
        }

        if let Some(token) = var("QUERYKIT_BEARER_TOKEN") {
            config.bearer_token = Some(SecretString::new(token.into_boxed_str()));
        }

        if let Some(language) = var("QUERYKIT_ACCEPT_LANGUAGE") {
            config.accept_language = Some(language);
        }

        Ok(config)
    }

    /// Merge this configuration with another, with the other taking precedence
    /// wherever it differs from the defaults.
    pub fn merge(mut self, other: ExecutorConfig) -> Self {
        let defaults = Self::default();

        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.per_attempt_timeout != defaults.per_attempt_timeout {
            self.per_attempt_timeout = other.per_attempt_timeout;
        }
        if other.max_retries != defaults.max_retries {
            self.max_retries = other.max_retries;
        }
        if other.initial_backoff != defaults.initial_backoff {
            self.initial_backoff = other.initial_backoff;
        }
        if other.max_backoff != defaults.max_backoff {
            self.max_backoff = other.max_backoff;
        }
        for (key, value) in other.default_headers.iter() {
            self.default_headers.insert(key.clone(), value.clone());
        }
        if other.bearer_token.is_some() {
            self.bearer_token = other.bearer_token;
        }
        if other.accept_language.is_some() {
            self.accept_language = other.accept_language;
        }
        if other.transport != defaults.transport {
            self.transport = other.transport;
        }

        self
    }

    /// The retry policy these settings describe.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.max_retries)
            .per_attempt_timeout(self.per_attempt_timeout)
            .backoff(
                ExponentialBackoff::builder()
                    .initial_delay(self.initial_backoff)
                    .max_delay(self.max_backoff)
                    .build(),
            )
            .build()
    }
}
