//! The retrying query executor
//!
//! [`QueryExecutor::execute`] runs one logical query as a small state
//! machine:
//!
//! ```text
//! Attempting(n) ──success──────────────────────────▶ Done(Success)
//!      │  └────terminal error or retries exhausted──▶ Done(Failure)
//!      └─retryable error──▶ Waiting(n, delay) ──▶ Attempting(n + 1)
//! ```
//!
//! Cancellation is observed before every attempt, raced against the
//! in-flight attempt, and raced against the backoff sleep. A cancelled
//! execution never reaches `Done`.

use crate::config::ExecutorConfig;
use crate::decode::{Decoder, JsonDecoder};
use crate::enrich::{HeaderEnricher, StaticEnricher};
use crate::error::{ClassifiedError, Error, Result};
use crate::handle::QueryHandle;
use crate::observability::{AttemptMetadata, RequestTimer, log_cancelled, log_failure, log_success};
use crate::pagination::{FetchAllError, PageRequest, PagedResponse, PaginatedFetcher};
use crate::policy::RetryPolicy;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use querykit_core::AsyncResult;
use querykit_transport::{HttpRequest, HttpTransport, Transport, TransportError};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Executes queries with classification, retries and cancellation.
///
/// Cloning is cheap; clones share the transport and configuration but no
/// per-execution state.
///
/// # Example
///
/// ```rust,no_run
/// use querykit::{AsyncResult, JsonDecoder, QueryExecutor};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let executor = QueryExecutor::builder()
///     .base_url("https://api.example.com/v1/")
///     .max_retries(3)
///     .build()?;
///
/// let request = executor.get("orders/42")?;
/// let outcome = executor
///     .execute(request, &JsonDecoder::<serde_json::Value>::new(), executor.policy(), &CancellationToken::new())
///     .await;
///
/// if let Some(AsyncResult::Success(order)) = outcome {
///     println!("{order}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct QueryExecutor {
    inner: Arc<ExecutorInner>,
}

struct ExecutorInner {
    transport: Arc<dyn Transport>,
    enricher: Arc<dyn HeaderEnricher>,
    base_url: Option<Url>,
    default_headers: HeaderMap,
    policy: RetryPolicy,
}

enum State<A> {
    Attempting {
        attempt: u32,
    },
    Waiting {
        attempt: u32,
        delay: Duration,
    },
    Done {
        attempts: u32,
        result: std::result::Result<A, ClassifiedError>,
    },
}

impl QueryExecutor {
    /// Create a new executor builder.
    pub fn builder() -> QueryExecutorBuilder {
        QueryExecutorBuilder::default()
    }

    /// Create an executor from a configuration object, using the reqwest
    /// transport.
    pub fn from_config(config: ExecutorConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Create an executor from environment variables.
    ///
    /// See [`ExecutorConfig::from_env`].
    #[cfg(feature = "env")]
    #[cfg_attr(docsrs, doc(cfg(feature = "env")))]
    pub fn from_env() -> Result<Self> {
        Self::from_config(ExecutorConfig::from_env()?)
    }

    /// The policy configured at construction.
    pub fn policy(&self) -> &RetryPolicy {
        &self.inner.policy
    }

    /// The base URL relative paths are resolved against.
    pub fn base_url(&self) -> Option<&Url> {
        self.inner.base_url.as_ref()
    }

    /// Resolve `path` against the base URL.
    ///
    /// Absolute URLs are returned unchanged. Relative paths follow RFC 3986
    /// joining, so `"items"` extends a base ending in `/` while `"/items"`
    /// replaces its path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] for a malformed URL, or for a relative
    /// path when no base URL is configured.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        match Url::parse(path) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.inner.base_url.as_ref().ok_or_else(|| {
                    Error::InvalidUrl(format!("relative path {path:?} with no base URL configured"))
                })?;
                Ok(base.join(path)?)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Build a request for `path`.
    pub fn request(&self, method: Method, path: &str) -> Result<HttpRequest> {
        Ok(HttpRequest::new(method, self.resolve(path)?))
    }

    /// Build a `GET` request for `path`.
    pub fn get(&self, path: &str) -> Result<HttpRequest> {
        self.request(Method::GET, path)
    }

    /// Run one logical query to completion.
    ///
    /// Returns the terminal state, [`AsyncResult::Success`] or
    /// [`AsyncResult::Failure`], or `None` if `cancel` fired first.
    #[tracing::instrument(skip_all, fields(method = %request.method, path = %request.url.path()))]
    pub async fn execute<A, D>(
        &self,
        request: HttpRequest,
        decoder: &D,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Option<AsyncResult<ClassifiedError, A>>
    where
        D: Decoder<A> + ?Sized,
    {
        let timer = RequestTimer::start();
        let method = request.method.as_str();
        let path = request.url.path();
        let mut state = State::Attempting { attempt: 0 };

        loop {
            state = match state {
                State::Attempting { attempt } => {
                    if cancel.is_cancelled() {
                        log_cancelled(method, path, attempt);
                        return None;
                    }

                    let metadata = AttemptMetadata::new(&request, attempt);
                    match self.attempt(&request, decoder, policy, cancel, &metadata).await {
                        None => {
                            log_cancelled(method, path, attempt + 1);
                            return None;
                        }
                        Some(Ok(value)) => State::Done {
                            attempts: attempt + 1,
                            result: Ok(value),
                        },
                        Some(Err(error)) if policy.should_retry(&error) && attempt < policy.max_retries() => {
                            let delay = policy.delay_for(attempt, &error);
                            metadata.log_retry(&error, delay);
                            State::Waiting { attempt, delay }
                        }
                        Some(Err(error)) => State::Done {
                            attempts: attempt + 1,
                            result: Err(error),
                        },
                    }
                }

                State::Waiting { attempt, delay } => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            log_cancelled(method, path, attempt + 1);
                            return None;
                        }
                        _ = tokio::time::sleep(delay) => State::Attempting { attempt: attempt + 1 },
                    }
                }

                State::Done { attempts, result } => {
                    let elapsed = timer.elapsed();
                    return Some(match result {
                        Ok(value) => {
                            log_success(method, path, attempts, elapsed);
                            AsyncResult::Success(value)
                        }
                        Err(error) => {
                            let exhausted = policy.should_retry(&error);
                            log_failure(method, path, attempts, elapsed, &error, exhausted);
                            AsyncResult::Failure(error)
                        }
                    });
                }
            };
        }
    }

    /// One exchange. `None` means cancelled.
    async fn attempt<A, D>(
        &self,
        request: &HttpRequest,
        decoder: &D,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
        metadata: &AttemptMetadata,
    ) -> Option<std::result::Result<A, ClassifiedError>>
    where
        D: Decoder<A> + ?Sized,
    {
        let mut outgoing = request.clone();
        let mut headers = self.inner.default_headers.clone();
        headers.extend(std::mem::take(&mut outgoing.headers));
        outgoing.headers = self.inner.enricher.enrich(headers);

        metadata.log_start();
        let timeout = policy.per_attempt_timeout();
        let timer = RequestTimer::start();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            outcome = tokio::time::timeout(timeout, self.inner.transport.send(outgoing, timeout, cancel)) => outcome,
        };

        let response = match outcome {
            Err(_) => {
                return Some(Err(ClassifiedError::from_transport(&TransportError::Timeout(timeout))));
            }
            Ok(Err(TransportError::Cancelled)) if cancel.is_cancelled() => return None,
            Ok(Err(err)) => return Some(Err(ClassifiedError::from_transport(&err))),
            Ok(Ok(response)) => response,
        };

        metadata.log_response(response.status, response.body.len(), timer.elapsed());

        if response.is_success() {
            Some(decoder.decode(&response.body).map_err(ClassifiedError::from_decode))
        } else {
            Some(Err(ClassifiedError::from_response(&response)))
        }
    }

    /// Run `request` on a tokio task.
    pub fn spawn<A, D>(&self, request: HttpRequest, decoder: D, policy: RetryPolicy) -> QueryHandle<ClassifiedError, A>
    where
        A: Clone + Send + Sync + 'static,
        D: Decoder<A> + 'static,
    {
        self.spawn_with_cancel(request, decoder, policy, CancellationToken::new())
    }

    /// Run `request` on a tokio task observing `cancel`, for example a
    /// [`QueryGroup`](crate::QueryGroup) child token.
    pub fn spawn_with_cancel<A, D>(
        &self,
        request: HttpRequest,
        decoder: D,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> QueryHandle<ClassifiedError, A>
    where
        A: Clone + Send + Sync + 'static,
        D: Decoder<A> + 'static,
    {
        let executor = self.clone();
        QueryHandle::spawn(cancel, move |cancel| async move {
            executor.execute(request, &decoder, &policy, &cancel).await
        })
    }

    /// Fetch every page of a skip/limit collection.
    ///
    /// Each page is a full execution of `request` with `skip` and `limit`
    /// query parameters set, decoded as a JSON [`PagedResponse`].
    pub async fn fetch_all<A>(
        &self,
        request: HttpRequest,
        page_size: NonZeroU32,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Option<AsyncResult<FetchAllError<ClassifiedError>, Vec<A>>>
    where
        A: DeserializeOwned + Send,
    {
        self.fetch_pages(request, PaginatedFetcher::new(page_size), policy, cancel)
            .await
    }

    /// Like [`fetch_all`](Self::fetch_all) with a configured fetcher.
    pub async fn fetch_pages<A>(
        &self,
        request: HttpRequest,
        fetcher: PaginatedFetcher,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Option<AsyncResult<FetchAllError<ClassifiedError>, Vec<A>>>
    where
        A: DeserializeOwned + Send,
    {
        let decoder = JsonDecoder::<PagedResponse<A>>::new();
        let decoder = &decoder;

        let pages = fetcher.fetch_all(|page: PageRequest| {
            let paged = page.apply_to(&request);
            async move {
                match self.execute(paged, decoder, policy, cancel).await {
                    Some(AsyncResult::Success(page)) => Ok(page),
                    Some(AsyncResult::Failure(error)) => Err(error),
                    // Cancelled: the select below resolves first.
                    _ => std::future::pending().await,
                }
            }
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = pages => Some(AsyncResult::from(result)),
        }
    }

    /// Run [`fetch_all`](Self::fetch_all) on a tokio task.
    pub fn spawn_fetch_all<A>(
        &self,
        request: HttpRequest,
        page_size: NonZeroU32,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> QueryHandle<FetchAllError<ClassifiedError>, Vec<A>>
    where
        A: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let executor = self.clone();
        QueryHandle::spawn(cancel, move |cancel| async move {
            executor.fetch_all(request, page_size, &policy, &cancel).await
        })
    }
}

impl fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("base_url", &self.inner.base_url.as_ref().map(Url::as_str))
            .field("default_headers", &self.inner.default_headers.len())
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

/// Builder for creating a configured [`QueryExecutor`].
#[derive(Default)]
pub struct QueryExecutorBuilder {
    config: ExecutorConfig,
    base_url: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    enricher: Option<Arc<dyn HeaderEnricher>>,
    policy: Option<RetryPolicy>,
}

impl QueryExecutorBuilder {
    /// Start from an existing configuration.
    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the base URL relative paths are resolved against.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the per-attempt timeout.
    pub fn per_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.config.per_attempt_timeout = timeout;
        self
    }

    /// Set the maximum number of retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Add a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, key: &str, value: &str) -> Result<Self> {
        let name: HeaderName = key
            .parse()
            .map_err(|_| Error::InvalidHeader(format!("invalid header name {key:?}")))?;
        let value: HeaderValue = value
            .parse()
            .map_err(|_| Error::InvalidHeader(format!("invalid value for {key}")))?;

        self.config.default_headers.insert(name, value);
        Ok(self)
    }

    /// Send `Authorization: Bearer <token>` on every attempt.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.config.bearer_token = Some(SecretString::new(token.into().into_boxed_str()));
        self
    }

    /// Send `Accept-Language` on every attempt.
    pub fn accept_language(mut self, language: impl Into<String>) -> Self {
        self.config.accept_language = Some(language.into());
        self
    }

    /// Use a custom transport instead of reqwest.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Use a custom enricher. Replaces the bearer token and
    /// `Accept-Language` settings.
    pub fn enricher(mut self, enricher: impl HeaderEnricher + 'static) -> Self {
        self.enricher = Some(Arc::new(enricher));
        self
    }

    /// Use a fully custom retry policy. Replaces the timeout, retry count and
    /// backoff settings.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Build the executor.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or a header is invalid, or if the
    /// HTTP client cannot be constructed.
    pub fn build(self) -> Result<QueryExecutor> {
        let mut config = self.config;
        if let Some(base_url) = self.base_url {
            config.base_url = Some(Url::parse(&base_url)?);
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::with_config(config.transport.clone())?),
        };

        let enricher: Arc<dyn HeaderEnricher> = match self.enricher {
            Some(enricher) => enricher,
            None => Arc::new(static_enricher(&config)?),
        };

        let policy = self.policy.unwrap_or_else(|| config.retry_policy());

        Ok(QueryExecutor {
            inner: Arc::new(ExecutorInner {
                transport,
                enricher,
                base_url: config.base_url,
                default_headers: config.default_headers,
                policy,
            }),
        })
    }
}

fn static_enricher(config: &ExecutorConfig) -> Result<StaticEnricher> {
    let mut enricher = StaticEnricher::new();
    if let Some(token) = &config.bearer_token {
        enricher = enricher.bearer_token(token)?;
    }
    if let Some(language) = &config.accept_language {
        enricher = enricher.accept_language(language)?;
    }
    Ok(enricher)
}
