//! Exhaustive pagination over skip/limit collections
//!
//! [`PaginatedFetcher`] calls a one-page requester repeatedly, advancing
//! `skip` by a constant `limit`, until the server reports that the
//! collection is exhausted. Every page must echo the requested `skip` and
//! `limit`; a server that caps the page size is rejected rather than
//! leaving gaps between pages. The first failing page aborts the whole fetch:
//! no partial collection is ever returned, since it could be mistaken for a
//! complete one.
//!
//! # Wire format
//!
//! Pages are expected in this shape (camelCase):
//!
//! ```json
//! { "data": [...], "skip": 0, "limit": 200, "count": 457, "isCountPartial": false }
//! ```

use querykit_transport::HttpRequest;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::num::NonZeroU32;
use thiserror::Error;
use tracing::debug;

/// The window requested for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    /// Number of items to skip
    pub skip: u64,
    /// Maximum number of items in the page
    pub limit: NonZeroU32,
}

impl PageRequest {
    /// The first page of size `limit`.
    pub fn first(limit: NonZeroU32) -> Self {
        Self { skip: 0, limit }
    }

    /// The page following this one.
    pub fn next(self) -> Self {
        Self {
            skip: self.skip.saturating_add(u64::from(self.limit.get())),
            limit: self.limit,
        }
    }

    /// Copy `request` with `skip` and `limit` query parameters set to this
    /// window, replacing any already present.
    pub fn apply_to(&self, request: &HttpRequest) -> HttpRequest {
        let mut request = request.clone();
        let retained: Vec<(String, String)> = request
            .url
            .query_pairs()
            .filter(|(key, _)| key != "skip" && key != "limit")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        request
            .url
            .query_pairs_mut()
            .clear()
            .extend_pairs(retained)
            .append_pair("skip", &self.skip.to_string())
            .append_pair("limit", &self.limit.to_string());
        request
    }
}

/// One page of a server-driven collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResponse<A> {
    /// Items in this page
    pub data: Vec<A>,
    /// Offset of the first item
    pub skip: u64,
    /// Page size the server applied
    pub limit: u32,
    /// Best-known total; exact unless `is_count_partial`
    pub count: u64,
    /// The server has not finished counting
    #[serde(default)]
    pub is_count_partial: bool,
}

impl<A> PagedResponse<A> {
    /// Whether another page should be requested after this one.
    pub fn has_more(&self) -> bool {
        self.is_count_partial || self.skip.saturating_add(u64::from(self.limit)) < self.count
    }
}

/// Why a full fetch produced no collection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchAllError<E> {
    /// A page request failed.
    #[error("page {page} failed: {error}")]
    Page {
        /// 0-indexed page number
        page: u32,
        /// The requester's error
        error: E,
    },

    /// The configured page ceiling was reached while the server still
    /// reported more data.
    #[error("stopped after {max_pages} pages while the server still reported more data")]
    PageLimitExceeded {
        /// The configured ceiling
        max_pages: u32,
    },

    /// The server returned more items than requested.
    #[error("page {page} returned {len} items, more than the limit of {limit}")]
    OversizedPage {
        /// 0-indexed page number
        page: u32,
        /// Items received
        len: usize,
        /// Items requested
        limit: u32,
    },

    /// The server answered for a different window than the one requested,
    /// typically because it capped the page size.
    #[error(
        "page {page} requested skip={} limit={} but the server reported skip={reported_skip} limit={reported_limit}",
        .requested.skip,
        .requested.limit
    )]
    WindowMismatch {
        /// 0-indexed page number
        page: u32,
        /// The window that was requested
        requested: PageRequest,
        /// `skip` echoed by the server
        reported_skip: u64,
        /// `limit` echoed by the server
        reported_limit: u32,
    },
}

impl<E> FetchAllError<E> {
    /// The requester's error, if a page request failed.
    pub fn page_error(&self) -> Option<&E> {
        match self {
            FetchAllError::Page { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Drives page requests to exhaustion.
///
/// # Examples
///
/// ```rust
/// use querykit::pagination::{PageRequest, PagedResponse, PaginatedFetcher};
/// use std::num::NonZeroU32;
///
/// # async fn example() {
/// let fetcher = PaginatedFetcher::new(NonZeroU32::new(2).unwrap());
/// let items = fetcher
///     .fetch_all(|page: PageRequest| async move {
///         let all = [1, 2, 3, 4, 5];
///         let start = page.skip as usize;
///         let end = (start + page.limit.get() as usize).min(all.len());
///         Ok::<_, String>(PagedResponse {
///             data: all[start..end].to_vec(),
///             skip: page.skip,
///             limit: page.limit.get(),
///             count: all.len() as u64,
///             is_count_partial: false,
///         })
///     })
///     .await
///     .unwrap();
/// assert_eq!(items, vec![1, 2, 3, 4, 5]);
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginatedFetcher {
    page_size: NonZeroU32,
    max_pages: Option<u32>,
}

impl PaginatedFetcher {
    /// Fetch pages of `page_size` items with no page ceiling.
    pub fn new(page_size: NonZeroU32) -> Self {
        Self {
            page_size,
            max_pages: None,
        }
    }

    /// Give up with [`FetchAllError::PageLimitExceeded`] instead of
    /// requesting more than `max_pages` pages.
    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// The constant page size.
    pub fn page_size(&self) -> NonZeroU32 {
        self.page_size
    }

    /// Request pages until the collection is exhausted or a page fails.
    pub async fn fetch_all<A, E, F, Fut>(&self, mut requester: F) -> Result<Vec<A>, FetchAllError<E>>
    where
        F: FnMut(PageRequest) -> Fut,
        Fut: Future<Output = Result<PagedResponse<A>, E>>,
    {
        let mut items = Vec::new();
        let mut request = PageRequest::first(self.page_size);
        let mut page: u32 = 0;

        loop {
            if let Some(max_pages) = self.max_pages
                && page >= max_pages
            {
                return Err(FetchAllError::PageLimitExceeded { max_pages });
            }

            let response = requester(request)
                .await
                .map_err(|error| FetchAllError::Page { page, error })?;

            let limit = request.limit.get();
            if response.data.len() > limit as usize {
                return Err(FetchAllError::OversizedPage {
                    page,
                    len: response.data.len(),
                    limit,
                });
            }
            if response.skip != request.skip || response.limit != limit {
                return Err(FetchAllError::WindowMismatch {
                    page,
                    requested: request,
                    reported_skip: response.skip,
                    reported_limit: response.limit,
                });
            }

            let more = response.has_more();
            debug!(
                page,
                skip = request.skip,
                received = response.data.len(),
                count = response.count,
                partial = response.is_count_partial,
                more,
                "Fetched page"
            );

            items.extend(response.data);
            if !more {
                return Ok(items);
            }

            request = request.next();
            page += 1;
        }
    }
}

/// Fetch every page with no page ceiling.
///
/// Shorthand for `PaginatedFetcher::new(page_size).fetch_all(requester)`.
pub async fn fetch_all<A, E, F, Fut>(
    requester: F,
    page_size: NonZeroU32,
) -> Result<Vec<A>, FetchAllError<E>>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<PagedResponse<A>, E>>,
{
    PaginatedFetcher::new(page_size).fetch_all(requester).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use http::Method;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn size(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    /// Serves `total` sequential integers, recording every requested skip.
    struct Collection {
        total: u64,
        calls: Mutex<Vec<u64>>,
    }

    impl Collection {
        fn new(total: u64) -> Self {
            Self {
                total,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn page(&self, page: PageRequest) -> PagedResponse<u64> {
            self.calls.lock().unwrap().push(page.skip);
            let end = (page.skip + u64::from(page.limit.get())).min(self.total);
            PagedResponse {
                data: (page.skip..end).collect(),
                skip: page.skip,
                limit: page.limit.get(),
                count: self.total,
                is_count_partial: false,
            }
        }

        fn skips(&self) -> Vec<u64> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn test_three_pages_of_457() {
        let collection = Collection::new(457);

        let items = fetch_all(
            |page| {
                let response = collection.page(page);
                async move { Ok::<_, String>(response) }
            },
            size(200),
        )
        .await
        .unwrap();

        assert_eq!(items.len(), 457);
        assert_eq!(items, (0..457).collect::<Vec<_>>());
        assert_eq!(collection.skips(), vec![0, 200, 400]);
    }

    #[tokio::test]
    async fn test_exact_multiple_stops_without_empty_page() {
        let collection = Collection::new(400);

        let items = fetch_all(
            |page| {
                let response = collection.page(page);
                async move { Ok::<_, String>(response) }
            },
            size(200),
        )
        .await
        .unwrap();

        assert_eq!(items.len(), 400);
        assert_eq!(collection.skips(), vec![0, 200]);
    }

    #[tokio::test]
    async fn test_empty_collection_single_call() {
        let collection = Collection::new(0);

        let items = fetch_all(
            |page| {
                let response = collection.page(page);
                async move { Ok::<_, String>(response) }
            },
            size(50),
        )
        .await
        .unwrap();

        assert!(items.is_empty());
        assert_eq!(collection.skips(), vec![0]);
    }

    #[tokio::test]
    async fn test_failure_on_second_page_stops() {
        let collection = Collection::new(1_000);

        let result = fetch_all(
            |page| {
                let response = collection.page(page);
                async move {
                    if page.skip == 100 {
                        Err("server exploded".to_string())
                    } else {
                        Ok(response)
                    }
                }
            },
            size(100),
        )
        .await;

        assert_matches!(
            result,
            Err(FetchAllError::Page { page: 1, ref error }) if error == "server exploded"
        );
        assert_eq!(collection.skips(), vec![0, 100]);
    }

    #[tokio::test]
    async fn test_partial_count_keeps_going_until_resolved() {
        let calls = Mutex::new(0u32);

        let items = fetch_all(
            |page: PageRequest| {
                let n = {
                    let mut calls = calls.lock().unwrap();
                    *calls += 1;
                    *calls
                };
                async move {
                    // The server claims a total of 1 until the third page,
                    // where the count becomes exact.
                    let partial = n < 3;
                    Ok::<_, String>(PagedResponse {
                        data: vec![page.skip; page.limit.get() as usize],
                        skip: page.skip,
                        limit: page.limit.get(),
                        count: if partial { 1 } else { 30 },
                        is_count_partial: partial,
                    })
                }
            },
            size(10),
        )
        .await
        .unwrap();

        assert_eq!(*calls.lock().unwrap(), 3);
        assert_eq!(items.len(), 30);
    }

    #[tokio::test]
    async fn test_max_pages_stops_always_partial_server() {
        let fetcher = PaginatedFetcher::new(size(5)).max_pages(4);
        let calls = Mutex::new(0u32);

        let result = fetcher
            .fetch_all(|page: PageRequest| {
                *calls.lock().unwrap() += 1;
                async move {
                    Ok::<_, String>(PagedResponse {
                        data: vec![0u8; 5],
                        skip: page.skip,
                        limit: page.limit.get(),
                        count: 0,
                        is_count_partial: true,
                    })
                }
            })
            .await;

        assert_eq!(result, Err(FetchAllError::PageLimitExceeded { max_pages: 4 }));
        assert_eq!(*calls.lock().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_max_pages_not_hit_when_collection_fits() {
        let collection = Collection::new(15);
        let fetcher = PaginatedFetcher::new(size(5)).max_pages(3);

        let items = fetcher
            .fetch_all(|page| {
                let response = collection.page(page);
                async move { Ok::<_, String>(response) }
            })
            .await
            .unwrap();

        assert_eq!(items.len(), 15);
    }

    #[tokio::test]
    async fn test_oversized_page_rejected() {
        let result = fetch_all(
            |page: PageRequest| async move {
                Ok::<_, String>(PagedResponse {
                    data: vec![1u8; 11],
                    skip: page.skip,
                    limit: 11,
                    count: 11,
                    is_count_partial: false,
                })
            },
            size(10),
        )
        .await;

        assert_eq!(
            result,
            Err(FetchAllError::OversizedPage {
                page: 0,
                len: 11,
                limit: 10
            })
        );
    }

    #[tokio::test]
    async fn test_capped_page_size_rejected() {
        let calls = Mutex::new(0u32);

        // Asked for 200, the server only ever hands out 100.
        let result = fetch_all(
            |page: PageRequest| {
                *calls.lock().unwrap() += 1;
                async move {
                    let end = (page.skip + 100).min(300);
                    Ok::<_, String>(PagedResponse {
                        data: (page.skip..end).collect::<Vec<u64>>(),
                        skip: page.skip,
                        limit: 100,
                        count: 300,
                        is_count_partial: false,
                    })
                }
            },
            size(200),
        )
        .await;

        assert_eq!(
            result,
            Err(FetchAllError::WindowMismatch {
                page: 0,
                requested: PageRequest::first(size(200)),
                reported_skip: 0,
                reported_limit: 100,
            })
        );
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_shifted_skip_rejected() {
        let collection = Collection::new(30);

        let result = fetch_all(
            |page: PageRequest| {
                let mut response = collection.page(page);
                if page.skip == 10 {
                    response.skip = 5;
                }
                async move { Ok::<_, String>(response) }
            },
            size(10),
        )
        .await;

        assert_matches!(
            result,
            Err(FetchAllError::WindowMismatch { page: 1, reported_skip: 5, reported_limit: 10, .. })
        );
        assert_eq!(collection.skips(), vec![0, 10]);
    }

    #[test]
    fn test_page_request_progression() {
        let first = PageRequest::first(size(200));
        assert_eq!(first.skip, 0);
        assert_eq!(first.next().skip, 200);
        assert_eq!(first.next().next().skip, 400);
        assert_eq!(first.next().limit, size(200));
    }

    #[test]
    fn test_apply_to_replaces_existing_window() {
        let request =
            HttpRequest::parse(Method::GET, "https://api.example.com/items?skip=9&q=red&limit=1")
                .unwrap();

        let paged = PageRequest { skip: 40, limit: size(20) }.apply_to(&request);
        assert_eq!(
            paged.url.as_str(),
            "https://api.example.com/items?q=red&skip=40&limit=20"
        );
    }

    #[test]
    fn test_paged_response_wire_format() {
        let page: PagedResponse<String> = serde_json::from_str(
            r#"{"data":["a","b"],"skip":0,"limit":2,"count":5,"isCountPartial":true}"#,
        )
        .unwrap();
        assert!(page.is_count_partial);
        assert!(page.has_more());

        // isCountPartial defaults to false
        let page: PagedResponse<String> =
            serde_json::from_str(r#"{"data":[],"skip":4,"limit":2,"count":5}"#).unwrap();
        assert!(!page.is_count_partial);
        assert!(!page.has_more());
    }
}
