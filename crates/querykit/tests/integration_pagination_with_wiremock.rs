//! Integration tests for paginated fetching over HTTP using wiremock

mod common;

use querykit::{AsyncResult, CancellationToken, FetchAllError, PaginatedFetcher};
use serde::Deserialize;
use serde_json::json;
use std::num::NonZeroU32;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Item {
    id: u64,
}

fn page_body(skip: u64, len: u64, limit: u64, count: u64, partial: bool) -> serde_json::Value {
    let data: Vec<_> = (skip..skip + len).map(|id| json!({ "id": id })).collect();
    json!({
        "data": data,
        "skip": skip,
        "limit": limit,
        "count": count,
        "isCountPartial": partial,
    })
}

async fn mount_page(server: &MockServer, skip: u64, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/items"))
        .and(query_param("skip", skip.to_string().as_str()))
        .and(query_param("limit", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_all_457_items() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 0, page_body(0, 200, 200, 457, false)).await;
    mount_page(&mock_server, 200, page_body(200, 200, 200, 457, false)).await;
    mount_page(&mock_server, 400, page_body(400, 57, 200, 457, false)).await;

    let executor = common::executor_for(&mock_server);
    let result = executor
        .fetch_all::<Item>(
            executor.get("items").unwrap(),
            NonZeroU32::new(200).unwrap(),
            executor.policy(),
            &CancellationToken::new(),
        )
        .await;

    let items = result.unwrap().to_option().expect("expected success");
    assert_eq!(items.len(), 457);
    assert_eq!(items.first(), Some(&Item { id: 0 }));
    assert_eq!(items.last(), Some(&Item { id: 456 }));

    mock_server.verify().await;
}

#[tokio::test]
async fn test_partial_count_fetches_until_exact() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 0, page_body(0, 200, 200, 200, true)).await;
    mount_page(&mock_server, 200, page_body(200, 10, 200, 210, false)).await;

    let executor = common::executor_for(&mock_server);
    let result = executor
        .fetch_all::<Item>(
            executor.get("items").unwrap(),
            NonZeroU32::new(200).unwrap(),
            executor.policy(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.unwrap().to_option().map(|items| items.len()), Some(210));
    mock_server.verify().await;
}

#[tokio::test]
async fn test_failed_page_returns_no_partial_data() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 0, page_body(0, 200, 200, 600, false)).await;

    Mock::given(method("GET"))
        .and(path("/api/items"))
        .and(query_param("skip", "200"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "detail": "skip out of range" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/items"))
        .and(query_param("skip", "400"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(400, 200, 200, 600, false)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let executor = common::executor_for(&mock_server);
    let result = executor
        .fetch_all::<Item>(
            executor.get("items").unwrap(),
            NonZeroU32::new(200).unwrap(),
            executor.policy(),
            &CancellationToken::new(),
        )
        .await;

    match result {
        Some(AsyncResult::Failure(FetchAllError::Page { page, error })) => {
            assert_eq!(page, 1);
            assert_eq!(error.message(), "skip out of range");
        }
        other => panic!("expected page failure, got {other:?}"),
    }

    mock_server.verify().await;
}

#[tokio::test]
async fn test_page_ceiling() {
    let mock_server = MockServer::start().await;

    for skip in [0, 200, 400] {
        mount_page(&mock_server, skip, page_body(skip, 200, 200, 0, true)).await;
    }

    let executor = common::executor_for(&mock_server);
    let fetcher = PaginatedFetcher::new(NonZeroU32::new(200).unwrap()).max_pages(3);
    let result = executor
        .fetch_pages::<Item>(
            executor.get("items").unwrap(),
            fetcher,
            executor.policy(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(
        result,
        Some(AsyncResult::Failure(FetchAllError::PageLimitExceeded { max_pages: 3 }))
    );
    mock_server.verify().await;
}

#[tokio::test]
async fn test_server_capping_page_size_is_rejected() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 0, page_body(0, 100, 100, 300, false)).await;

    Mock::given(method("GET"))
        .and(path("/api/items"))
        .and(query_param("skip", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(200, 100, 100, 300, false)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let executor = common::executor_for(&mock_server);
    let result = executor
        .fetch_all::<Item>(
            executor.get("items").unwrap(),
            NonZeroU32::new(200).unwrap(),
            executor.policy(),
            &CancellationToken::new(),
        )
        .await;

    match result {
        Some(AsyncResult::Failure(FetchAllError::WindowMismatch {
            page,
            requested,
            reported_limit,
            ..
        })) => {
            assert_eq!(page, 0);
            assert_eq!(requested.limit.get(), 200);
            assert_eq!(reported_limit, 100);
        }
        other => panic!("expected window mismatch, got {other:?}"),
    }

    mock_server.verify().await;
}
