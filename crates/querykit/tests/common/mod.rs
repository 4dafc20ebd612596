//! Common test utilities and helpers

use querykit::retry::FixedBackoff;
use querykit::{QueryExecutor, RetryPolicy};
use std::path::Path;
use std::time::Duration;
use wiremock::MockServer;

/// Load a response fixture
#[allow(dead_code)]
pub fn load_response_fixture(name: &str) -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let path = Path::new(manifest_dir)
        .join("tests")
        .join("fixtures")
        .join("responses")
        .join(format!("{}.json", name));

    std::fs::read_to_string(&path).unwrap_or_else(|e| {
        panic!(
            "Failed to load response fixture '{}' from {:?}: {}",
            name, path, e
        )
    })
}

/// Create a test bearer token
#[allow(dead_code)]
pub fn test_token() -> String {
    "qk-test-token-0123456789abcdef".to_string()
}

/// A policy with short fixed delays so real-time tests stay fast
#[allow(dead_code)]
pub fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(max_retries)
        .per_attempt_timeout(Duration::from_secs(2))
        .backoff(FixedBackoff::new(Duration::from_millis(10)))
        .build()
}

/// An executor pointed at the mock server
#[allow(dead_code)]
pub fn executor_for(server: &MockServer) -> QueryExecutor {
    QueryExecutor::builder()
        .base_url(format!("{}/api/", server.uri()))
        .bearer_token(test_token())
        .accept_language("en-GB")
        .retry_policy(fast_policy(2))
        .build()
        .expect("Failed to build executor")
}
