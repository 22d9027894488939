//! Test assertions for responses.

use crate::environment::Environment;
use crate::errors::{ErrorKind, SitemapResult};

/// Asserts the response body text.
pub fn assert_body(env: &Environment, expected: &str) {
    let response = env.response_snapshot();
    assert_eq!(
        response.body_text(),
        expected,
        "Unexpected response body (status {})",
        response.status_code()
    );
}

/// Asserts the response status code.
pub fn assert_status(env: &Environment, expected: u16) {
    let status = env.response_snapshot().status_code();
    assert_eq!(status, expected, "Expected status {expected}, got {status}");
}

/// Asserts that the response is a redirect to `location`.
pub fn assert_redirect(env: &Environment, location: &str) {
    let response = env.response_snapshot();
    assert!(
        response.is_redirect(),
        "Expected a redirect, got status {}",
        response.status_code()
    );
    assert_eq!(response.location.as_deref(), Some(location));
}

/// Asserts that a result failed with an error of `kind`.
pub fn assert_error_kind<T: std::fmt::Debug>(result: &SitemapResult<T>, kind: ErrorKind) {
    match result {
        Err(error) => assert_eq!(error.kind(), kind, "Unexpected error: {error}"),
        Ok(value) => panic!("Expected a {} error, got Ok({value:?})", kind.as_str()),
    }
}
