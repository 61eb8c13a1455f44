//! Inbound request helpers.
//!
//! # Design Decisions
//! - The request id is assigned by middleware before any handler runs
//! - Handlers read it back from the headers to scope their logger

use axum::http::{HeaderMap, HeaderName};
use uuid::Uuid;

/// Header carrying the correlation id.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The request id set by the middleware, or a fresh one when the handler
/// runs without it.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_id_lookup() {
        let mut headers = HeaderMap::new();
        assert!(Uuid::parse_str(&request_id(&headers)).is_ok());
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc-123"));
        assert_eq!(request_id(&headers), "abc-123");
    }
}
