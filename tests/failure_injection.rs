//! Failure injection tests for the outbound leg.

use std::time::Duration;

use axum::http::StatusCode;
use fetch_gateway::config::GatewayConfig;
use serde_json::json;

mod common;

#[tokio::test]
async fn test_truncated_body_is_internal_io() {
    // Promises 100 bytes, sends 10, hangs up.
    let backend = common::start_raw_backend(|| async {
        b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\n{\"partial\"".to_vec()
    })
    .await;

    let (status, body) = common::post_envelope(
        common::gateway_router(GatewayConfig::default()),
        "/api/json",
        json!({"apiUrl": format!("http://{}/", backend), "dataType": "json"}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Failed to read response from external API");
}

#[tokio::test]
async fn test_connection_closed_without_response() {
    let backend = common::start_raw_backend(|| async { Vec::new() }).await;

    let (status, body) = common::post_envelope(
        common::gateway_router(GatewayConfig::default()),
        "/api/json",
        json!({"apiUrl": format!("http://{}/", backend), "dataType": "json"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Network error while calling external API");
}

#[tokio::test]
async fn test_slow_upstream_hits_outbound_timeout() {
    let backend = common::start_raw_backend(|| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}".to_vec()
    })
    .await;

    let mut config = GatewayConfig::default();
    config.outbound.request_timeout_secs = 1;

    let started = std::time::Instant::now();
    let (status, body) = common::post_envelope(
        common::gateway_router(config),
        "/api/json",
        json!({"apiUrl": format!("http://{}/", backend), "dataType": "json"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_oversized_upstream_body_is_rejected() {
    let backend = common::start_mock_backend("200 OK", "[1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16]").await;

    let mut config = GatewayConfig::default();
    config.outbound.max_response_bytes = 8;

    let (status, body) = common::post_envelope(
        common::gateway_router(config),
        "/api/json",
        json!({"apiUrl": format!("http://{}/", backend), "dataType": "json"}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_rdf_error_midway_is_never_partial() {
    let mut document = String::new();
    for i in 0..1000 {
        document.push_str(&format!(
            "<http://e.test/s{i}> <http://e.test/p> <http://e.test/o> .\n"
        ));
    }
    document.push_str("<http://e.test/broken> <http://e.test/p> \n");
    let document: &'static str = Box::leak(document.into_boxed_str());
    let backend = common::start_raw_backend(move || async move {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/n-triples\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            document.len(),
            document
        )
        .into_bytes()
    })
    .await;

    let (status, body) = common::post_envelope(
        common::gateway_router(GatewayConfig::default()),
        "/api/rdf",
        json!({"apiUrl": format!("http://{}/", backend), "dataType": "rdf"}),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert!(body.get("data").is_none());
    assert_eq!(body["details"]["recordsBeforeError"], 1000);
    assert_eq!(body["details"]["format"], "N-Triples");
}
