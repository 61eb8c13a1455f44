//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by format, status, outcome
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency by format
//! - `gateway_upstream_duration_seconds` (histogram): outbound call latency by format
//! - `gateway_failures_total` (counter): failed requests by format and error kind
//!
//! Recording is a no-op until [`init_metrics`] installs the Prometheus recorder.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished inbound request.
pub fn record_request(format: &'static str, status: u16, success: bool, start: Instant) {
    let outcome = if success { "success" } else { "failure" };
    counter!(
        "gateway_requests_total",
        "format" => format,
        "status" => status.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "format" => format)
        .record(start.elapsed().as_secs_f64());
}

/// Record a failed request by error kind.
pub fn record_failure(format: &'static str, kind: &'static str) {
    counter!("gateway_failures_total", "format" => format, "kind" => kind).increment(1);
}

/// Record how long the outbound call took.
pub fn record_upstream_latency(format: &'static str, start: Instant) {
    histogram!("gateway_upstream_duration_seconds", "format" => format)
        .record(start.elapsed().as_secs_f64());
}
