//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bff_upstream_requests_total` (counter): upstream calls by endpoint, status
//! - `bff_upstream_request_duration_seconds` (histogram): upstream latency by endpoint
//! - `bff_session_rotations_total` (counter): identity/basket rotations by endpoint
//! - `bff_guard_rejections_total` (counter): requests refused before the upstream call
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Transport failures use the status label `error`

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Starts the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

/// Records a completed upstream call.
pub fn record_upstream(endpoint: &'static str, status: u16, started: Instant) {
    counter!("bff_upstream_requests_total", "endpoint" => endpoint, "status" => status.to_string())
        .increment(1);
    histogram!("bff_upstream_request_duration_seconds", "endpoint" => endpoint)
        .record(started.elapsed().as_secs_f64());
}

/// Records an upstream call that never produced a response.
pub fn record_upstream_failure(endpoint: &'static str, started: Instant) {
    counter!("bff_upstream_requests_total", "endpoint" => endpoint, "status" => "error")
        .increment(1);
    histogram!("bff_upstream_request_duration_seconds", "endpoint" => endpoint)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_rotation(endpoint: &'static str) {
    counter!("bff_session_rotations_total", "endpoint" => endpoint).increment(1);
}

pub fn record_guard_rejection(endpoint: &'static str) {
    counter!("bff_guard_rejections_total", "endpoint" => endpoint).increment(1);
}
