//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_errors_total` (counter): normalized errors by kind, status
//! - `gateway_rate_limited_total` (counter): denied admissions
//! - `gateway_rate_limit_tracked_clients` (gauge): live RateEntry count
//! - `gateway_sanitized_keys_total` (counter): operator keys stripped
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - Prometheus exporter installed only when enabled in config

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::errors::ErrorKind;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_error(kind: ErrorKind, status: u16) {
    let kind = match kind {
        ErrorKind::Operational => "operational",
        ErrorKind::Programming => "programming",
    };
    counter!("gateway_errors_total", "kind" => kind, "status" => status.to_string()).increment(1);
}

pub fn record_rate_limited(reason: &'static str) {
    counter!("gateway_rate_limited_total", "reason" => reason).increment(1);
}

pub fn record_tracked_clients(count: usize) {
    gauge!("gateway_rate_limit_tracked_clients").set(count as f64);
}

pub fn record_sanitized_keys(count: usize) {
    counter!("gateway_sanitized_keys_total").increment(count as u64);
}
