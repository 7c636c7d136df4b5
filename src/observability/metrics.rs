//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): inbound requests by method, status, route
//! - `proxy_request_duration_seconds` (histogram): inbound latency
//! - `backend_calls_total` (counter): backend calls by backend, outcome, status
//! - `backend_call_duration_seconds` (histogram): backend latency
//! - `proxy_active_sessions` (gauge): live sessions
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests can call these freely.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// `route` is the matched route prefix, or `none`.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    let status = status.to_string();
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.clone(),
        "route" => route.to_string()
    )
    .increment(1);
    histogram!(
        "proxy_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status,
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_backend_call(backend: &str, status: u16, start: Instant) {
    counter!(
        "backend_calls_total",
        "backend" => backend.to_string(),
        "outcome" => "response",
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("backend_call_duration_seconds", "backend" => backend.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_backend_failure(backend: &str) {
    counter!(
        "backend_calls_total",
        "backend" => backend.to_string(),
        "outcome" => "transport_error",
        "status" => "none"
    )
    .increment(1);
}

pub fn set_active_sessions(count: usize) {
    gauge!("proxy_active_sessions").set(count as f64);
}
