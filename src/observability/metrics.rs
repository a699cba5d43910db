//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by terminal outcome and status
//! - `proxy_request_duration_seconds` (histogram): latency by outcome
//! - `proxy_bytes_saved_total` (counter): bytes saved by transformation
//!
//! # Design Decisions
//! - Outcome labels are the terminal paths: transform, bypass, fallback,
//!   invalid, error
//! - Bytes saved only counts positive savings; a transform that grew the
//!   image saves nothing

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`. Call once, from
/// main, after the runtime is up.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished request with its terminal outcome.
pub fn record_request(outcome: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

/// Record the bytes-saved outcome of a successful transform.
pub fn record_bytes_saved(saved: i64) {
    if saved > 0 {
        metrics::counter!("proxy_bytes_saved_total").increment(saved as u64);
    }
}
