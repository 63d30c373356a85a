//! Metrics collection and exposition.
//!
//! # Metrics
//! - `override_proxy_requests_total` (counter): requests by method, status, served_by
//! - `override_proxy_request_duration_seconds` (histogram): latency by served_by
//! - `override_proxy_rules` (gauge): rules in the active registry
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Exporter is opt-in via `observability.metrics_enabled`

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::dispatch::ServedBy;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one completed request.
pub fn record_request(method: &str, status: u16, served_by: ServedBy, start: Instant) {
    metrics::counter!(
        "override_proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "served_by" => served_by.as_str()
    )
    .increment(1);

    metrics::histogram!(
        "override_proxy_request_duration_seconds",
        "served_by" => served_by.as_str()
    )
    .record(start.elapsed().as_secs_f64());
}
