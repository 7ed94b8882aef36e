//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rutt_requests_total` (counter): dispatched requests by method, route, status
//! - `rutt_request_duration_seconds` (histogram): dispatch latency
//! - `rutt_routes_registered` (gauge): compiled entries served
//!
//! # Design Decisions
//! - Labels use the route template, not the concrete path, to bound cardinality
//! - Recording is a no-op until an exporter is installed

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one dispatched request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];
    counter!("rutt_requests_total", &labels).increment(1);
    histogram!("rutt_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_routes_registered(count: usize) {
    gauge!("rutt_routes_registered").set(count as f64);
}
