//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_total` (counter): dispatch outcomes by router, outcome
//!   (`matched`, `default`, `no_route`)
//! - `router_routes` (gauge): attached routes per router
//! - `http_requests_total` (counter): connector requests by method, status
//! - `dispatch_duration_seconds` (histogram): connector latency
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - Router names are labels; keep router counts small

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape listener on `addr`. Must run inside a tokio
/// runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_dispatch(router: &str, outcome: &'static str) {
    metrics::counter!(
        "dispatch_total",
        "router" => router.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_route_count(router: &str, routes: usize) {
    metrics::gauge!("router_routes", "router" => router.to_string()).set(routes as f64);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("dispatch_duration_seconds").record(start.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter_is_noop() {
        record_dispatch("root", "matched");
        record_route_count("root", 3);
        record_request("GET", 200, Instant::now());
    }
}
