//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (requests, latency, dispatch failures)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `proxy_requests_total` (counter): calls by route, outcome, status
//! - `proxy_request_duration_seconds` (histogram): latency distribution by route
//! - `proxy_dispatch_failures_total` (counter): failures by route, kind
//!
//! # Design Decisions
//! - Labels for route, outcome, status code
//! - Histogram buckets tuned for typical web latencies

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

const REQUEST_DURATION_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full("proxy_request_duration_seconds".to_string()),
            REQUEST_DURATION_BUCKETS,
        )?
        .install()?;

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a completed call.
pub fn record_request(route: &str, outcome: &'static str, status: u16, start: Instant) {
    ::metrics::counter!(
        "proxy_requests_total",
        "route" => route.to_string(),
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);

    ::metrics::histogram!("proxy_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record a call for which no upstream response was obtained.
pub fn record_dispatch_failure(route: &str, kind: &'static str) {
    ::metrics::counter!(
        "proxy_dispatch_failures_total",
        "route" => route.to_string(),
        "kind" => kind
    )
    .increment(1);
}
