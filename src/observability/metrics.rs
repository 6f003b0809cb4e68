//! Metrics collection and exposition.
//!
//! # Metrics
//! - `image_service_requests_total` (counter): requests by route, status
//! - `image_service_request_duration_seconds` (histogram): latency by route
//! - `image_service_transforms_total` (counter): successful transforms by format
//! - `image_service_transform_bytes` (histogram): encoded output size by format
//! - `image_service_fetch_failures_total` (counter): source fetch failures by kind
//!
//! # Design Decisions
//! - Prometheus exporter runs its own HTTP listener, apart from the service port
//! - Recording functions are free functions so any subsystem can call them

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and start its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record a finished HTTP request.
pub fn record_request(route: &str, status: u16, start: Instant) {
    let route = route.to_string();
    counter!(
        "image_service_requests_total",
        "route" => route.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("image_service_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

/// Record a successful transform and its output size.
pub fn record_transform(format: &str, bytes: usize) {
    let format = format.to_string();
    counter!("image_service_transforms_total", "format" => format.clone()).increment(1);
    histogram!("image_service_transform_bytes", "format" => format).record(bytes as f64);
}

/// Record a failed source fetch.
pub fn record_fetch_failure(kind: &'static str) {
    counter!("image_service_fetch_failures_total", "kind" => kind).increment(1);
}
