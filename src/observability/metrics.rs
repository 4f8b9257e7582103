//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, body treatment
//! - `proxy_request_duration_seconds` (histogram): time to response head
//! - `proxy_upstream_errors_total` (counter): failures by kind
//! - `proxy_html_rewrites_total` (counter): rewritten HTML documents
//! - `proxy_html_rewrite_bytes` (histogram): size of rewritten documents
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Prometheus exporter is optional and bound to its own address

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one finished request.
pub fn record_request(method: &str, status: u16, treatment: &'static str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("body", treatment.to_string()),
    ];
    counter!("proxy_requests_total", &labels).increment(1);
    histogram!("proxy_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

/// Record a forwarding or relaying failure.
pub fn record_upstream_error(kind: &'static str) {
    counter!("proxy_upstream_errors_total", "kind" => kind).increment(1);
}

/// Record a rewritten HTML document.
pub fn record_html_rewrite(original_bytes: usize, rewritten_bytes: usize) {
    counter!("proxy_html_rewrites_total").increment(1);
    histogram!("proxy_html_rewrite_bytes").record(rewritten_bytes as f64);
    if original_bytes != rewritten_bytes {
        tracing::trace!(original_bytes, rewritten_bytes, "HTML rewritten");
    }
}
