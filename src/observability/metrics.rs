//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): inbound requests by route, status
//! - `gateway_request_duration_seconds` (histogram): time to response head
//! - `gateway_denials_total` (counter): authorization denials by reason
//! - `gateway_relay_total` (counter): upstream exchanges by outcome, status
//! - `gateway_relay_head_seconds` (histogram): upstream time to response head
//! - `gateway_relay_streams_total` (counter): relayed bodies by final outcome
//! - `gateway_relay_stream_seconds` (histogram): body lifetime by outcome
//! - `gateway_relay_bytes_total` (counter): bytes streamed to callers
//! - `gateway_status_fetch_total` (counter): dashboard source fetches by result
//! - `gateway_status_fetch_seconds` (histogram): source fetch latency

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &'static str, status: u16, start: Instant) {
    ::metrics::counter!(
        "gateway_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("gateway_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_denial(reason: &'static str) {
    ::metrics::counter!("gateway_denials_total", "reason" => reason).increment(1);
}

pub fn record_relay(outcome: &'static str, status: u16, start: Instant) {
    ::metrics::counter!(
        "gateway_relay_total",
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("gateway_relay_head_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_stream(outcome: &'static str, bytes: u64, start: Instant) {
    ::metrics::counter!("gateway_relay_streams_total", "outcome" => outcome).increment(1);
    ::metrics::counter!("gateway_relay_bytes_total").increment(bytes);
    ::metrics::histogram!("gateway_relay_stream_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_source_fetch(source: &str, success: bool, start: Instant) {
    ::metrics::counter!(
        "gateway_status_fetch_total",
        "source" => source.to_string(),
        "result" => if success { "success" } else { "error" }
    )
    .increment(1);
    ::metrics::histogram!("gateway_status_fetch_seconds", "source" => source.to_string())
        .record(start.elapsed().as_secs_f64());
}
