//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pagewing_requests_total` (counter): requests by kind, status
//! - `pagewing_request_duration_seconds` (histogram): latency by kind
//! - `pagewing_cache_hits_total` (counter): cache hits by layer (ssg, render)
//! - `pagewing_reloads_total` (counter): reloads by outcome
//! - `pagewing_reload_duration_seconds` (histogram)
//! - `pagewing_pages` / `pagewing_failed_pages` (gauges): last successful reload
//! - `pagewing_ssg_dropped_total` (counter): regeneration tasks dropped on a full queue
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Prometheus exporter is optional and serves its own listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe();
            tracing::info!(address = %addr, "Metrics endpoint listening");
        }
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

fn describe() {
    describe_counter!("pagewing_requests_total", "Requests served, by kind and status");
    describe_histogram!("pagewing_request_duration_seconds", "Request latency in seconds");
    describe_counter!("pagewing_cache_hits_total", "Responses served from a cache layer");
    describe_counter!("pagewing_reloads_total", "Reloads, by outcome");
    describe_histogram!("pagewing_reload_duration_seconds", "Reload duration in seconds");
    describe_gauge!("pagewing_pages", "Pages compiled by the last reload");
    describe_gauge!("pagewing_failed_pages", "Pages that failed to compile in the last reload");
    describe_counter!("pagewing_ssg_dropped_total", "Static regeneration tasks dropped");
}

pub fn record_request(kind: &'static str, status: u16, start: Instant) {
    counter!("pagewing_requests_total", "kind" => kind, "status" => status.to_string()).increment(1);
    histogram!("pagewing_request_duration_seconds", "kind" => kind).record(start.elapsed().as_secs_f64());
}

pub fn record_cache_hit(layer: &'static str) {
    counter!("pagewing_cache_hits_total", "layer" => layer).increment(1);
}

pub fn record_reload(start: Instant, pages: usize, failed: usize) {
    counter!("pagewing_reloads_total", "outcome" => "ok").increment(1);
    histogram!("pagewing_reload_duration_seconds").record(start.elapsed().as_secs_f64());
    gauge!("pagewing_pages").set(pages as f64);
    gauge!("pagewing_failed_pages").set(failed as f64);
}

pub fn record_reload_failure() {
    counter!("pagewing_reloads_total", "outcome" => "failed").increment(1);
}

pub fn record_ssg_dropped() {
    counter!("pagewing_ssg_dropped_total").increment(1);
}
