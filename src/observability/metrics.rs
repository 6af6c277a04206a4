//! Metrics collection and exposition.
//!
//! # Metrics
//! - `batch_requests_total` (counter): batch calls by outcome (ok, rejected, failed)
//! - `batch_size` (histogram): items per accepted batch
//! - `batch_duration_seconds` (histogram): executor wall time per batch
//! - `batch_items_total` (counter): sub-requests by method, status
//! - `batch_item_duration_seconds` (histogram): per sub-request dispatch time
//!
//! # Design Decisions
//! - Recording is always on; without an installed recorder the macros do nothing
//! - Status is recorded as a label, not per-path, to bound cardinality

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_metrics();
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

fn describe_metrics() {
    metrics::describe_counter!("batch_requests_total", "Batch calls by outcome");
    metrics::describe_histogram!("batch_size", "Number of sub-requests per accepted batch");
    metrics::describe_histogram!(
        "batch_duration_seconds",
        "Time spent executing a batch in seconds"
    );
    metrics::describe_counter!("batch_items_total", "Sub-requests by method and status");
    metrics::describe_histogram!(
        "batch_item_duration_seconds",
        "Sub-request dispatch duration in seconds"
    );
}

/// Count one batch call by outcome.
pub fn record_batch_outcome(outcome: &'static str) {
    metrics::counter!("batch_requests_total", "outcome" => outcome).increment(1);
}

/// Record an executed batch.
pub fn record_batch(size: usize, executor: &'static str, elapsed: Duration) {
    metrics::histogram!("batch_size", "executor" => executor).record(size as f64);
    metrics::histogram!("batch_duration_seconds", "executor" => executor)
        .record(elapsed.as_secs_f64());
}

/// Record one dispatched sub-request.
pub fn record_item(method: &'static str, status: u16, elapsed: Duration) {
    let status = status.to_string();
    metrics::counter!("batch_items_total", "method" => method, "status" => status.clone())
        .increment(1);
    metrics::histogram!("batch_item_duration_seconds", "method" => method, "status" => status)
        .record(elapsed.as_secs_f64());
}
