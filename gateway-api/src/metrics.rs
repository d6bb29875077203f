//! Request counters/histograms and per-worker gauges, exposed as Prometheus
//! text exposition at `/metrics`. Grounded on the teacher's pattern of a
//! `prometheus::Registry` built once at startup and mounted under `/metrics`
//! (`cloud-component-service::server::run`).

use std::time::Instant;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use prometheus::{HistogramVec, IntCounterVec, IntGaugeVec, Registry, TextEncoder};

use crate::state::AppState;

pub struct Metrics {
    registry: Registry,
    pub requests_total: IntCounterVec,
    pub request_duration_seconds: HistogramVec,
    pub worker_last_block: IntGaugeVec,
    pub worker_is_archival: IntGaugeVec,
    pub worker_is_working: IntGaugeVec,
    pub worker_restart_count: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            prometheus::Opts::new("gateway_http_requests_total", "Total HTTP requests served"),
            &["verb", "status"],
        )
        .expect("metric names are valid");
        let request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "gateway_http_request_duration_seconds",
                "HTTP request latency in seconds",
            ),
            &["verb"],
        )
        .expect("metric names are valid");
        let worker_last_block = IntGaugeVec::new(
            prometheus::Opts::new("gateway_worker_last_block", "Last masterchain seqno reported by a worker"),
            &["index"],
        )
        .expect("metric names are valid");
        let worker_is_archival = IntGaugeVec::new(
            prometheus::Opts::new("gateway_worker_is_archival", "1 if the worker's upstream is archival"),
            &["index"],
        )
        .expect("metric names are valid");
        let worker_is_working = IntGaugeVec::new(
            prometheus::Opts::new("gateway_worker_is_working", "1 if the worker is caught up with consensus"),
            &["index"],
        )
        .expect("metric names are valid");
        let worker_restart_count = IntGaugeVec::new(
            prometheus::Opts::new("gateway_worker_restart_count", "Restarts observed for this worker slot"),
            &["index"],
        )
        .expect("metric names are valid");

        registry.register(Box::new(requests_total.clone())).expect("unique metric name");
        registry.register(Box::new(request_duration_seconds.clone())).expect("unique metric name");
        registry.register(Box::new(worker_last_block.clone())).expect("unique metric name");
        registry.register(Box::new(worker_is_archival.clone())).expect("unique metric name");
        registry.register(Box::new(worker_is_working.clone())).expect("unique metric name");
        registry.register(Box::new(worker_restart_count.clone())).expect("unique metric name");

        Metrics {
            registry,
            requests_total,
            request_duration_seconds,
            worker_last_block,
            worker_is_archival,
            worker_is_working,
            worker_restart_count,
        }
    }

    pub fn observe_request(&self, verb: &str, status: u16, started_at: Instant) {
        self.requests_total.with_label_values(&[verb, &status.to_string()]).inc();
        self.request_duration_seconds.with_label_values(&[verb]).observe(started_at.elapsed().as_secs_f64());
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Refreshes the worker gauges from a live snapshot just before encoding,
/// since worker state changes continuously rather than on each request.
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    for worker in state.manager.get_workers_state() {
        let index = worker.index.to_string();
        state.metrics.worker_last_block.with_label_values(&[&index]).set(worker.last_block);
        state.metrics.worker_is_archival.with_label_values(&[&index]).set(worker.is_archival as i64);
        state.metrics.worker_is_working.with_label_values(&[&index]).set(worker.is_working as i64);
        state.metrics.worker_restart_count.with_label_values(&[&index]).set(worker.restart_count as i64);
    }

    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry.gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(%err, "failed to encode prometheus metrics");
    }
    ([("content-type", encoder.format_type().to_string())], buffer).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_total_increments_per_observation() {
        let metrics = Metrics::new();
        metrics.observe_request("get_masterchain_info", 200, Instant::now());
        metrics.observe_request("get_masterchain_info", 200, Instant::now());
        let value = metrics.requests_total.with_label_values(&["get_masterchain_info", "200"]).get();
        assert_eq!(value, 2);
    }
}
