//! Prometheus metrics for workshop-service.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::{Lazy, OnceCell};
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Invoice operations by operation and result.
pub static INVOICE_OPERATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "workshop_invoice_operations_total",
        "Total number of invoice create/update/remove operations",
        &["operation", "status"] // create|update|remove, ok|error
    )
    .expect("Failed to register invoice_operations_total")
});

/// Per-item side effects by effect and outcome.
pub static SIDE_EFFECTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "workshop_side_effects_total",
        "Total number of invoice item side effects",
        &["effect", "outcome"]
    )
    .expect("Failed to register side_effects_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "workshop_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Store query duration histogram.
pub static STORE_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "workshop_store_query_duration_seconds",
        "Backing store query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register store_query_duration")
});

/// Recorder for the HTTP request metrics emitted by the `metrics` crate.
static HTTP_METRICS: OnceCell<Option<PrometheusHandle>> = OnceCell::new();

fn http_metrics() -> Option<&'static PrometheusHandle> {
    HTTP_METRICS
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "Prometheus recorder not installed");
                None
            }
        })
        .as_ref()
}

/// Initialize all metrics (forces lazy initialization). Safe to call more
/// than once.
pub fn init_metrics() {
    Lazy::force(&INVOICE_OPERATIONS_TOTAL);
    Lazy::force(&SIDE_EFFECTS_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&STORE_QUERY_DURATION);
    http_metrics();
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut body = encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default();

    if let Some(handle) = http_metrics() {
        body.push_str(&handle.render());
    }
    body
}
