//! Prometheus metrics for the portal.
//!
//! - [`middleware`]: per-request HTTP counters and latency
//! - [`portal`]: upstream calls, breaker transitions and idempotent replays
//!
//! Recording is a no-op until [`init_metrics`] installs the recorder, so
//! library code and tests can call the recorders unconditionally.
//!
//! ```rust,ignore
//! let handle = observability::init_metrics()?;
//! let app = Router::new().route("/metrics", get(observability::metrics_handler));
//! ```

pub mod middleware;
pub mod portal;

pub use middleware::metrics_middleware;
pub use portal::{BreakerMetrics, IdempotencyMetrics, UpstreamMetrics};

pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the global Prometheus recorder once and return its handle.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;
        register_metric_descriptions();
        info!("Prometheus metrics recorder initialized");
        Ok(handle)
    })
}

pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Axum handler for `/metrics`
pub async fn metrics_handler() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

fn register_metric_descriptions() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!("http_requests_total", "Total number of HTTP requests");
    describe_histogram!("http_request_duration_seconds", "HTTP request duration in seconds");
    describe_counter!("http_requests_errors_total", "HTTP responses with 4xx or 5xx status");

    describe_counter!(
        "upstream_requests_total",
        "Upstream calls by service and outcome (success, error, rejected)"
    );
    describe_histogram!("upstream_request_duration_seconds", "Upstream call latency in seconds");
    describe_counter!("upstream_retries_total", "Upstream retry attempts by service");

    describe_counter!(
        "circuit_breaker_transitions_total",
        "Circuit breaker state changes by breaker and target state"
    );
    describe_gauge!(
        "circuit_breaker_state",
        "Current breaker state (0 closed, 1 half-open, 2 open)"
    );

    describe_counter!("idempotency_replays_total", "Responses served from the idempotency store");
    describe_counter!("idempotency_stored_total", "Responses recorded in the idempotency store");
}
