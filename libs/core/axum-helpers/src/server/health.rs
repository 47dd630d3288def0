use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use core_config::AppInfo;
use futures::future::join_all;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub name: &'static str,
    pub version: &'static str,
}

/// Outcome of one readiness probe.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// `connected` or `disconnected`
    pub status: &'static str,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated readiness report.
///
/// `details` carries informational sections (breaker states, for example)
/// that never affect readiness.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// `ready` or `not ready`
    pub status: &'static str,
    pub checks: BTreeMap<String, CheckResult>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl ReadyResponse {
    pub fn is_ready(&self) -> bool {
        self.checks.values().all(|c| c.status == "connected")
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        self.details.insert(key.into(), value);
        self
    }
}

impl IntoResponse for ReadyResponse {
    fn into_response(self) -> Response {
        let status = if self.is_ready() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (status, Json(self)).into_response()
    }
}

/// A boxed future for health checks with a string error
pub type HealthCheckFuture<'a> = Pin<Box<dyn Future<Output = Result<(), String>> + Send + 'a>>;

/// Runs the named checks concurrently and aggregates their outcomes.
///
/// ```ignore
/// let checks: Vec<(&str, HealthCheckFuture<'_>)> = vec![
///     ("database", Box::pin(async { check_health(&db).await.map_err(|e| e.to_string()) })),
///     ("redis", Box::pin(async { redis_health(&mut redis).await.map(|_| ()).map_err(|e| e.to_string()) })),
/// ];
/// run_health_checks(checks).await.into_response()
/// ```
pub async fn run_health_checks(checks: Vec<(&str, HealthCheckFuture<'_>)>) -> ReadyResponse {
    let names: Vec<String> = checks.iter().map(|(name, _)| name.to_string()).collect();
    let timed = checks.into_iter().map(|(_, check)| async move {
        let started = Instant::now();
        let result = check.await;
        (result, started.elapsed().as_millis() as u64)
    });
    let results = join_all(timed).await;

    let mut report = BTreeMap::new();
    for (name, (result, latency_ms)) in names.into_iter().zip(results) {
        let entry = match result {
            Ok(()) => CheckResult {
                status: "connected",
                latency_ms,
                error: None,
            },
            Err(e) => {
                tracing::error!(check = %name, error = %e, "Readiness check failed");
                CheckResult {
                    status: "disconnected",
                    latency_ms,
                    error: Some(e),
                }
            }
        };
        report.insert(name, entry);
    }

    let ready = report.values().all(|c| c.status == "connected");
    ReadyResponse {
        status: if ready { "ready" } else { "not ready" },
        checks: report,
        details: serde_json::Map::new(),
    }
}

/// Liveness: always 200 while the process serves requests.
pub async fn health_handler(State(app): State<AppInfo>) -> Response {
    let response = HealthResponse {
        status: "healthy",
        name: app.name,
        version: app.version,
    };

    (StatusCode::OK, Json(response)).into_response()
}

/// Router with the `/health` endpoint.
///
/// ```ignore
/// let app = router.merge(health_router(app_info!()));
/// ```
pub fn health_router(app_info: AppInfo) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(app_info)
}
