//! Recorders for the portal's resilience and idempotency layers.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Outcome label for `upstream_requests_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamOutcome {
    Success,
    Error,
    /// Short-circuited by an open breaker
    Rejected,
}

impl UpstreamOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Rejected => "rejected",
        }
    }
}

pub struct UpstreamMetrics;

impl UpstreamMetrics {
    pub fn record_call(service: &str, operation: &str, outcome: UpstreamOutcome, elapsed: Duration) {
        counter!(
            "upstream_requests_total",
            "service" => service.to_string(),
            "operation" => operation.to_string(),
            "outcome" => outcome.as_str()
        )
        .increment(1);

        if outcome != UpstreamOutcome::Rejected {
            histogram!(
                "upstream_request_duration_seconds",
                "service" => service.to_string(),
                "operation" => operation.to_string()
            )
            .record(elapsed.as_secs_f64());
        }
    }

    pub fn record_retry(service: &str) {
        counter!("upstream_retries_total", "service" => service.to_string()).increment(1);
    }
}

pub struct BreakerMetrics;

impl BreakerMetrics {
    /// `state` is one of `closed`, `half_open`, `open`.
    pub fn record_transition(breaker: &str, state: &'static str) {
        counter!(
            "circuit_breaker_transitions_total",
            "breaker" => breaker.to_string(),
            "to" => state
        )
        .increment(1);

        let level = match state {
            "closed" => 0.0,
            "half_open" => 1.0,
            _ => 2.0,
        };
        gauge!("circuit_breaker_state", "breaker" => breaker.to_string()).set(level);
    }
}

pub struct IdempotencyMetrics;

impl IdempotencyMetrics {
    pub fn record_replay(route: &str) {
        counter!("idempotency_replays_total", "route" => route.to_string()).increment(1);
    }

    pub fn record_stored(route: &str) {
        counter!("idempotency_stored_total", "route" => route.to_string()).increment(1);
    }
}
