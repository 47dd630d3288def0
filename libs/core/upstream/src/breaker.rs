//! Three-state circuit breaker for one named upstream.
//!
//! ```text
//! ┌─────────┐  failures >= threshold  ┌────────┐
//! │ CLOSED  │ ──────────────────────> │  OPEN  │ <──────┐
//! └─────────┘                         └────────┘        │
//!      ^                                   │ open_timeout│ failure
//!      │          success          ┌───────v─────┐      │
//!      └────────────────────────── │  HALF-OPEN  │ ─────┘
//!                                  └─────────────┘
//! ```
//!
//! The open → half-open move is lazy: it happens on the first state read
//! after `open_timeout`, with no background timer. Every call admitted by
//! [`CircuitBreaker::before_call`] must be followed by exactly one of
//! [`CircuitBreaker::on_success`] or [`CircuitBreaker::on_failure`].

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use core_config::upstream::BreakerConfig;
use observability::BreakerMetrics;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::UpstreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Point-in-time view used by `/ready`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_calls: u32,
}

pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                half_open_calls: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current state, applying the lazy open → half-open transition.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
        }
    }

    /// Admit or reject a call. Rejections carry the remaining open time.
    pub fn before_call(&self) -> Result<(), UpstreamError> {
        let mut inner = self.lock();
        self.refresh(&mut inner);

        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => Err(self.rejection(&inner)),
            CircuitState::HalfOpen if inner.half_open_calls >= self.config.half_open_max_calls => {
                Err(self.rejection(&inner))
            }
            CircuitState::HalfOpen => {
                inner.half_open_calls += 1;
                Ok(())
            }
        }
    }

    pub fn on_success(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = 0;
        if inner.state != CircuitState::Closed {
            self.transition(&mut inner, CircuitState::Closed);
        }
    }

    pub fn on_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        match inner.state {
            CircuitState::Closed if inner.consecutive_failures >= self.config.failure_threshold => {
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::HalfOpen => self.transition(&mut inner, CircuitState::Open),
            _ => {}
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh(&self, inner: &mut BreakerInner) {
        if inner.state == CircuitState::Open
            && inner
                .opened_at
                .is_some_and(|opened| opened.elapsed() >= self.config.open_timeout)
        {
            self.transition(inner, CircuitState::HalfOpen);
        }
    }

    fn rejection(&self, inner: &BreakerInner) -> UpstreamError {
        let retry_after = inner
            .opened_at
            .map(|opened| self.config.open_timeout.saturating_sub(opened.elapsed()))
            .unwrap_or(Duration::ZERO);
        UpstreamError::CircuitOpen {
            service: self.name.clone(),
            retry_after,
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        inner.half_open_calls = 0;

        match to {
            CircuitState::Open => {
                inner.opened_at = Some(Instant::now());
                warn!(
                    breaker = %self.name,
                    from = from.as_str(),
                    failures = inner.consecutive_failures,
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                info!(breaker = %self.name, "Circuit breaker half-open, admitting probe");
            }
            CircuitState::Closed => {
                inner.opened_at = None;
                info!(breaker = %self.name, from = from.as_str(), "Circuit breaker closed");
            }
        }

        BreakerMetrics::record_transition(&self.name, to.as_str());
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(open_timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "llm",
            BreakerConfig {
                open_timeout,
                ..BreakerConfig::default()
            },
        )
    }

    fn trip(breaker: &CircuitBreaker) {
        for _ in 0..breaker.config().failure_threshold {
            breaker.before_call().unwrap();
            breaker.on_failure();
        }
    }

    #[test]
    fn test_starts_closed_and_admits_calls() {
        let breaker = breaker(Duration::from_secs(30));
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.before_call().is_ok());
    }

    #[test]
    fn test_opens_after_threshold_consecutive_failures() {
        let breaker = breaker(Duration::from_secs(30));

        for _ in 0..4 {
            breaker.on_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.on_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(matches!(
            breaker.before_call(),
            Err(UpstreamError::CircuitOpen { ref service, .. }) if service == "llm"
        ));
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let breaker = breaker(Duration::from_secs(30));
        for _ in 0..4 {
            breaker.on_failure();
        }
        breaker.on_success();
        for _ in 0..4 {
            breaker.on_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.snapshot().consecutive_failures, 4);
    }

    #[test]
    fn test_open_becomes_half_open_lazily_after_timeout() {
        let breaker = breaker(Duration::from_millis(20));
        trip(&breaker);
        assert_eq!(breaker.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_admits_single_probe() {
        let breaker = breaker(Duration::from_millis(10));
        trip(&breaker);
        std::thread::sleep(Duration::from_millis(20));

        assert!(breaker.before_call().is_ok());
        assert!(matches!(
            breaker.before_call(),
            Err(UpstreamError::CircuitOpen { .. })
        ));
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let breaker = breaker(Duration::from_millis(10));
        trip(&breaker);
        std::thread::sleep(Duration::from_millis(20));

        breaker.before_call().unwrap();
        breaker.on_failure();

        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.before_call().is_err());
    }

    #[test]
    fn test_half_open_success_closes() {
        let breaker = breaker(Duration::from_millis(10));
        trip(&breaker);
        std::thread::sleep(Duration::from_millis(20));

        breaker.before_call().unwrap();
        breaker.on_success();

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.snapshot().consecutive_failures, 0);
        assert!(breaker.before_call().is_ok());
    }

    #[test]
    fn test_rejection_reports_remaining_open_time() {
        let breaker = breaker(Duration::from_secs(30));
        trip(&breaker);

        match breaker.before_call() {
            Err(UpstreamError::CircuitOpen { retry_after, .. }) => {
                assert!(retry_after > Duration::from_secs(25));
                assert!(retry_after <= Duration::from_secs(30));
            }
            other => panic!("expected open circuit, got {:?}", other),
        }
    }

    #[test]
    fn test_concurrent_failures_are_counted_once_each() {
        let breaker = std::sync::Arc::new(CircuitBreaker::new(
            "embeddings",
            BreakerConfig {
                failure_threshold: 100,
                ..BreakerConfig::default()
            },
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let breaker = breaker.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        breaker.on_failure();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(breaker.snapshot().consecutive_failures, 80);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
