use std::time::Duration;

use database::common::RetryDecision;
use thiserror::Error;

/// Upstream failures, classified so callers branch on kind rather than text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Circuit breaker for '{service}' is open")]
    CircuitOpen { service: String, retry_after: Duration },

    #[error("Upstream '{service}' timed out")]
    Timeout { service: String },

    #[error("Upstream '{service}' unavailable: {reason}")]
    Unavailable { service: String, reason: String },

    #[error("Upstream '{service}' returned an invalid response: {reason}")]
    InvalidResponse {
        service: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("Upstream '{service}' is rate limiting requests")]
    RateLimited {
        service: String,
        retry_after: Option<Duration>,
    },
}

pub type UpstreamResult<T> = Result<T, UpstreamError>;

impl UpstreamError {
    pub fn service(&self) -> &str {
        match self {
            Self::CircuitOpen { service, .. }
            | Self::Timeout { service }
            | Self::Unavailable { service, .. }
            | Self::InvalidResponse { service, .. }
            | Self::RateLimited { service, .. } => service,
        }
    }

    /// Transient conditions another attempt may fix.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Unavailable { .. } | Self::RateLimited { .. }
        )
    }

    /// Hint for a `Retry-After` response header.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen { retry_after, .. } => Some(*retry_after),
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub(crate) fn retry_decision(&self) -> RetryDecision {
        match self {
            Self::RateLimited {
                retry_after: Some(delay),
                ..
            } => RetryDecision::RetryAfter(*delay),
            err if err.is_retryable() => RetryDecision::Retry,
            _ => RetryDecision::Stop,
        }
    }

    pub(crate) fn from_reqwest(service: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                service: service.to_string(),
            }
        } else if err.is_decode() {
            Self::InvalidResponse {
                service: service.to_string(),
                status: err.status().map(|s| s.as_u16()),
                reason: err.to_string(),
            }
        } else {
            Self::Unavailable {
                service: service.to_string(),
                reason: err.to_string(),
            }
        }
    }

    /// Maps a non-2xx status: 408 timeout, 429 rate limited, 5xx unavailable,
    /// any other 4xx an invalid (non-retryable) response.
    pub(crate) fn from_status(
        service: &str,
        status: u16,
        retry_after: Option<Duration>,
        body: String,
    ) -> Self {
        let service = service.to_string();
        match status {
            408 => Self::Timeout { service },
            429 => Self::RateLimited { service, retry_after },
            500..=599 => Self::Unavailable {
                service,
                reason: format!("status {}: {}", status, truncate(&body, 200)),
            },
            _ => Self::InvalidResponse {
                service,
                status: Some(status),
                reason: truncate(&body, 200).to_string(),
            },
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
