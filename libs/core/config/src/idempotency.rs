use crate::{ConfigError, FromEnv, env_or_default, env_parse};
use std::str::FromStr;
use std::time::Duration;

/// Where idempotency records live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdempotencyBackend {
    Postgres,
    Redis,
    Memory,
}

impl FromStr for IdempotencyBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown backend '{}', expected postgres, redis or memory", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdempotencyConfig {
    pub backend: IdempotencyBackend,
    /// Lifetime of a stored response
    pub ttl: Duration,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            backend: IdempotencyBackend::Postgres,
            ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl FromEnv for IdempotencyConfig {
    /// IDEMPOTENCY_BACKEND (postgres), IDEMPOTENCY_TTL_SECS (86400)
    fn from_env() -> Result<Self, ConfigError> {
        let backend = env_or_default("IDEMPOTENCY_BACKEND", "postgres")
            .parse()
            .map_err(|details| ConfigError::ParseError {
                key: "IDEMPOTENCY_BACKEND".to_string(),
                details,
            })?;
        let ttl_secs: u64 = env_parse("IDEMPOTENCY_TTL_SECS", "86400")?;

        Ok(Self {
            backend,
            ttl: Duration::from_secs(ttl_secs),
        })
    }
}
