//! Settings for the LLM and embeddings HTTP clients and their breakers.

use crate::{ConfigError, FromEnv, env_optional, env_or_default, env_parse};
use std::time::Duration;

/// One upstream HTTP service, read from variables with a shared prefix.
///
/// With prefix `LLM`: `LLM_BASE_URL`, `LLM_API_KEY`, `LLM_MODEL`,
/// `LLM_TIMEOUT_SECS` (30), `LLM_MAX_RETRIES` (2), `LLM_BACKOFF_MS` (200).
#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    /// Breaker and metrics label
    pub name: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl UpstreamConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            backoff: Duration::from_millis(200),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    pub fn from_env_prefixed(prefix: &str, default_url: &str, default_model: &str) -> Result<Self, ConfigError> {
        let key = |suffix: &str| format!("{}_{}", prefix, suffix);

        let timeout_secs: u64 = env_parse(&key("TIMEOUT_SECS"), "30")?;
        let backoff_ms: u64 = env_parse(&key("BACKOFF_MS"), "200")?;

        Ok(Self {
            name: prefix.to_ascii_lowercase(),
            base_url: env_or_default(&key("BASE_URL"), default_url)
                .trim_end_matches('/')
                .to_string(),
            api_key: env_optional(&key("API_KEY")),
            model: env_or_default(&key("MODEL"), default_model),
            timeout: Duration::from_secs(timeout_secs),
            max_retries: env_parse(&key("MAX_RETRIES"), "2")?,
            backoff: Duration::from_millis(backoff_ms),
        })
    }

    /// `LLM_*` with an OpenAI-compatible default endpoint.
    pub fn llm_from_env() -> Result<Self, ConfigError> {
        Self::from_env_prefixed("LLM", "https://api.openai.com/v1", "gpt-4o-mini")
    }

    /// `EMBEDDINGS_*` with an OpenAI-compatible default endpoint.
    pub fn embeddings_from_env() -> Result<Self, ConfigError> {
        Self::from_env_prefixed("EMBEDDINGS", "https://api.openai.com/v1", "text-embedding-3-small")
    }
}

/// Circuit breaker thresholds shared by every upstream.
#[derive(Clone, Debug, PartialEq)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Time spent open before a probe is allowed
    pub open_timeout: Duration,
    /// Concurrent probes admitted while half-open
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            half_open_max_calls: 1,
        }
    }
}

impl FromEnv for BreakerConfig {
    /// BREAKER_FAILURE_THRESHOLD (5), BREAKER_OPEN_TIMEOUT_SECS (30),
    /// BREAKER_HALF_OPEN_MAX_CALLS (1)
    fn from_env() -> Result<Self, ConfigError> {
        let open_secs: u64 = env_parse("BREAKER_OPEN_TIMEOUT_SECS", "30")?;
        let config = Self {
            failure_threshold: env_parse("BREAKER_FAILURE_THRESHOLD", "5")?,
            open_timeout: Duration::from_secs(open_secs),
            half_open_max_calls: env_parse("BREAKER_HALF_OPEN_MAX_CALLS", "1")?,
        };

        if config.failure_threshold == 0 {
            return Err(ConfigError::ParseError {
                key: "BREAKER_FAILURE_THRESHOLD".to_string(),
                details: "must be at least 1".to_string(),
            });
        }
        if config.half_open_max_calls == 0 {
            return Err(ConfigError::ParseError {
                key: "BREAKER_HALF_OPEN_MAX_CALLS".to_string(),
                details: "must be at least 1".to_string(),
            });
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_config_defaults() {
        temp_env::with_vars(
            [
                ("LLM_BASE_URL", None::<&str>),
                ("LLM_API_KEY", None::<&str>),
                ("LLM_MODEL", None::<&str>),
                ("LLM_TIMEOUT_SECS", None::<&str>),
                ("LLM_MAX_RETRIES", None::<&str>),
                ("LLM_BACKOFF_MS", None::<&str>),
            ],
            || {
                let config = UpstreamConfig::llm_from_env().unwrap();
                assert_eq!(config.name, "llm");
                assert_eq!(config.base_url, "https://api.openai.com/v1");
                assert_eq!(config.api_key, None);
                assert_eq!(config.timeout, Duration::from_secs(30));
                assert_eq!(config.max_retries, 2);
                assert_eq!(config.backoff, Duration::from_millis(200));
            },
        );
    }

    #[test]
    fn test_embeddings_config_overrides() {
        temp_env::with_vars(
            [
                ("EMBEDDINGS_BASE_URL", Some("http://localhost:11434/v1/")),
                ("EMBEDDINGS_API_KEY", Some("secret")),
                ("EMBEDDINGS_MODEL", Some("nomic-embed-text")),
                ("EMBEDDINGS_MAX_RETRIES", Some("0")),
            ],
            || {
                let config = UpstreamConfig::embeddings_from_env().unwrap();
                assert_eq!(config.name, "embeddings");
                assert_eq!(config.base_url, "http://localhost:11434/v1");
                assert_eq!(config.api_key.as_deref(), Some("secret"));
                assert_eq!(config.model, "nomic-embed-text");
                assert_eq!(config.max_retries, 0);
            },
        );
    }

    #[test]
    fn test_upstream_config_invalid_timeout() {
        temp_env::with_var("LLM_TIMEOUT_SECS", Some("soon"), || {
            let err = UpstreamConfig::llm_from_env().unwrap_err();
            assert!(err.to_string().contains("LLM_TIMEOUT_SECS"));
        });
    }

    #[test]
    fn test_breaker_config_defaults() {
        temp_env::with_vars(
            [
                ("BREAKER_FAILURE_THRESHOLD", None::<&str>),
                ("BREAKER_OPEN_TIMEOUT_SECS", None::<&str>),
                ("BREAKER_HALF_OPEN_MAX_CALLS", None::<&str>),
            ],
            || {
                assert_eq!(BreakerConfig::from_env().unwrap(), BreakerConfig::default());
            },
        );
    }

    #[test]
    fn test_breaker_config_rejects_zero_threshold() {
        temp_env::with_var("BREAKER_FAILURE_THRESHOLD", Some("0"), || {
            assert!(BreakerConfig::from_env().is_err());
        });
    }
}
