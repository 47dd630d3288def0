#[cfg(feature = "config")]
use core_config::{ConfigError, FromEnv, env_or_default, env_parse};

/// Redis connection settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedisConfig {
    pub url: String,
    /// Prefix for every key the portal writes
    pub key_prefix: String,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "portal".to_string(),
        }
    }
}

/// `REDIS_URL` (redis://127.0.0.1:6379), `REDIS_KEY_PREFIX` (portal).
/// `REDIS_DATABASE`, when set, is appended to the URL path.
#[cfg(feature = "config")]
impl FromEnv for RedisConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut url = env_or_default("REDIS_URL", "redis://127.0.0.1:6379");
        if std::env::var("REDIS_DATABASE").is_ok() {
            let database: u8 = env_parse("REDIS_DATABASE", "0")?;
            url = format!("{}/{}", url.trim_end_matches('/'), database);
        }

        Ok(Self {
            url,
            key_prefix: env_or_default("REDIS_KEY_PREFIX", "portal"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_config_default() {
        let config = RedisConfig::default();
        assert_eq!(config.url, "redis://127.0.0.1:6379");
        assert_eq!(config.key_prefix, "portal");
    }

    #[test]
    fn test_redis_config_builder() {
        let config = RedisConfig::new("redis://cache:6379").with_key_prefix("staging");
        assert_eq!(config.url, "redis://cache:6379");
        assert_eq!(config.key_prefix, "staging");
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_redis_config_from_env_with_database() {
        temp_env::with_vars(
            [
                ("REDIS_URL", Some("redis://cache:6379/")),
                ("REDIS_DATABASE", Some("3")),
                ("REDIS_KEY_PREFIX", None::<&str>),
            ],
            || {
                let config = RedisConfig::from_env().unwrap();
                assert_eq!(config.url, "redis://cache:6379/3");
                assert_eq!(config.key_prefix, "portal");
            },
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_redis_config_from_env_invalid_database() {
        temp_env::with_vars(
            [("REDIS_URL", Some("redis://cache:6379")), ("REDIS_DATABASE", Some("x"))],
            || {
                let err = RedisConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("REDIS_DATABASE"));
            },
        );
    }
}
