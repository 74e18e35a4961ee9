//! Redis connection configuration.

use mockapis_core::config::{ConfigError, EventLogConfig};
use serde::{Deserialize, Serialize};
use std::env;

/// Environment variable holding the Redis connection URL.
pub const REDIS_URL_ENV: &str = "REDIS_URL";

/// URL used when `REDIS_URL` is unset.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Everything needed to open a [`RedisEventLog`](crate::RedisEventLog).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key and overflow settings.
    pub event_log: EventLogConfig,
}

impl RedisConfig {
    /// Default policies against `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            event_log: EventLogConfig::default(),
        }
    }

    /// Load `REDIS_URL` and the `MOCKAPIS_*` event log variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a numeric variable is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env::var(REDIS_URL_ENV).unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
            event_log: EventLogConfig::from_env()?,
        })
    }

    /// Replace the event log settings.
    #[must_use]
    pub fn with_event_log(mut self, event_log: EventLogConfig) -> Self {
        self.event_log = event_log;
        self
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REDIS_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_local_redis() {
        let config = RedisConfig::default();
        assert_eq!(config.url, "redis://127.0.0.1:6379");
        assert_eq!(config.event_log, EventLogConfig::default());
    }

    #[test]
    fn event_log_settings_can_be_replaced() {
        let config = RedisConfig::new("redis://cache:6379")
            .with_event_log(EventLogConfig::default().with_namespace("staging:events"));

        assert_eq!(config.url, "redis://cache:6379");
        assert_eq!(config.event_log.namespace, "staging:events");
    }
}
