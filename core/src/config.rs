//! Event log configuration.
//!
//! Loaded from environment variables. Unset variables fall back to namespace
//! `mockapis:events`, 16 KiB per topic and 100-character encoded topics.

use crate::event_log::{DEFAULT_MAX_STREAM_BYTES, LogPolicies, OverflowPolicy};
use crate::topic::{DEFAULT_MAX_TOPIC_LENGTH, DEFAULT_NAMESPACE, StorageKeyPolicy};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Environment variable overriding the storage key namespace.
pub const NAMESPACE_ENV: &str = "MOCKAPIS_EVENT_NAMESPACE";
/// Environment variable overriding the per-topic byte ceiling.
pub const MAX_STREAM_BYTES_ENV: &str = "MOCKAPIS_MAX_STREAM_BYTES";
/// Environment variable overriding the encoded topic length cap.
pub const MAX_TOPIC_LENGTH_ENV: &str = "MOCKAPIS_MAX_TOPIC_LENGTH";

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable is set but cannot be parsed.
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue {
        /// Variable name.
        name: String,
        /// Raw value found.
        value: String,
    },
}

/// Event log settings shared by every backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogConfig {
    /// Prefix of every storage key.
    pub namespace: String,
    /// Per-topic stored size ceiling in bytes.
    pub max_stream_bytes: u64,
    /// Cap on the percent-encoded topic portion of a key.
    pub max_topic_length: usize,
}

impl EventLogConfig {
    /// Load from `MOCKAPIS_*` environment variables, falling back to defaults
    /// for unset ones.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a numeric variable is set but
    /// not a valid number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            namespace: env::var(NAMESPACE_ENV).unwrap_or(defaults.namespace),
            max_stream_bytes: parse_env(MAX_STREAM_BYTES_ENV)?
                .unwrap_or(defaults.max_stream_bytes),
            max_topic_length: parse_env(MAX_TOPIC_LENGTH_ENV)?
                .unwrap_or(defaults.max_topic_length),
        })
    }

    /// Set the key namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the per-topic ceiling.
    #[must_use]
    pub const fn with_max_stream_bytes(mut self, bytes: u64) -> Self {
        self.max_stream_bytes = bytes;
        self
    }

    /// Set the encoded topic cap.
    #[must_use]
    pub const fn with_max_topic_length(mut self, length: usize) -> Self {
        self.max_topic_length = length;
        self
    }

    /// Build the key and overflow policies this configuration describes.
    #[must_use]
    pub fn policies(&self) -> LogPolicies {
        LogPolicies::new(
            StorageKeyPolicy::new(self.namespace.clone(), self.max_topic_length),
            OverflowPolicy::new(self.max_stream_bytes),
        )
    }
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            max_stream_bytes: DEFAULT_MAX_STREAM_BYTES,
            max_topic_length: DEFAULT_MAX_TOPIC_LENGTH,
        }
    }
}

/// Parse an optional environment variable.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] if the variable is set and does not
/// parse as `T`.
pub fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    parse_value(name, env::var(name).ok())
}

/// Parse an optional raw value read from variable `name`, ignoring
/// surrounding whitespace.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] if `raw` is present and does not
/// parse as `T`.
pub fn parse_value<T: FromStr>(
    name: &str,
    raw: Option<String>,
) -> Result<Option<T>, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests can unwrap
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EventLogConfig::default();
        assert_eq!(config.namespace, "mockapis:events");
        assert_eq!(config.max_stream_bytes, 16384);
        assert_eq!(config.max_topic_length, 100);
    }

    #[test]
    fn builders_override_fields() {
        let config = EventLogConfig::default()
            .with_namespace("test:events")
            .with_max_stream_bytes(512)
            .with_max_topic_length(20);

        let policies = config.policies();
        assert_eq!(policies.keys.namespace(), "test:events");
        assert_eq!(policies.keys.max_topic_length(), 20);
        assert_eq!(policies.overflow.max_stream_bytes(), 512);
    }

    #[test]
    fn parse_env_unset_is_none() {
        assert_eq!(parse_env::<u64>("MOCKAPIS_TEST_UNSET_VARIABLE").unwrap(), None);
    }

    #[test]
    fn parse_value_trims_whitespace() {
        let parsed = parse_value::<u64>(MAX_STREAM_BYTES_ENV, Some(" 512 ".to_string())).unwrap();
        assert_eq!(parsed, Some(512));
    }

    #[test]
    fn parse_value_rejects_garbage() {
        let err = parse_value::<u64>(MAX_STREAM_BYTES_ENV, Some("lots".to_string())).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                name: MAX_STREAM_BYTES_ENV.to_string(),
                value: "lots".to_string(),
            }
        );
    }

    #[test]
    fn parse_value_absent_is_none() {
        assert_eq!(parse_value::<usize>(MAX_TOPIC_LENGTH_ENV, None).unwrap(), None);
    }

    #[test]
    fn invalid_value_display() {
        let err = ConfigError::InvalidValue {
            name: MAX_STREAM_BYTES_ENV.to_string(),
            value: "lots".to_string(),
        };
        assert_eq!(
            err.to_string(),
            r#"Invalid value for MOCKAPIS_MAX_STREAM_BYTES: "lots""#
        );
    }
}
