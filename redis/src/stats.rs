//! Store-wide statistics for diagnostics endpoints.

use crate::event_log::RedisEventLog;
use mockapis_core::event_log::EventLogError;
use serde::{Deserialize, Serialize};

/// Snapshot of the Redis instance backing the event log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Keys in the selected database (every namespace, not only events).
    pub total_keys: u64,
    /// `used_memory_human` from `INFO`, e.g. `"1.02M"`.
    pub used_memory_human: Option<String>,
    /// `uptime_in_seconds` from `INFO`.
    pub uptime_seconds: Option<u64>,
}

impl StoreStats {
    /// Build from a `DBSIZE` reply and the text of an `INFO` reply.
    ///
    /// Fields missing from `info` are left as `None`.
    #[must_use]
    pub fn from_info(total_keys: u64, info: &str) -> Self {
        let mut stats = Self {
            total_keys,
            ..Self::default()
        };

        for line in info.lines() {
            let Some((field, value)) = line.trim().split_once(':') else {
                continue;
            };
            match field {
                "used_memory_human" => stats.used_memory_human = Some(value.to_string()),
                "uptime_in_seconds" => stats.uptime_seconds = value.parse().ok(),
                _ => {}
            }
        }

        stats
    }
}

impl RedisEventLog {
    /// Collect key count, memory use and uptime of the backing instance.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::StorageUnavailable`] if `DBSIZE` or `INFO` fails.
    pub async fn stats(&self) -> Result<StoreStats, EventLogError> {
        let mut conn = self.connection();

        let total_keys: u64 = redis::cmd("DBSIZE")
            .query_async(&mut conn)
            .await
            .map_err(|e| EventLogError::StorageUnavailable(format!("Failed to read DBSIZE: {e}")))?;

        let info: String = redis::cmd("INFO")
            .query_async(&mut conn)
            .await
            .map_err(|e| EventLogError::StorageUnavailable(format!("Failed to read INFO: {e}")))?;

        Ok(StoreStats::from_info(total_keys, &info))
    }
}
