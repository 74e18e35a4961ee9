//! Redis list-backed event log.
//!
//! # Storage layout
//!
//! Each topic is one Redis list:
//!
//! - **Key**: `{namespace}:{encodeURIComponent(topic)[..100]}`
//! - **Entries**: one JSON event record per element, appended with `RPUSH`
//! - **Read**: `LRANGE key 0 -1`
//!
//! # Overflow
//!
//! Before each append, `MEMORY USAGE key` is compared against the ceiling. If
//! the stored size plus the new entry would exceed it, the key is deleted and
//! the new entry pushed in the same `MULTI`/`EXEC`, so the list restarts with
//! exactly one element.
//!
//! `MEMORY USAGE` includes Redis' own per-key overhead, so resets happen a
//! little before the raw entry bytes reach the ceiling.

use crate::config::RedisConfig;
use mockapis_core::environment::{Clock, SystemClock};
use mockapis_core::event::RawEvent;
use mockapis_core::event_log::{EventLog, EventLogError, LogFuture, LogPolicies, decode_entries};
use mockapis_core::topic::Topic;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use serde_json::Value;
use std::sync::Arc;

/// Redis-backed [`EventLog`].
///
/// Provides:
/// - Topic-scoped append-only lists
/// - Reset-on-overflow size bounding per topic
/// - Connection pooling and reconnection via `ConnectionManager`
///
/// Construct one at startup and share it (it is cheap to clone). The
/// connection closes when the last clone is dropped.
///
/// # Example
///
/// ```no_run
/// use mockapis_core::event_log::EventLog;
/// use mockapis_core::topic::Topic;
/// use mockapis_redis::RedisEventLog;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let log = RedisEventLog::new("redis://127.0.0.1:6379").await?;
/// log.append(&Topic::new("line:U123"), "pushed", serde_json::json!({})).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisEventLog {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
    policies: LogPolicies,
    clock: Arc<dyn Clock>,
}

impl RedisEventLog {
    /// Connect with default policies.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::StorageUnavailable`] if connection to Redis fails.
    pub async fn new(redis_url: &str) -> Result<Self, EventLogError> {
        Self::connect(&RedisConfig::new(redis_url)).await
    }

    /// Connect using a full configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::StorageUnavailable`] if connection to Redis fails.
    pub async fn connect(config: &RedisConfig) -> Result<Self, EventLogError> {
        let client = Client::open(config.url.as_str()).map_err(|e| {
            EventLogError::StorageUnavailable(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            EventLogError::StorageUnavailable(format!(
                "Failed to create Redis connection manager: {e}"
            ))
        })?;

        tracing::info!(
            namespace = %config.event_log.namespace,
            max_stream_bytes = config.event_log.max_stream_bytes,
            "Connected Redis event log"
        );

        Ok(Self {
            conn_manager,
            policies: config.event_log.policies(),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock used to stamp appended events.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The key and overflow policies in effect.
    #[must_use]
    pub const fn policies(&self) -> &LogPolicies {
        &self.policies
    }

    /// A clone of the underlying connection, for callers that need raw access
    /// (statistics, test cleanup).
    #[must_use]
    pub fn connection(&self) -> ConnectionManager {
        self.conn_manager.clone()
    }

    /// Bytes Redis attributes to `key`; `0` when the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::StorageUnavailable`] if the command fails.
    pub async fn memory_usage(&self, key: &str) -> Result<u64, EventLogError> {
        let mut conn = self.conn_manager.clone();
        let usage: Option<u64> = redis::cmd("MEMORY")
            .arg("USAGE")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("measure stream size", &e))?;
        Ok(usage.unwrap_or(0))
    }

    /// Delete a topic's stream.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::StorageUnavailable`] if the command fails.
    pub async fn clear(&self, topic: &Topic) -> Result<(), EventLogError> {
        let mut conn = self.conn_manager.clone();
        let key = self.key_for(topic);
        let _: i64 = conn
            .del(&key)
            .await
            .map_err(|e| unavailable("delete stream", &e))?;
        Ok(())
    }

    async fn append_event(
        &self,
        topic: &Topic,
        event_type: &str,
        payload: Value,
    ) -> Result<RawEvent, EventLogError> {
        let key = self.key_for(topic);
        let event = RawEvent::new(event_type, payload, self.clock.now_millis());
        let data = event.to_json()?;

        let usage = self.memory_usage(&key).await?;
        let mut conn = self.conn_manager.clone();

        let length: i64 = if self.policies.overflow.should_reset(usage, data.len()) {
            tracing::warn!(
                key = %key,
                usage_bytes = usage,
                incoming_bytes = data.len(),
                max_stream_bytes = self.policies.overflow.max_stream_bytes(),
                "Event stream over size ceiling, discarding history"
            );

            let (length,): (i64,) = redis::pipe()
                .atomic()
                .del(&key)
                .ignore()
                .rpush(&key, data.as_str())
                .query_async(&mut conn)
                .await
                .map_err(|e| unavailable("reset stream", &e))?;
            length
        } else {
            conn.rpush(&key, data.as_str())
                .await
                .map_err(|e| unavailable("append event", &e))?
        };

        tracing::debug!(
            key = %key,
            event_type = %event.event_type,
            stream_length = length,
            "Appended event"
        );

        Ok(event)
    }

    async fn read_events(&self, topic: &Topic) -> Result<Vec<RawEvent>, EventLogError> {
        let key = self.key_for(topic);
        let mut conn = self.conn_manager.clone();

        let entries: Vec<String> = conn
            .lrange(&key, 0, -1)
            .await
            .map_err(|e| unavailable("read stream", &e))?;

        tracing::debug!(key = %key, events = entries.len(), "Read event stream");

        decode_entries(&key, entries)
    }
}

impl EventLog for RedisEventLog {
    fn append<'a>(
        &'a self,
        topic: &'a Topic,
        event_type: &'a str,
        payload: Value,
    ) -> LogFuture<'a, RawEvent> {
        Box::pin(self.append_event(topic, event_type, payload))
    }

    fn read<'a>(&'a self, topic: &'a Topic) -> LogFuture<'a, Vec<RawEvent>> {
        Box::pin(self.read_events(topic))
    }

    fn key_for(&self, topic: &Topic) -> String {
        self.policies.keys.key_for(topic)
    }
}

impl std::fmt::Debug for RedisEventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisEventLog")
            .field("policies", &self.policies)
            .finish_non_exhaustive()
    }
}

fn unavailable(operation: &str, error: &RedisError) -> EventLogError {
    EventLogError::StorageUnavailable(format!("Failed to {operation}: {error}"))
}
