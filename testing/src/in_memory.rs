//! In-memory event log for fast, deterministic tests.

use mockapis_core::config::EventLogConfig;
use mockapis_core::environment::{Clock, SystemClock};
use mockapis_core::event::RawEvent;
use mockapis_core::event_log::{EventLog, EventLogError, LogFuture, LogPolicies, decode_entries};
use mockapis_core::topic::Topic;
use serde_json::Value;
use std::collections::HashMap;
use std::future;
use std::sync::{Arc, RwLock};

type Streams = HashMap<String, Vec<String>>;

/// `HashMap`-backed [`EventLog`].
///
/// Stores the same serialized JSON entries under the same keys as the Redis
/// log, and applies the same overflow rule. Stored size is the sum of the
/// entries' byte lengths (Redis adds its own per-key overhead on top).
///
/// Clones share storage.
///
/// # Example
///
/// ```
/// use mockapis_core::event_log::EventLog;
/// use mockapis_core::topic::Topic;
/// use mockapis_testing::InMemoryEventLog;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let log = InMemoryEventLog::new();
/// let topic = Topic::new("smskub:0812345678");
///
/// log.append(&topic, "sent", json!({"text": "hi"})).await.unwrap();
/// assert_eq!(log.read(&topic).await.unwrap().len(), 1);
/// assert_eq!(log.topic_count(), 1);
/// # });
/// ```
#[derive(Clone)]
pub struct InMemoryEventLog {
    streams: Arc<RwLock<Streams>>,
    policies: LogPolicies,
    clock: Arc<dyn Clock>,
}

impl InMemoryEventLog {
    /// Empty log with default policies and the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            streams: Arc::new(RwLock::new(HashMap::new())),
            policies: LogPolicies::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use the namespace, ceiling and topic length from `config`.
    #[must_use]
    pub fn with_config(mut self, config: &EventLogConfig) -> Self {
        self.policies = config.policies();
        self
    }

    /// Stamp events with `clock` instead of the system clock.
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

    /// Number of storage keys holding at least one event.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.streams.read().map_or(0, |streams| streams.len())
    }

    /// Number of events stored for `topic`.
    #[must_use]
    pub fn stream_len(&self, topic: &Topic) -> usize {
        let key = self.key_for(topic);
        self.streams
            .read()
            .map_or(0, |streams| streams.get(&key).map_or(0, Vec::len))
    }

    /// Whether no topic holds any event.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topic_count() == 0
    }

    /// Bytes stored for `topic`: the sum of its entries' lengths.
    #[must_use]
    pub fn stored_bytes(&self, topic: &Topic) -> u64 {
        let key = self.key_for(topic);
        self.streams
            .read()
            .map_or(0, |streams| streams.get(&key).map_or(0, |s| usage_of(s)))
    }

    /// Remove every stream (for test isolation).
    ///
    /// # Panics
    ///
    /// Panics if the lock was poisoned by a panicking writer.
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn clear(&self) {
        self.streams
            .write()
            .expect("in-memory event log lock poisoned")
            .clear();
    }

    /// Store an entry verbatim, bypassing encoding and the overflow check.
    ///
    /// Lets tests plant records an older writer, or a broken one, left behind.
    ///
    /// # Panics
    ///
    /// Panics if the lock was poisoned by a panicking writer.
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn insert_raw(&self, topic: &Topic, entry: impl Into<String>) {
        let key = self.key_for(topic);
        self.streams
            .write()
            .expect("in-memory event log lock poisoned")
            .entry(key)
            .or_default()
            .push(entry.into());
    }

    fn append_now(
        &self,
        topic: &Topic,
        event_type: &str,
        payload: Value,
    ) -> Result<RawEvent, EventLogError> {
        let key = self.key_for(topic);
        let event = RawEvent::new(event_type, payload, self.clock.now_millis());
        let data = event.to_json()?;

        let mut streams = self.streams.write().map_err(|_| poisoned())?;
        let stream = streams.entry(key.clone()).or_default();

        let usage = usage_of(stream);
        if self.policies.overflow.should_reset(usage, data.len()) {
            tracing::warn!(
                key = %key,
                usage_bytes = usage,
                incoming_bytes = data.len(),
                max_stream_bytes = self.policies.overflow.max_stream_bytes(),
                "Event stream over size ceiling, discarding history"
            );
            stream.clear();
        }

        stream.push(data);
        tracing::debug!(
            key = %key,
            event_type = %event.event_type,
            stream_length = stream.len(),
            "Appended event"
        );

        Ok(event)
    }

    fn read_now(&self, topic: &Topic) -> Result<Vec<RawEvent>, EventLogError> {
        let key = self.key_for(topic);
        let streams = self.streams.read().map_err(|_| poisoned())?;
        match streams.get(&key) {
            Some(entries) => decode_entries(&key, entries),
            None => Ok(Vec::new()),
        }
    }
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog for InMemoryEventLog {
    fn append<'a>(
        &'a self,
        topic: &'a Topic,
        event_type: &'a str,
        payload: Value,
    ) -> LogFuture<'a, RawEvent> {
        Box::pin(future::ready(self.append_now(topic, event_type, payload)))
    }

    fn read<'a>(&'a self, topic: &'a Topic) -> LogFuture<'a, Vec<RawEvent>> {
        Box::pin(future::ready(self.read_now(topic)))
    }

    fn key_for(&self, topic: &Topic) -> String {
        self.policies.keys.key_for(topic)
    }
}

impl std::fmt::Debug for InMemoryEventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEventLog")
            .field("policies", &self.policies)
            .field("topics", &self.topic_count())
            .finish_non_exhaustive()
    }
}

fn usage_of(entries: &[String]) -> u64 {
    entries.iter().map(|e| e.len() as u64).sum()
}

fn poisoned() -> EventLogError {
    EventLogError::StorageUnavailable("in-memory event log lock poisoned".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)] // Tests can unwrap and panic
mod tests {
    use super::*;
    use crate::mocks::SteppingClock;
    use serde_json::json;

    fn log() -> InMemoryEventLog {
        InMemoryEventLog::new().with_clock(Arc::new(SteppingClock::new(1, 1)))
    }

    #[tokio::test]
    async fn stores_entries_in_wire_format() {
        let log = log();
        let topic = Topic::new("t");
        log.append(&topic, "sent", json!({"a": 1})).await.unwrap();

        let streams = log.streams.read().unwrap();
        assert_eq!(
            streams.get("mockapis:events:t").unwrap(),
            &vec![r#"{"type":"sent","payload":{"a":1},"timestamp":1}"#.to_string()]
        );
    }

    #[tokio::test]
    async fn reset_happens_only_above_ceiling() {
        // {"type":"x","payload":0,"timestamp":N} is 38 bytes for a one-digit N.
        let config = EventLogConfig::default().with_max_stream_bytes(80);
        let log = log().with_config(&config);
        let topic = Topic::new("t");

        log.append(&topic, "x", json!(0)).await.unwrap();
        log.append(&topic, "x", json!(0)).await.unwrap();
        assert_eq!(log.stored_bytes(&topic), 76);
        assert_eq!(log.stream_len(&topic), 2);

        log.append(&topic, "x", json!(0)).await.unwrap();
        assert_eq!(log.stream_len(&topic), 1);
        assert_eq!(log.read(&topic).await.unwrap()[0].timestamp, 3);
    }

    #[tokio::test]
    async fn planted_garbage_fails_read() {
        let log = log();
        let topic = Topic::new("t");
        log.insert_raw(&topic, "{not json");

        let result = log.read(&topic).await;
        assert!(matches!(
            result,
            Err(EventLogError::MalformedEvent { key, .. }) if key == "mockapis:events:t"
        ));
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let log = log();
        log.append(&Topic::new("a"), "x", json!(null)).await.unwrap();
        log.append(&Topic::new("b"), "x", json!(null)).await.unwrap();
        assert_eq!(log.topic_count(), 2);

        log.clear();
        assert!(log.is_empty());
        assert!(log.read(&Topic::new("a")).await.unwrap().is_empty());
    }

    #[test]
    fn clones_share_storage() {
        let log = log();
        let other = log.clone();
        other.insert_raw(&Topic::new("t"), r#"{"type":"x","payload":null,"timestamp":0}"#);
        assert_eq!(log.stream_len(&Topic::new("t")), 1);
    }

    #[tokio::test]
    async fn stream_len_counts_one_topic_while_is_empty_spans_all() {
        let log = log();
        let busy = Topic::new("busy");
        let idle = Topic::new("idle");
        log.append(&busy, "x", json!(1)).await.unwrap();
        log.append(&busy, "x", json!(2)).await.unwrap();

        assert_eq!(log.stream_len(&busy), 2);
        assert_eq!(log.stream_len(&idle), 0);
        assert!(!log.is_empty());
    }

    fn poison(log: &InMemoryEventLog) {
        let streams = Arc::clone(&log.streams);
        let _ = std::thread::spawn(move || {
            let _guard = streams.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
    }

    #[tokio::test]
    async fn poisoned_lock_is_reported_as_unavailable() {
        let log = log();
        poison(&log);

        let result = log.append(&Topic::new("t"), "x", json!(1)).await;
        assert!(matches!(result, Err(EventLogError::StorageUnavailable(_))));
        let result = log.read(&Topic::new("t")).await;
        assert!(matches!(result, Err(EventLogError::StorageUnavailable(_))));
    }

    #[test]
    #[should_panic(expected = "lock poisoned")]
    fn clear_on_poisoned_lock_panics() {
        let log = log();
        poison(&log);
        log.clear();
    }

    #[test]
    #[should_panic(expected = "lock poisoned")]
    fn insert_raw_on_poisoned_lock_panics() {
        let log = log();
        poison(&log);
        log.insert_raw(&Topic::new("t"), "{}");
    }
}
