//! Topic-scoped, append-only event log and its typed per-domain handle.
//!
//! # Design
//!
//! The [`EventLog`] trait is the storage boundary. It knows nothing about
//! domain vocabularies: it appends and reads [`RawEvent`]s keyed by [`Topic`].
//! Each implementation owns two policies defined here:
//!
//! - [`StorageKeyPolicy`]: how a topic becomes a namespaced storage key
//! - [`OverflowPolicy`]: when a topic's stream is discarded before an append
//!
//! Overflow is a full reset, not a sliding window. When the stored size of a
//! topic plus the incoming entry would exceed the ceiling, every existing entry
//! for that topic is deleted and the new event becomes the only one. Callers
//! must tolerate losing history on busy topics.
//!
//! [`EventStore<E>`] is the typed handle a domain works with: it fixes the topic
//! and the vocabulary `E`, so call sites never repeat the schema.
//!
//! # Implementations
//!
//! - `RedisEventLog` (in `mockapis-redis`): Redis lists, production
//! - `InMemoryEventLog` (in `mockapis-testing`): `HashMap`, deterministic tests
//!
//! # Example
//!
//! ```no_run
//! use mockapis_core::event_log::{EventLog, EventLogError};
//! use mockapis_core::topic::Topic;
//! use serde_json::json;
//!
//! async fn example(log: &dyn EventLog) -> Result<(), EventLogError> {
//!     let topic = Topic::new("smskub:0812345678");
//!
//!     let event = log.append(&topic, "sent", json!({"text": "hello"})).await?;
//!     let all = log.read(&topic).await?;
//!     assert_eq!(all.last(), Some(&event));
//!
//!     Ok(())
//! }
//! ```

use crate::event::{Event, EventError, EventSchema, RawEvent};
use crate::topic::{StorageKeyPolicy, Topic};
use serde_json::Value;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Default ceiling on the stored size of one topic, in bytes.
pub const DEFAULT_MAX_STREAM_BYTES: u64 = 16 * 1024;

/// Boxed future returned by [`EventLog`] methods.
pub type LogFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, EventLogError>> + Send + 'a>>;

/// Errors that can occur during event log operations.
#[derive(Error, Debug)]
pub enum EventLogError {
    /// The backing store could not be reached or rejected the operation.
    ///
    /// Not retried. The caller decides how to surface it.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A stored entry could not be parsed as an event record.
    #[error("Malformed event in {key}: {reason}")]
    MalformedEvent {
        /// Storage key the entry was read from.
        key: String,
        /// Parser message.
        reason: String,
    },

    /// Encoding, decoding or dispatching an event failed.
    #[error(transparent)]
    Event(#[from] EventError),
}

impl EventLogError {
    /// Whether this error reports an event type with no decoder or handler.
    #[must_use]
    pub const fn is_unhandled_event_type(&self) -> bool {
        matches!(self, Self::Event(EventError::UnhandledEventType(_)))
    }
}

/// Decides whether a topic's stream must be reset before an append.
///
/// # Examples
///
/// ```
/// use mockapis_core::event_log::OverflowPolicy;
///
/// let policy = OverflowPolicy::default();
/// assert!(!policy.should_reset(16_000, 384));
/// assert!(policy.should_reset(16_000, 385));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverflowPolicy {
    max_stream_bytes: u64,
}

impl OverflowPolicy {
    /// Create a policy with the given per-topic ceiling.
    #[must_use]
    pub const fn new(max_stream_bytes: u64) -> Self {
        Self { max_stream_bytes }
    }

    /// The per-topic ceiling in bytes.
    #[must_use]
    pub const fn max_stream_bytes(&self) -> u64 {
        self.max_stream_bytes
    }

    /// `true` when `current_usage + incoming` is strictly above the ceiling.
    #[must_use]
    pub const fn should_reset(&self, current_usage: u64, incoming: usize) -> bool {
        current_usage.saturating_add(incoming as u64) > self.max_stream_bytes
    }
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STREAM_BYTES)
    }
}

/// Durable, topic-partitioned, append-only event storage.
///
/// # Ordering
///
/// Within one topic, read order is append order. Concurrent appends to the same
/// topic are linearized by the backing store's native list push; which writer
/// lands first is unspecified. There is no ordering across topics.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one instance is created at startup and
/// shared (usually as `Arc<dyn EventLog>`) by every request.
///
/// # Dyn Compatibility
///
/// Methods return boxed futures instead of `async fn` so the trait can be used
/// as a trait object.
pub trait EventLog: Send + Sync {
    /// Append an event to `topic`, stamping it with the current time.
    ///
    /// Before pushing, the implementation measures the topic's stored size. If
    /// adding the serialized event would exceed the ceiling, the whole existing
    /// stream is deleted first.
    ///
    /// Returns the constructed event so it can be applied to a view without
    /// reading the stream again.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable`: backing store failure
    /// - `Event(SerializationError)`: the payload cannot be rendered as JSON
    fn append<'a>(
        &'a self,
        topic: &'a Topic,
        event_type: &'a str,
        payload: Value,
    ) -> LogFuture<'a, RawEvent>;

    /// Read every event currently stored for `topic`, oldest first.
    ///
    /// A topic that was never appended to yields an empty vector.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable`: backing store failure
    /// - `MalformedEvent`: a stored entry is not a valid event record
    fn read<'a>(&'a self, topic: &'a Topic) -> LogFuture<'a, Vec<RawEvent>>;

    /// The storage key this log uses for `topic`.
    fn key_for(&self, topic: &Topic) -> String;
}

/// Parse stored list entries, failing on the first malformed one.
///
/// # Errors
///
/// Returns [`EventLogError::MalformedEvent`] naming `key` for the first entry
/// that is not a valid event record.
pub fn decode_entries<I, S>(key: &str, entries: I) -> Result<Vec<RawEvent>, EventLogError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    entries
        .into_iter()
        .map(|entry| {
            RawEvent::from_json(entry.as_ref()).map_err(|e| EventLogError::MalformedEvent {
                key: key.to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Typed handle over one topic of an [`EventLog`] for one event vocabulary.
///
/// Cheap to construct; build one per request.
///
/// # Example
///
/// ```no_run
/// use mockapis_core::define_events;
/// use mockapis_core::event_log::{EventLog, EventLogError, EventStore};
/// use mockapis_core::topic::Topic;
/// use serde::{Deserialize, Serialize};
/// use std::sync::Arc;
///
/// #[derive(Clone, Debug, Serialize, Deserialize)]
/// pub struct Posted {
///     pub text: String,
/// }
///
/// define_events! {
///     pub enum ChannelEvent {
///         Posted(Posted) = "posted",
///     }
/// }
///
/// async fn post(log: Arc<dyn EventLog>) -> Result<(), EventLogError> {
///     let store = EventStore::<ChannelEvent>::new(log, Topic::new("slack:C01"));
///     store.add(ChannelEvent::Posted(Posted { text: "hi".into() })).await?;
///     let history = store.get().await?;
///     assert!(!history.is_empty());
///     Ok(())
/// }
/// ```
pub struct EventStore<E> {
    log: Arc<dyn EventLog>,
    topic: Topic,
    _schema: PhantomData<fn() -> E>,
}

impl<E> Clone for EventStore<E> {
    fn clone(&self) -> Self {
        Self {
            log: Arc::clone(&self.log),
            topic: self.topic.clone(),
            _schema: PhantomData,
        }
    }
}

impl<E: EventSchema> EventStore<E> {
    /// Bind a vocabulary to a topic of `log`.
    #[must_use]
    pub fn new(log: Arc<dyn EventLog>, topic: Topic) -> Self {
        Self {
            log,
            topic,
            _schema: PhantomData,
        }
    }

    /// The topic this handle reads and writes.
    #[must_use]
    pub const fn topic(&self) -> &Topic {
        &self.topic
    }

    /// The storage key backing this handle's topic.
    #[must_use]
    pub fn key(&self) -> String {
        self.log.key_for(&self.topic)
    }

    /// Append a domain event and return it with its timestamp.
    ///
    /// # Errors
    ///
    /// Propagates [`EventLog::append`] failures; returns
    /// [`EventLogError::Event`] if the event cannot be encoded.
    pub async fn add(&self, event: E) -> Result<Event<E>, EventLogError> {
        let (event_type, payload) = Event::encode(&event)?;
        let raw = self.log.append(&self.topic, event_type, payload).await?;
        Ok(Event::new(event, raw.timestamp))
    }

    /// Read and decode every event on this topic, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates [`EventLog::read`] failures; returns [`EventLogError::Event`]
    /// for a record whose type is not in `E` or whose payload does not fit.
    pub async fn get(&self) -> Result<Vec<Event<E>>, EventLogError> {
        let raw = self.log.read(&self.topic).await?;
        raw.iter()
            .map(|r| Event::from_raw(r).map_err(EventLogError::from))
            .collect()
    }

    /// Read the undecoded records, for introspection and debugging dumps.
    ///
    /// # Errors
    ///
    /// Propagates [`EventLog::read`] failures.
    pub async fn get_raw(&self) -> Result<Vec<RawEvent>, EventLogError> {
        self.log.read(&self.topic).await
    }
}

impl<E> std::fmt::Debug for EventStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

/// Shared pieces every [`EventLog`] implementation needs.
#[derive(Clone, Debug, Default)]
pub struct LogPolicies {
    /// Topic to storage key mapping.
    pub keys: StorageKeyPolicy,
    /// Per-topic size ceiling.
    pub overflow: OverflowPolicy,
}

impl LogPolicies {
    /// Bundle a key policy and an overflow policy.
    #[must_use]
    pub const fn new(keys: StorageKeyPolicy, overflow: OverflowPolicy) -> Self {
        Self { keys, overflow }
    }
}
