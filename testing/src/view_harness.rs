//! Fluent testing API for views.
//!
//! Events go through a real [`EventStore`] over an [`InMemoryEventLog`], so the
//! encode, store, decode and replay path is the one production code takes.

#![allow(clippy::module_name_repetitions)] // ViewTestHarness is the natural name

use crate::in_memory::InMemoryEventLog;
use crate::mocks::SteppingClock;
use mockapis_core::event::Event;
use mockapis_core::event_log::{EventLog, EventLogError, EventStore};
use mockapis_core::topic::Topic;
use mockapis_core::view::View;
use serde_json::Value;
use std::sync::Arc;

/// Given-When-Then harness for a [`View`].
///
/// # Example
///
/// ```ignore
/// ViewTestHarness::<TicketView>::new("dtinth/kio:demo")
///     .given(KioEvent::Register(register("ABC")))
///     .await
///     .given_raw("refund", json!({}))
///     .then_fails(|err| assert!(err.is_unhandled_event_type()))
///     .await;
/// ```
pub struct ViewTestHarness<V: View> {
    log: InMemoryEventLog,
    store: EventStore<V::Event>,
}

impl<V: View + Default> ViewTestHarness<V> {
    /// Harness over a fresh log whose clock starts at 1 and ticks 1 ms per event.
    #[must_use]
    pub fn new(topic: impl Into<Topic>) -> Self {
        let log = InMemoryEventLog::new().with_clock(Arc::new(SteppingClock::new(1, 1)));
        Self::with_log(log, topic)
    }

    /// Harness over an existing log.
    #[must_use]
    pub fn with_log(log: InMemoryEventLog, topic: impl Into<Topic>) -> Self {
        let store = EventStore::new(Arc::new(log.clone()), topic.into());
        Self { log, store }
    }

    /// Append a domain event (Given).
    ///
    /// # Panics
    ///
    /// Panics if the append fails.
    #[allow(clippy::expect_used)] // Test code can use expect
    pub async fn given(self, event: V::Event) -> Self {
        self.store.add(event).await.expect("append should succeed");
        self
    }

    /// Append several domain events in order (Given).
    ///
    /// # Panics
    ///
    /// Panics if any append fails.
    pub async fn given_events(mut self, events: impl IntoIterator<Item = V::Event>) -> Self {
        for event in events {
            self = self.given(event).await;
        }
        self
    }

    /// Plant an untyped record, e.g. one from a newer writer's vocabulary.
    #[must_use]
    pub fn given_raw(self, event_type: &str, payload: Value) -> Self {
        let entry = serde_json::json!({
            "type": event_type,
            "payload": payload,
            "timestamp": 0,
        });
        self.log.insert_raw(self.store.topic(), entry.to_string());
        self
    }

    /// Replay the stream into a fresh view.
    ///
    /// # Errors
    ///
    /// Whatever [`View::load_from`] returns.
    pub async fn load(&self) -> Result<V, EventLogError> {
        V::default().load_from(&self.store).await
    }

    /// Replay the stream and assert on the resulting view (Then).
    ///
    /// # Panics
    ///
    /// Panics if the replay fails or the assertion does.
    #[allow(clippy::panic)] // Intentional panic for test assertions
    pub async fn then_view<F>(self, assertion: F) -> Self
    where
        F: FnOnce(&V),
    {
        match self.load().await {
            Ok(view) => assertion(&view),
            Err(e) => panic!("Expected replay to succeed, but it failed: {e}"),
        }
        self
    }

    /// Replay the stream and assert on the error it must produce (Then).
    ///
    /// # Panics
    ///
    /// Panics if the replay succeeds or the assertion fails.
    #[allow(clippy::panic)] // Intentional panic for test assertions
    pub async fn then_fails<F>(self, assertion: F) -> Self
    where
        F: FnOnce(&EventLogError),
    {
        match self.load().await {
            Ok(_) => panic!("Expected replay to fail, but it succeeded"),
            Err(e) => assertion(&e),
        }
        self
    }

    /// Every decoded event on the topic.
    ///
    /// # Errors
    ///
    /// Propagates decode failures.
    pub async fn events(&self) -> Result<Vec<Event<V::Event>>, EventLogError> {
        self.store.get().await
    }

    /// The typed store the harness writes through.
    #[must_use]
    pub const fn store(&self) -> &EventStore<V::Event> {
        &self.store
    }

    /// The storage key of the harness topic.
    #[must_use]
    pub fn key(&self) -> String {
        self.log.key_for(self.store.topic())
    }
}
