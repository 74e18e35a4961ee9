//! Request-scoped views rebuilt by replaying a topic's event stream.
//!
//! # Overview
//!
//! A view is the read side of one topic. It is constructed empty, fed every
//! event of the stream in append order, used to answer one request, and then
//! dropped. Nothing is cached or persisted; the next request replays again.
//! The 16 KiB ceiling on a stream keeps the replay cost bounded.
//!
//! ```text
//! ┌──────────────┐   get()    ┌─────────────┐   handle() per event   ┌──────────┐
//! │  EventStore  │ ─────────▶ │ Vec<Event>  │ ─────────────────────▶ │   View   │
//! └──────────────┘            └─────────────┘                        └──────────┘
//! ```
//!
//! A view has two states: unpopulated (just constructed) and populated (after
//! [`View::load_from`] or [`View::replay`] returns `Ok`). Both methods consume
//! the view, so a failed replay never hands back a half-applied one.
//!
//! # Dispatch
//!
//! The usual `handle` is an exhaustive `match` over the vocabulary enum; the
//! compiler rejects a missing arm. Types the reader's enum does not declare are
//! rejected while decoding with [`EventError::UnhandledEventType`]. For views
//! that prefer a table of handlers, [`EventHandler`] gives the same guarantee at
//! runtime: an event type without a registered handler fails loudly.
//!
//! # Example
//!
//! ```
//! use mockapis_core::define_events;
//! use mockapis_core::event::{Event, EventError};
//! use mockapis_core::view::View;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! pub struct Sent {
//!     pub text: String,
//! }
//!
//! define_events! {
//!     pub enum SmsEvent {
//!         Sent(Sent) = "sent",
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Outbox {
//!     messages: Vec<String>,
//! }
//!
//! impl View for Outbox {
//!     type Event = SmsEvent;
//!
//!     fn handle(&mut self, event: &Event<SmsEvent>) -> Result<(), EventError> {
//!         match &event.event {
//!             SmsEvent::Sent(sent) => self.messages.push(sent.text.clone()),
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let events = vec![Event::new(SmsEvent::Sent(Sent { text: "hi".into() }), 1)];
//! let outbox = Outbox::default().replay(&events).unwrap();
//! assert_eq!(outbox.messages, vec!["hi"]);
//! ```

use crate::event::{Event, EventError, EventSchema};
use crate::event_log::{EventLogError, EventStore};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;

/// A projection folded from one topic's events.
pub trait View: Sized + Send {
    /// The vocabulary this view understands.
    type Event: EventSchema;

    /// Apply one event to the view's state.
    ///
    /// Must depend only on the view's current state and the event, so replaying
    /// the same stream always yields the same state.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::UnhandledEventType`] when the view cannot apply an
    /// event of this type.
    fn handle(&mut self, event: &Event<Self::Event>) -> Result<(), EventError>;

    /// Fold a sequence of events into this view, in order.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first [`View::handle`] error; the view is
    /// dropped.
    fn replay<'a, I>(mut self, events: I) -> Result<Self, EventError>
    where
        I: IntoIterator<Item = &'a Event<Self::Event>>,
    {
        for event in events {
            self.handle(event)?;
        }
        Ok(self)
    }

    /// Read the full stream of `store` and replay it into this view.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` / `MalformedEvent` from the read
    /// - `Event(UnhandledEventType)` when the stream holds a type this view
    ///   cannot handle
    fn load_from(
        self,
        store: &EventStore<Self::Event>,
    ) -> impl Future<Output = Result<Self, EventLogError>> + Send {
        async move {
            let events = store.get().await?;
            tracing::debug!(
                topic = %store.topic(),
                events = events.len(),
                "Replaying stream into view"
            );
            Ok(self.replay(&events)?)
        }
    }
}

type Handler<V, E> = Box<dyn Fn(&mut V, &Event<E>) + Send + Sync>;

/// Table-driven dispatch from event type name to handler.
///
/// # Example
///
/// ```
/// use mockapis_core::define_events;
/// use mockapis_core::event::Event;
/// use mockapis_core::view::EventHandler;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Debug, Serialize, Deserialize)]
/// pub struct Ping {}
///
/// define_events! {
///     pub enum PingEvent {
///         Ping(Ping) = "ping",
///         Pong(Ping) = "pong",
///     }
/// }
///
/// let handler = EventHandler::<u32, PingEvent>::new().on("ping", |count, _| *count += 1);
/// assert_eq!(handler.missing_handlers(), vec!["pong"]);
///
/// let mut count = 0;
/// handler.dispatch(&mut count, &Event::new(PingEvent::Ping(Ping {}), 1)).unwrap();
/// assert!(handler.dispatch(&mut count, &Event::new(PingEvent::Pong(Ping {}), 2)).is_err());
/// assert_eq!(count, 1);
/// ```
pub struct EventHandler<V, E> {
    handlers: HashMap<&'static str, Handler<V, E>>,
}

impl<V, E: EventSchema> EventHandler<V, E> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register the handler for `event_type`, replacing any previous one.
    #[must_use]
    pub fn on<F>(mut self, event_type: &'static str, handler: F) -> Self
    where
        F: Fn(&mut V, &Event<E>) + Send + Sync + 'static,
    {
        self.handlers.insert(event_type, Box::new(handler));
        self
    }

    /// Whether a handler is registered for `event_type`.
    #[must_use]
    pub fn handles(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Declared event types of `E` with no registered handler.
    #[must_use]
    pub fn missing_handlers(&self) -> Vec<&'static str> {
        E::EVENT_TYPES
            .iter()
            .copied()
            .filter(|t| !self.handlers.contains_key(t))
            .collect()
    }

    /// Invoke the handler registered for the event's type.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::UnhandledEventType`] if no handler is registered.
    pub fn dispatch(&self, view: &mut V, event: &Event<E>) -> Result<(), EventError> {
        let event_type = event.event_type();
        match self.handlers.get(event_type) {
            Some(handler) => {
                handler(view, event);
                Ok(())
            }
            None => Err(EventError::UnhandledEventType(event_type.to_string())),
        }
    }
}

impl<V, E: EventSchema> Default for EventHandler<V, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> fmt::Debug for EventHandler<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.handlers.keys().collect();
        types.sort_unstable();
        f.debug_struct("EventHandler").field("handles", &types).finish()
    }
}
