//! Event records and per-domain event vocabularies.
//!
//! Events are immutable facts recorded against a topic. They exist in two
//! shapes:
//!
//! - [`RawEvent`]: the storage-boundary record. The payload is an untyped
//!   `serde_json::Value`; this is what an [`EventLog`](crate::event_log::EventLog)
//!   persists and returns.
//! - [`Event<E>`]: the domain-boundary record. `E` is a closed tagged union
//!   declared with [`define_events!`](crate::define_events), so every event type
//!   name maps to exactly one payload type.
//!
//! # Wire format
//!
//! One JSON object per event:
//!
//! ```json
//! {"type":"checkIn","payload":{"referenceCode":"ABC"},"timestamp":1717000000000}
//! ```
//!
//! # Example
//!
//! ```
//! use mockapis_core::define_events;
//! use mockapis_core::event::{Event, EventSchema, RawEvent};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! pub struct Sent {
//!     pub to: String,
//!     pub text: String,
//! }
//!
//! define_events! {
//!     pub enum SmsEvent {
//!         Sent(Sent) = "sent",
//!     }
//! }
//!
//! let raw = RawEvent::new("sent", serde_json::json!({"to": "0812", "text": "hi"}), 1);
//! let event = Event::<SmsEvent>::from_raw(&raw).unwrap();
//! assert_eq!(event.event_type(), "sent");
//! ```

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Error types for event encoding, decoding and dispatch.
#[derive(Error, Debug)]
pub enum EventError {
    /// The event type is not part of the reader's vocabulary, or a view has no
    /// handler registered for it.
    ///
    /// This signals schema drift between the writer and the reader of a stream.
    #[error("Unhandled event type: {0}")]
    UnhandledEventType(String),

    /// The event type is known but the record does not fit its payload shape.
    #[error("Malformed {event_type} event: {reason}")]
    MalformedEvent {
        /// Type name carried by the record.
        event_type: String,
        /// Decoder message.
        reason: String,
    },

    /// Failed to serialize an event.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),
}

/// A stored event with an untyped payload.
///
/// Serializes to `{"type": ..., "payload": ..., "timestamp": ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Event type name, e.g. `"checkIn"`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Type-specific payload.
    pub payload: Value,

    /// Append time in milliseconds since the Unix epoch.
    pub timestamp: Timestamp,
}

impl RawEvent {
    /// Create a new raw event.
    #[must_use]
    pub fn new(event_type: impl Into<String>, payload: Value, timestamp: Timestamp) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp,
        }
    }

    /// Serialize to the single-line JSON stored as one list entry.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if the payload cannot be
    /// rendered as JSON (only possible for non-string map keys).
    pub fn to_json(&self) -> Result<String, EventError> {
        serde_json::to_string(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }

    /// Parse one stored list entry.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::MalformedEvent`] if the entry is not a JSON object
    /// with `type`, `payload` and `timestamp` fields.
    pub fn from_json(data: &str) -> Result<Self, EventError> {
        serde_json::from_str(data).map_err(|e| EventError::MalformedEvent {
            event_type: "<unknown>".to_string(),
            reason: e.to_string(),
        })
    }
}

impl fmt::Display for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawEvent {{ type: {}, timestamp: {} }}", self.event_type, self.timestamp)
    }
}

/// A closed vocabulary of event types for one domain.
///
/// Implemented by [`define_events!`](crate::define_events); implementing it by
/// hand is possible as long as the type serializes as an adjacently tagged
/// union (`{"type": ..., "payload": ...}`) and `EVENT_TYPES` lists every tag.
pub trait EventSchema: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    /// Every event type name in this vocabulary.
    const EVENT_TYPES: &'static [&'static str];

    /// The type name of this event.
    fn event_type(&self) -> &'static str;

    /// Whether `event_type` belongs to this vocabulary.
    #[must_use]
    fn declares(event_type: &str) -> bool {
        Self::EVENT_TYPES.contains(&event_type)
    }
}

/// A typed event: a domain event plus the time it was appended.
#[derive(Clone, Debug, PartialEq)]
pub struct Event<E> {
    /// The domain event (type and payload).
    pub event: E,

    /// Append time in milliseconds since the Unix epoch.
    pub timestamp: Timestamp,
}

impl<E: EventSchema> Event<E> {
    /// Create a typed event.
    #[must_use]
    pub const fn new(event: E, timestamp: Timestamp) -> Self {
        Self { event, timestamp }
    }

    /// The type name of the wrapped event.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }

    /// Decode a stored record into this vocabulary.
    ///
    /// # Errors
    ///
    /// - [`EventError::UnhandledEventType`] if the record's type is not declared by `E`
    /// - [`EventError::MalformedEvent`] if the payload does not match the declared shape
    pub fn from_raw(raw: &RawEvent) -> Result<Self, EventError> {
        if !E::declares(&raw.event_type) {
            return Err(EventError::UnhandledEventType(raw.event_type.clone()));
        }

        let tagged = serde_json::json!({
            "type": raw.event_type,
            "payload": raw.payload,
        });
        let event = serde_json::from_value(tagged).map_err(|e| EventError::MalformedEvent {
            event_type: raw.event_type.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            event,
            timestamp: raw.timestamp,
        })
    }

    /// Split the domain event into its type name and JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if `E` does not serialize to a
    /// tagged object.
    pub fn encode(event: &E) -> Result<(&'static str, Value), EventError> {
        let value =
            serde_json::to_value(event).map_err(|e| EventError::SerializationError(e.to_string()))?;

        match value {
            Value::Object(mut fields) => {
                let payload = fields.remove("payload").unwrap_or(Value::Null);
                Ok((event.event_type(), payload))
            }
            other => Err(EventError::SerializationError(format!(
                "expected a tagged object for {}, got {other}",
                event.event_type()
            ))),
        }
    }

    /// Convert back into a storage record.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if the event cannot be encoded.
    pub fn to_raw(&self) -> Result<RawEvent, EventError> {
        let (event_type, payload) = Self::encode(&self.event)?;
        Ok(RawEvent::new(event_type, payload, self.timestamp))
    }
}

/// Declare a domain's event vocabulary.
///
/// Each variant maps one event type name to one payload type. The generated
/// enum serializes adjacently tagged, matching the stored record layout, and
/// implements [`EventSchema`]. The calling crate must depend on `serde`, which
/// it already does for its payload types.
///
/// # Example
///
/// ```
/// use mockapis_core::define_events;
/// use mockapis_core::event::EventSchema;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Debug, Serialize, Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// pub struct CheckIn {
///     pub reference_code: String,
/// }
///
/// define_events! {
///     /// Kiosk events.
///     pub enum KioskEvent {
///         CheckIn(CheckIn) = "checkIn",
///         UndoCheckIn(CheckIn) = "undoCheckIn",
///     }
/// }
///
/// assert_eq!(KioskEvent::EVENT_TYPES, &["checkIn", "undoCheckIn"]);
/// ```
#[macro_export]
macro_rules! define_events {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident($payload:ty) = $tag:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            ::std::clone::Clone,
            ::std::fmt::Debug,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        #[serde(tag = "type", content = "payload")]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                #[serde(rename = $tag)]
                $variant($payload),
            )+
        }

        impl $crate::event::EventSchema for $name {
            const EVENT_TYPES: &'static [&'static str] = &[$($tag),+];

            fn event_type(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => $tag,)+
                }
            }
        }
    };
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests can unwrap
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Registered {
        ticket_type_id: u32,
        reference_code: String,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Reference {
        reference_code: String,
    }

    define_events! {
        #[derive(PartialEq)]
        enum TestEvent {
            Register(Registered) = "register",
            CheckIn(Reference) = "checkIn",
        }
    }

    #[test]
    fn raw_event_wire_format() {
        let raw = RawEvent::new("checkIn", json!({"referenceCode": "ABC"}), 1_700_000_000_000);
        let encoded: Value = serde_json::from_str(&raw.to_json().unwrap()).unwrap();

        assert_eq!(
            encoded,
            json!({
                "type": "checkIn",
                "payload": {"referenceCode": "ABC"},
                "timestamp": 1_700_000_000_000_i64
            })
        );
    }

    #[test]
    fn raw_event_rejects_garbage() {
        let result = RawEvent::from_json("not json");
        assert!(matches!(result, Err(EventError::MalformedEvent { .. })));

        let result = RawEvent::from_json(r#"{"type":"x","payload":null}"#);
        assert!(matches!(result, Err(EventError::MalformedEvent { .. })));
    }

    #[test]
    fn vocabulary_lists_every_tag() {
        assert_eq!(TestEvent::EVENT_TYPES, &["register", "checkIn"]);
        assert!(TestEvent::declares("checkIn"));
        assert!(!TestEvent::declares("undoCheckIn"));
    }

    #[test]
    fn typed_event_from_raw() {
        let raw = RawEvent::new(
            "register",
            json!({"ticketTypeId": 10001, "referenceCode": "ABC"}),
            42,
        );
        let event = Event::<TestEvent>::from_raw(&raw).unwrap();

        assert_eq!(event.timestamp, 42);
        assert_eq!(event.event_type(), "register");
        assert_eq!(
            event.event,
            TestEvent::Register(Registered {
                ticket_type_id: 10001,
                reference_code: "ABC".to_string(),
            })
        );
    }

    #[test]
    fn undeclared_type_is_unhandled() {
        let raw = RawEvent::new("undoCheckIn", json!({"referenceCode": "ABC"}), 1);
        let result = Event::<TestEvent>::from_raw(&raw);

        assert!(matches!(result, Err(EventError::UnhandledEventType(t)) if t == "undoCheckIn"));
    }

    #[test]
    fn payload_shape_mismatch_is_malformed() {
        let raw = RawEvent::new("checkIn", json!({"refCode": 7}), 1);
        let result = Event::<TestEvent>::from_raw(&raw);

        assert!(matches!(
            result,
            Err(EventError::MalformedEvent { event_type, .. }) if event_type == "checkIn"
        ));
    }

    #[test]
    fn encode_splits_type_and_payload() {
        let event = TestEvent::CheckIn(Reference {
            reference_code: "XYZ".to_string(),
        });
        let (event_type, payload) = Event::encode(&event).unwrap();

        assert_eq!(event_type, "checkIn");
        assert_eq!(payload, json!({"referenceCode": "XYZ"}));
    }

    #[test]
    fn typed_event_back_to_raw() {
        let event = Event::new(
            TestEvent::CheckIn(Reference {
                reference_code: "XYZ".to_string(),
            }),
            99,
        );
        let raw = event.to_raw().unwrap();

        assert_eq!(raw, RawEvent::new("checkIn", json!({"referenceCode": "XYZ"}), 99));
    }

    #[test]
    fn raw_event_display() {
        let raw = RawEvent::new("sent", Value::Null, 5);
        assert_eq!(format!("{raw}"), "RawEvent { type: sent, timestamp: 5 }");
    }
}
