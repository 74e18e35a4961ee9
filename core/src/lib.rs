//! # Mock APIs Core
//!
//! Event log and view projection traits shared by every mock API endpoint.
//!
//! A mock endpoint records each request it receives as an event on a topic,
//! and rebuilds whatever state it needs by replaying that topic's events into
//! a view. This crate provides:
//!
//! - [`topic`]: topic identifiers and storage key sanitization
//! - [`event`]: event records, per-domain vocabularies, [`define_events!`]
//! - [`event_log`]: the [`EventLog`](event_log::EventLog) storage trait, overflow
//!   policy and the typed [`EventStore`](event_log::EventStore) handle
//! - [`view`]: the [`View`](view::View) replay contract and
//!   [`EventHandler`](view::EventHandler) dispatch tables
//! - [`config`]: environment-driven configuration
//! - [`environment`]: injected clock
//!
//! ## Request flow
//!
//! ```text
//! request ─▶ topic ─▶ EventStore::add ─▶ EventLog::append (reset on overflow)
//!                         │
//!                         └─▶ View::load_from ─▶ EventLog::read ─▶ fold ─▶ response
//! ```
//!
//! ## Example
//!
//! ```ignore
//! let store = EventStore::<KioEvent>::new(log, Topic::scoped("dtinth/kio", event_id));
//! let view = TicketView::default().load_from(&store).await?;
//! ```

pub use chrono::{DateTime, Utc};

pub mod config;
pub mod event;
pub mod event_log;
pub mod topic;
pub mod view;

/// Environment module - injected dependencies.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use mockapis_core::environment::{Clock, SystemClock};
    ///
    /// let now = SystemClock.now_millis();
    /// assert!(now > 0);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;

        /// Current time as milliseconds since the Unix epoch, the event
        /// timestamp unit.
        fn now_millis(&self) -> i64 {
            self.now().timestamp_millis()
        }
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use config::EventLogConfig;
pub use event::{Event, EventError, EventSchema, RawEvent, Timestamp};
pub use event_log::{EventLog, EventLogError, EventStore, OverflowPolicy};
pub use topic::{StorageKeyPolicy, Topic};
pub use view::{EventHandler, View};
