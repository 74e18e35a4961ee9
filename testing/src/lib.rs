//! # Mock APIs Testing
//!
//! Testing utilities for event logs and views.
//!
//! This crate provides:
//! - [`InMemoryEventLog`]: `HashMap`-backed [`EventLog`](mockapis_core::event_log::EventLog)
//!   with the same key and overflow policy as the Redis one
//! - Deterministic clocks ([`FixedClock`], [`SteppingClock`])
//! - [`ViewTestHarness`]: Given-When-Then API for views
//! - [`init_tracing`]: log output for test runs
//!
//! ## Example
//!
//! ```ignore
//! use mockapis_testing::{InMemoryEventLog, ViewTestHarness};
//!
//! #[tokio::test]
//! async fn checking_in_marks_ticket() {
//!     ViewTestHarness::<TicketView>::new("dtinth/kio:event-1")
//!         .given(KioEvent::Register(register("ABC")))
//!         .await
//!         .given(KioEvent::CheckIn(reference("ABC")))
//!         .await
//!         .then_view(|view| assert_eq!(view.checked_in_ids.len(), 1))
//!         .await;
//! }
//! ```

mod in_memory;
mod view_harness;

use chrono::{DateTime, Utc};
use mockapis_core::environment::Clock;

/// Mock implementations of Environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use mockapis_testing::mocks::FixedClock;
    /// use mockapis_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that advances by a fixed step on every reading.
    ///
    /// Gives each appended event a distinct, increasing timestamp. Readings
    /// past the largest representable time stay pinned at
    /// [`DateTime::MAX_UTC`].
    ///
    /// # Example
    ///
    /// ```
    /// use mockapis_testing::mocks::SteppingClock;
    /// use mockapis_core::environment::Clock;
    ///
    /// let clock = SteppingClock::new(1_000, 10);
    /// assert_eq!(clock.now_millis(), 1_000);
    /// assert_eq!(clock.now_millis(), 1_010);
    /// ```
    #[derive(Debug)]
    pub struct SteppingClock {
        next_millis: AtomicI64,
        step_millis: i64,
    }

    impl SteppingClock {
        /// Start at `start_millis`, advancing `step_millis` per reading.
        #[must_use]
        pub const fn new(start_millis: i64, step_millis: i64) -> Self {
            Self {
                next_millis: AtomicI64::new(start_millis),
                step_millis,
            }
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let millis = self
                .next_millis
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |m| {
                    Some(m.saturating_add(self.step_millis))
                })
                .unwrap_or_else(|m| m);
            DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::MAX_UTC)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Install a `fmt` subscriber filtered by `RUST_LOG` (default `debug` for the
/// mockapis crates).
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(
            "mockapis_core=debug,mockapis_redis=debug,mockapis_testing=debug",
        )
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use in_memory::InMemoryEventLog;
pub use mocks::{FixedClock, SteppingClock, test_clock};
pub use view_harness::ViewTestHarness;
