//! # Mock APIs Redis
//!
//! Redis implementation of [`EventLog`](mockapis_core::event_log::EventLog).
//!
//! Every topic is stored as one Redis list of JSON event records. Before each
//! append the list's `MEMORY USAGE` is checked against the configured ceiling
//! (16 KiB by default); a list that would grow past it is replaced by a list
//! holding only the new event.
//!
//! ## Example
//!
//! ```no_run
//! use mockapis_redis::{RedisConfig, RedisEventLog};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let log = Arc::new(RedisEventLog::connect(&RedisConfig::from_env()?).await?);
//! let stats = log.stats().await?;
//! println!("{} keys, {:?} used", stats.total_keys, stats.used_memory_human);
//! # Ok(())
//! # }
//! ```

mod config;
mod event_log;
mod stats;

pub use config::{DEFAULT_REDIS_URL, REDIS_URL_ENV, RedisConfig};
pub use event_log::RedisEventLog;
pub use stats::StoreStats;
