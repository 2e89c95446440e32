//! Courier - Events Cache
//!
//! Keeps the most recent events of every destination together with their
//! delivery outcome, for inspection by operators. Nothing on the delivery path
//! waits for the cache.
//!
//! # Architecture
//!
//! ```text
//! put()     --try_send--> [originals ch] --drain task--+
//! succeed() --try_send--> [succeeded ch] --drain task--+--> EventsStorage
//! error()   --try_send--> [failed ch]    --drain task--+
//! ```
//!
//! - Sends never suspend. A full channel drops the record and bumps a
//!   counter ([`CacheMetrics`]).
//! - Each drain task runs under [`supervise`], which restarts it with backoff
//!   if it panics or fails.
//! - After every insert the destination is trimmed back to its capacity by
//!   evicting the oldest entries.

mod cache;
mod error;
mod storage;
mod supervisor;

pub use cache::{CacheMetrics, CacheMetricsSnapshot, EventsCache, EventsCacheConfig};
pub use error::{CacheError, Result};
pub use storage::{CachedEvent, EventsStorage, FieldRecord, MemoryEventsStorage, SuccessRecord};
pub use supervisor::{SupervisorConfig, supervise, supervise_with};



#[cfg(test)]
#[path = "supervisor_test.rs"]
mod supervisor_test;
