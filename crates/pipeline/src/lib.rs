//! Courier - Pipeline
//!
//! The runtime directory of destinations and the consumers ingestion feeds.
//!
//! # Architecture
//!
//! ```text
//! [ConfigWatcher] ──payload──> [DestinationRegistry] ──StorageFactory──> DestinationUnit
//!                                      │
//! ingestion ──consumers(token)─────────┴──> Consumer::consume(event)
//! ```
//!
//! # Key Design
//!
//! - **Hash-diffed reconcile**: unchanged destinations keep running untouched
//! - **Close before replace**: a changed destination is fully closed before
//!   its replacement starts, so two units never share a name
//! - **Snapshot lookups**: `consumers`/`storages` clone out of a read lock
//!   and never wait on reconciliation work
//! - **Shared incoming log**: batch and synchronous destinations of a token
//!   share one refcounted logger consumer

mod consumer;
mod error;
mod factory;
mod registry;
mod unit;
mod watcher;

#[cfg(test)]
mod testing;

pub use consumer::{Consumer, LoggerConsumer, StreamConsumer};
pub use error::{CloseErrors, PipelineError, Result};
pub use factory::{DefaultStorageFactory, SqlAdapterProvider, StorageFactory};
pub use registry::{DestinationRegistry, ReconcileSummary};
pub use unit::DestinationUnit;
pub use watcher::{ConfigWatcher, ConfigWatcherConfig, ConfigWatcherHandle};
