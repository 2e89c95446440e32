//! Courier - Sinks
//!
//! Destination storages and the machinery that gets events into them.
//!
//! # Architecture
//!
//! Every configured destination becomes one [`Storage`]. Stream-mode storages
//! put each event on a per-destination [`RetryQueue`] drained by a
//! [`DeliveryAdapter`]; batch and synchronous storages write inline.
//!
//! ```text
//! consume ──> [Storage] ──> [RetryQueue] ──> [DeliveryAdapter] ──> Delivery
//!                                                  │
//!                                   StorageHooks ──┴──> EventsCache / fallback log
//! ```
//!
//! # Available Storages
//!
//! | Storage | Delivery | Modes |
//! |---------|----------|-------|
//! | `webhook` | HTTP request built from templates | stream, synchronous |
//! | `sql` | Row insert after table reconciliation | stream, batch, synchronous |
//!
//! [`RetryQueue`]: courier_queue::RetryQueue

// =============================================================================
// Storage implementations
// =============================================================================

/// Webhook storage - templated HTTP requests
pub mod webhook;

/// SQL storage - dialect-independent table writes
pub mod sql;

// =============================================================================
// Delivery and processing
// =============================================================================

/// Retrying delivery adapter and policy
pub mod delivery;

/// HTTP delivery and request factories
pub mod http;

/// Mappings, table names and flattening for SQL destinations
pub mod processor;

/// Storage trait and per-mode transport
pub mod storage;

/// Delivery outcome reporting to the cache and fallback log
pub mod hooks;

// =============================================================================
// Logs
// =============================================================================

/// Fallback log of terminally failed events
pub mod fallback;

/// Per-token incoming event log for batch destinations
pub mod incoming;

/// JSON lines writer and rate-limited error logging
pub mod util;

/// Common types shared by all storages (errors, metrics)
mod common;

// =============================================================================
// Public re-exports
// =============================================================================

pub use common::{MetricsSnapshot, SinkError, SinkMetrics};
pub use delivery::{
    AdapterConfig, Delivery, DeliveryAdapter, DeliveryHooks, RetryDecision, RetryPolicy,
};
pub use fallback::{FallbackLogger, FallbackRecord};
pub use hooks::StorageHooks;
pub use http::{HttpConfig, HttpDelivery, RequestFactory, WebhookRequestFactory};
pub use incoming::IncomingLogger;
pub use processor::{ProcessedEvent, Processor};
pub use sql::{SqlStorage, TableDelivery, TableRow};
pub use storage::{BatchResult, Storage, StorageOptions};
pub use webhook::WebhookStorage;
