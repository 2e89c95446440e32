//! Common types and utilities for storages
//!
//! Shared functionality across all destination types.

use std::sync::atomic::{AtomicU64, Ordering};

use courier_protocol::TemplateError;
use courier_queue::QueueError;
use courier_schema::SchemaError;
use thiserror::Error;

/// Delivery metrics of one destination
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Events accepted into the retry queue
    pub events_enqueued: AtomicU64,

    /// Events delivered successfully
    pub events_delivered: AtomicU64,

    /// Failed attempts scheduled for another try
    pub retries: AtomicU64,

    /// Events that ended in fallback
    pub fallbacks: AtomicU64,

    /// Events rejected before reaching the queue
    pub events_dropped: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub const fn new() -> Self {
        Self {
            events_enqueued: AtomicU64::new(0),
            events_delivered: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn enqueued(&self) {
        self.events_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn delivered(&self, count: u64) {
        self.events_delivered.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn retried(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_enqueued: self.events_enqueued.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.events_enqueued.store(0, Ordering::Relaxed);
        self.events_delivered.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
        self.fallbacks.store(0, Ordering::Relaxed);
        self.events_dropped.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time snapshot of delivery metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub events_enqueued: u64,
    pub events_delivered: u64,
    pub retries: u64,
    pub fallbacks: u64,
    pub events_dropped: u64,
}

impl MetricsSnapshot {
    /// Field-wise sum
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            events_enqueued: self.events_enqueued + other.events_enqueued,
            events_delivered: self.events_delivered + other.events_delivered,
            retries: self.retries + other.retries,
            fallbacks: self.fallbacks + other.fallbacks,
            events_dropped: self.events_dropped + other.events_dropped,
        }
    }
}

/// Common storage errors
#[derive(Debug, Error)]
pub enum SinkError {
    /// Storage initialization failed
    #[error("failed to initialize storage: {0}")]
    Init(String),

    /// Failed to write data
    #[error("write failed: {0}")]
    Write(String),

    /// Connection error (for network destinations)
    #[error("connection error: {0}")]
    Connection(String),

    /// Request did not complete within the client timeout
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Endpoint answered with a non-2xx status
    #[error("http status {status}: {body}")]
    Http { status: u16, body: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Template rendering failed for an event
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Table reconciliation or insert failed
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Retry queue rejected the request
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Operation the destination type does not support
    #[error("{kind} destinations do not support {operation}")]
    Unsupported {
        kind: String,
        operation: &'static str,
    },

    /// Storage already closed
    #[error("storage '{destination_id}' is closed")]
    Closed { destination_id: String },
}

impl SinkError {
    /// Create an initialization error
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    /// Create a write error
    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl ToString) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Create an unsupported-operation error
    pub fn unsupported(kind: impl Into<String>, operation: &'static str) -> Self {
        Self::Unsupported {
            kind: kind.into(),
            operation,
        }
    }

    /// Create a closed error
    pub fn closed(destination_id: impl Into<String>) -> Self {
        Self::Closed {
            destination_id: destination_id.into(),
        }
    }

    /// Whether the failure came from a closed storage or queue
    pub fn is_closed(&self) -> bool {
        match self {
            Self::Closed { .. } => true,
            Self::Queue(err) => err.is_closed(),
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod common_test;
