//! Queue error types

use std::io;

use thiserror::Error;

/// Result type for queue operations
pub type Result<T> = std::result::Result<T, QueueError>;

/// Queue errors
#[derive(Debug, Error)]
pub enum QueueError {
    /// Queue was closed; no more pushes or pops
    #[error("queue is closed")]
    Closed,

    /// Bounded queue is at capacity
    #[error("queue is full (capacity {capacity})")]
    Full {
        /// Configured capacity
        capacity: usize,
    },

    /// Journal file could not be read or written
    #[error("queue journal '{path}': {source}")]
    Journal {
        /// Journal path
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Queue record could not be encoded
    #[error("failed to encode queue record: {0}")]
    Encode(#[from] serde_json::Error),
}

impl QueueError {
    /// Create a Journal error
    #[inline]
    pub fn journal(path: impl Into<String>, source: io::Error) -> Self {
        Self::Journal {
            path: path.into(),
            source,
        }
    }

    /// Whether the error means the queue is shut down
    #[inline]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
