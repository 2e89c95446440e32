//! Events cache error types

use thiserror::Error;

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Events cache errors
///
/// These never reach the delivery path; drain tasks log them.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Status update for an event that was never stored (or was evicted)
    #[error("event '{event_id}' of destination '{destination_id}' is not cached")]
    NotFound {
        destination_id: String,
        event_id: String,
    },

    /// Backing storage failed
    #[error("events storage: {0}")]
    Storage(String),

    /// Event could not be serialized
    #[error("failed to serialize cached event: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cache was closed
    #[error("events cache is closed")]
    Closed,
}

impl CacheError {
    /// Create a NotFound error
    #[inline]
    pub fn not_found(destination_id: impl Into<String>, event_id: impl Into<String>) -> Self {
        Self::NotFound {
            destination_id: destination_id.into(),
            event_id: event_id.into(),
        }
    }

    /// Create a storage error
    #[inline]
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
