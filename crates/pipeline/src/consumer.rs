//! Event consumers
//!
//! Ingestion hands every event of a token to each consumer registered for
//! that token:
//!
//! ```text
//! consumers(token) ──┬──> StreamConsumer (one per stream destination) ──> Storage::consume
//!                    └──> LoggerConsumer (one per token, shared) ──> incoming log
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use courier_protocol::Event;
use courier_sinks::{IncomingLogger, SinkError, Storage};

/// Receives events accepted for a token
pub trait Consumer: Send + Sync {
    /// Accept one event; never waits on delivery
    ///
    /// # Errors
    ///
    /// Returns the storage or log error for this event only.
    fn consume(&self, event: Event) -> Result<(), SinkError>;

    /// Flush and release what the consumer owns
    ///
    /// # Errors
    ///
    /// Returns the flush error.
    fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Consumer of one stream destination under one token
///
/// Holds a handle to the destination's storage; the storage itself is closed
/// with its unit.
pub struct StreamConsumer {
    token_id: String,
    storage: Arc<dyn Storage>,
}

impl StreamConsumer {
    pub fn new(token_id: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        Self {
            token_id: token_id.into(),
            storage,
        }
    }

    #[inline]
    pub fn destination_id(&self) -> &str {
        self.storage.id()
    }
}

impl Consumer for StreamConsumer {
    fn consume(&self, event: Event) -> Result<(), SinkError> {
        self.storage.consume(&self.token_id, event)
    }
}

impl fmt::Debug for StreamConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConsumer")
            .field("token_id", &self.token_id)
            .field("destination", &self.storage.id())
            .finish()
    }
}

/// Shared consumer writing a token's events to its incoming log
///
/// One instance serves every batch and synchronous destination of a token;
/// the external uploader replays the log into them.
#[derive(Debug)]
pub struct LoggerConsumer {
    logger: IncomingLogger,
}

impl LoggerConsumer {
    pub fn new(log_dir: impl AsRef<Path>, token_id: &str) -> Self {
        Self {
            logger: IncomingLogger::new(log_dir, token_id),
        }
    }

    #[inline]
    pub fn token_id(&self) -> &str {
        self.logger.token_id()
    }

    #[inline]
    pub fn path(&self) -> &Path {
        self.logger.path()
    }

    /// Events logged so far
    #[inline]
    pub fn count(&self) -> u64 {
        self.logger.count()
    }
}

impl Consumer for LoggerConsumer {
    fn consume(&self, event: Event) -> Result<(), SinkError> {
        self.logger.log(&event)
    }

    fn close(&self) -> Result<(), SinkError> {
        self.logger.close()
    }
}
