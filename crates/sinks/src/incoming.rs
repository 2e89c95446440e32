//! Incoming event log
//!
//! Batch and synchronous destinations do not queue events themselves: every
//! event of a token is appended to that token's incoming log, which the
//! external uploader later replays through `Storage::store_batch`.
//!
//! ```text
//! <log_dir>/incoming/incoming.tok=<token>-2025-01-15T10-30-45.123.log
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use courier_protocol::Event;
use courier_queue::sanitize_file_name;

use crate::common::SinkError;
use crate::util::{JsonLinesWriter, RateLimitedLogger};

/// Subdirectory of the log dir holding incoming logs
pub const INCOMING_DIR: &str = "incoming";

/// Per-token log of accepted events
#[derive(Debug)]
pub struct IncomingLogger {
    token_id: String,
    writer: JsonLinesWriter,
    errors: RateLimitedLogger,
}

impl IncomingLogger {
    pub fn new(log_dir: impl AsRef<Path>, token_id: &str) -> Self {
        let path = log_dir
            .as_ref()
            .join(INCOMING_DIR)
            .join(file_name(token_id, Utc::now()));
        Self {
            token_id: token_id.to_string(),
            writer: JsonLinesWriter::new(path),
            errors: RateLimitedLogger::default_interval(token_id),
        }
    }

    #[inline]
    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    #[inline]
    pub fn path(&self) -> &Path {
        self.writer.path()
    }

    /// Events logged so far
    #[inline]
    pub fn count(&self) -> u64 {
        self.writer.lines_written()
    }

    /// Append an event
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be written. Failures are also
    /// logged, rate limited.
    pub fn log(&self, event: &Event) -> Result<(), SinkError> {
        self.writer.write(event).inspect_err(|e| {
            self.errors.error("failed to write incoming event", e);
        })
    }

    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn close(&self) -> Result<(), SinkError> {
        self.writer.close()
    }
}

/// `incoming.tok=<token>-<timestamp>.log`
///
/// Path separators and other unsafe characters in the token become `_`.
pub fn file_name(token_id: &str, at: DateTime<Utc>) -> String {
    format!(
        "incoming.tok={}-{}.log",
        sanitize_file_name(token_id),
        at.format("%Y-%m-%dT%H-%M-%S%.3f")
    )
}
