//! Fallback log
//!
//! Terminally failed events are written for manual replay, one JSON line
//! each, to a per-destination file:
//!
//! ```text
//! <log_dir>/failed/<server>-errors-<destination>-2025-01-15T10-30-45.123.log
//!
//! {"event": {...original event...}, "error": "http status 503: overloaded"}
//! ```
//!
//! The destination id is recovered from a file name with
//! [`destination_id_from_file_name`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use courier_protocol::Event;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::common::SinkError;
use crate::util::JsonLinesWriter;

/// Subdirectory of the log dir holding fallback files
pub const FALLBACK_DIR: &str = "failed";

static FILE_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-errors-(.*)-\d{4}-\d\d-\d\dT").unwrap());

/// One fallback line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackRecord {
    pub event: Event,
    pub error: String,
}

/// Fallback file of one destination
#[derive(Debug)]
pub struct FallbackLogger {
    destination_id: String,
    writer: JsonLinesWriter,
}

impl FallbackLogger {
    /// Logger writing under `<log_dir>/failed`, timestamped now
    pub fn new(log_dir: impl AsRef<Path>, server_name: &str, destination_id: &str) -> Self {
        let path = log_dir
            .as_ref()
            .join(FALLBACK_DIR)
            .join(file_name(server_name, destination_id, Utc::now()));
        Self {
            destination_id: destination_id.to_string(),
            writer: JsonLinesWriter::new(path),
        }
    }

    #[inline]
    pub fn destination_id(&self) -> &str {
        &self.destination_id
    }

    #[inline]
    pub fn path(&self) -> &Path {
        self.writer.path()
    }

    /// Events written so far
    #[inline]
    pub fn count(&self) -> u64 {
        self.writer.lines_written()
    }

    /// Record a terminally failed event
    ///
    /// # Errors
    ///
    /// Returns an error if the fallback file cannot be written.
    pub fn log(&self, event: &Event, error: &str) -> Result<(), SinkError> {
        self.writer.write(&FallbackRecord {
            event: event.clone(),
            error: error.to_string(),
        })
    }

    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn close(&self) -> Result<(), SinkError> {
        self.writer.close()
    }
}

/// `<server>-errors-<destination>-<timestamp>.log`
pub fn file_name(server_name: &str, destination_id: &str, at: DateTime<Utc>) -> String {
    format!(
        "{server_name}-errors-{destination_id}-{}.log",
        at.format("%Y-%m-%dT%H-%M-%S%.3f")
    )
}

/// Destination id encoded in a fallback file name
pub fn destination_id_from_file_name(name: &str) -> Option<String> {
    let name = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name);
    FILE_NAME_REGEX
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|id| !id.is_empty())
}

/// Every fallback file under `log_dir`, oldest name first
///
/// # Errors
///
/// Returns an error if the fallback directory exists but cannot be read.
pub fn list_files(log_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, SinkError> {
    let dir = log_dir.as_ref().join(FALLBACK_DIR);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| destination_id_from_file_name(n).is_some())
        })
        .collect();
    files.sort();
    Ok(files)
}
