//! Append-only JSON lines file

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::common::SinkError;

/// One JSON document per line, flushed after every record
///
/// The file (and its directory) is created on the first write, so a logger
/// that never records anything leaves nothing on disk.
#[derive(Debug)]
pub struct JsonLinesWriter {
    path: PathBuf,
    file: Mutex<Option<BufWriter<File>>>,
    lines: AtomicU64,
}

impl JsonLinesWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
            lines: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written so far
    #[inline]
    pub fn lines_written(&self) -> u64 {
        self.lines.load(Ordering::Relaxed)
    }

    /// Append one record
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or the file cannot be
    /// opened or written.
    pub fn write<T: Serialize>(&self, record: &T) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record).map_err(SinkError::serialization)?;
        line.push(b'\n');

        let mut guard = self.file.lock();
        if guard.is_none() {
            *guard = Some(open(&self.path)?);
        }
        let Some(writer) = guard.as_mut() else {
            return Err(SinkError::write("log file is not open"));
        };
        writer.write_all(&line)?;
        writer.flush()?;

        self.lines.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Flush and release the file handle
    ///
    /// A later write reopens the file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn close(&self) -> Result<(), SinkError> {
        if let Some(mut writer) = self.file.lock().take() {
            writer.flush()?;
        }
        Ok(())
    }
}

fn open(path: &Path) -> Result<BufWriter<File>, SinkError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}
