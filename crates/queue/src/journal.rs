//! Append-only queue journal
//!
//! Persistent retry queues record every push and every dequeue as one JSON
//! line:
//!
//! ```text
//! {"op":"push","seq":17,"item":{...}}
//! {"op":"ack","seq":17}
//! ```
//!
//! Replaying the file yields the pushes without a matching ack, ordered by
//! sequence number. The journal is compacted (rewritten with only pending
//! pushes) when opened, when the queue closes, and every
//! [`COMPACT_AFTER_ACKS`] acknowledgements.
//!
//! Dequeued requests are acknowledged immediately, so a request that is in
//! flight when the process dies is not replayed. A failed request that is
//! retried is pushed again under a new sequence number.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{QueueError, Result};

/// Acks between compactions
pub(crate) const COMPACT_AFTER_ACKS: u64 = 10_000;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum Record<R> {
    Push { seq: u64, item: R },
    Ack { seq: u64 },
}

#[derive(Debug)]
struct JournalState {
    writer: BufWriter<File>,
    acks_since_compaction: u64,
}

/// Append-only journal backing a persistent queue
#[derive(Debug)]
pub(crate) struct Journal {
    path: PathBuf,
    state: Mutex<JournalState>,
}

impl Journal {
    /// Open (or create) a journal and return the pending items, oldest first
    pub(crate) fn open<R>(path: &Path) -> Result<(Self, Vec<(u64, R)>)>
    where
        R: Serialize + DeserializeOwned,
    {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| journal_error(path, e))?;
        }

        let pending = replay::<R>(path)?;
        rewrite(path, &pending)?;

        let writer = open_append(path)?;
        let journal = Self {
            path: path.to_path_buf(),
            state: Mutex::new(JournalState {
                writer,
                acks_since_compaction: 0,
            }),
        };
        Ok((journal, pending))
    }

    /// Record a push
    ///
    /// `push` runs under the journal lock so that compaction never observes
    /// a pushed item without its record. A journal write failure is logged
    /// and not returned: the in-memory queue already owns the item.
    pub(crate) fn append_push<R, F>(&self, seq: u64, item: &R, push: F) -> Result<()>
    where
        R: Serialize,
        F: FnOnce() -> Result<()>,
    {
        let line = serde_json::to_string(&Record::Push { seq, item })?;

        let mut state = self.state.lock();
        push()?;
        if let Err(e) = write_line(&mut state.writer, &line) {
            tracing::warn!(
                journal = %self.path.display(),
                seq,
                error = %e,
                "failed to journal queued request, it will not survive a restart"
            );
        }
        Ok(())
    }

    /// Record a dequeue, compacting when enough acks accumulated
    pub(crate) fn append_ack<R, F>(&self, seq: u64, snapshot: F)
    where
        R: Serialize,
        F: FnOnce() -> Vec<(u64, R)>,
    {
        let mut state = self.state.lock();
        let line = match serde_json::to_string(&Record::<()>::Ack { seq }) {
            Ok(line) => line,
            Err(_) => return,
        };
        if let Err(e) = write_line(&mut state.writer, &line) {
            tracing::warn!(journal = %self.path.display(), seq, error = %e, "failed to journal ack");
            return;
        }

        state.acks_since_compaction += 1;
        if state.acks_since_compaction >= COMPACT_AFTER_ACKS {
            let pending = snapshot();
            match self.compact_locked(&mut state, &pending) {
                Ok(()) => tracing::debug!(
                    journal = %self.path.display(),
                    pending = pending.len(),
                    "compacted queue journal"
                ),
                Err(e) => tracing::warn!(
                    journal = %self.path.display(),
                    error = %e,
                    "queue journal compaction failed"
                ),
            }
        }
    }

    /// Rewrite the journal with exactly `pending`
    pub(crate) fn compact<R: Serialize>(&self, pending: &[(u64, R)]) -> Result<()> {
        let mut state = self.state.lock();
        self.compact_locked(&mut state, pending)
    }

    fn compact_locked<R: Serialize>(
        &self,
        state: &mut JournalState,
        pending: &[(u64, R)],
    ) -> Result<()> {
        state
            .writer
            .flush()
            .map_err(|e| journal_error(&self.path, e))?;
        rewrite(&self.path, pending)?;
        state.writer = open_append(&self.path)?;
        state.acks_since_compaction = 0;
        Ok(())
    }
}

fn replay<R: DeserializeOwned>(path: &Path) -> Result<Vec<(u64, R)>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(journal_error(path, e)),
    };

    let mut pushes = std::collections::BTreeMap::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| journal_error(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Record<R>>(&line) {
            Ok(Record::Push { seq, item }) => {
                pushes.insert(seq, item);
            }
            Ok(Record::Ack { seq }) => {
                pushes.remove(&seq);
            }
            Err(e) => {
                // A torn final line after a crash is expected; skip anything unreadable.
                tracing::warn!(
                    journal = %path.display(),
                    line = line_no + 1,
                    error = %e,
                    "skipping unreadable queue journal record"
                );
            }
        }
    }
    Ok(pushes.into_iter().collect())
}

fn rewrite<R: Serialize>(path: &Path, pending: &[(u64, R)]) -> Result<()> {
    let tmp = path.with_extension("queue.tmp");
    {
        let file = File::create(&tmp).map_err(|e| journal_error(&tmp, e))?;
        let mut writer = BufWriter::new(file);
        for (seq, item) in pending {
            let line = serde_json::to_string(&Record::Push { seq: *seq, item })?;
            writeln!(writer, "{line}").map_err(|e| journal_error(&tmp, e))?;
        }
        writer.flush().map_err(|e| journal_error(&tmp, e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| journal_error(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| journal_error(path, e))
}

fn open_append(path: &Path) -> Result<BufWriter<File>> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(BufWriter::new)
        .map_err(|e| journal_error(path, e))
}

fn write_line(writer: &mut BufWriter<File>, line: &str) -> io::Result<()> {
    writeln!(writer, "{line}")?;
    writer.flush()
}

fn journal_error(path: &Path, source: io::Error) -> QueueError {
    QueueError::journal(path.display().to_string(), source)
}
