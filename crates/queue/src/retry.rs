//! Per-destination retry queue
//!
//! A `RetryQueue` holds [`RetryableRequest`] values for one destination. New
//! requests enter with `retry = 0` and are due immediately; failed requests are
//! re-enqueued by the delivery adapter with an incremented retry counter and a
//! future `dequeued_time`.
//!
//! The queue never holds back the head for a delayed element: the consumer
//! checks [`RetryableRequest::is_due`] and puts early elements back at the
//! tail.
//!
//! # Persistence
//!
//! [`RetryQueue::persistent`] journals every push and dequeue to
//! `<dir>/<destination>.queue`. Pending requests are restored in sequence
//! order when the queue is reopened.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use courier_protocol::EventContext;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::concurrent::ConcurrentQueue;
use crate::error::Result;
use crate::journal::Journal;

/// Queue element: payload, correlation context and retry bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryableRequest<P> {
    /// What the delivery sends (HTTP request, table row, ...)
    pub payload: P,

    /// Correlation record handed to the hooks
    pub context: EventContext,

    /// Failed attempts so far
    pub retry: u32,

    /// Earliest time the element may be processed
    pub dequeued_time: DateTime<Utc>,
}

impl<P> RetryableRequest<P> {
    /// Create a first-attempt request, due now
    pub fn new(payload: P, context: EventContext) -> Self {
        Self {
            payload,
            context,
            retry: 0,
            dequeued_time: Utc::now(),
        }
    }

    /// Whether the element may be processed at `now`
    #[inline]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.dequeued_time <= now
    }

    /// Count a failed attempt and defer the next one by `delay`
    pub fn schedule_retry(&mut self, delay: Duration) {
        self.retry = self.retry.saturating_add(1);
        let delay = TimeDelta::from_std(delay).unwrap_or(TimeDelta::MAX);
        self.dequeued_time = Utc::now()
            .checked_add_signed(delay)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
    }
}

type Entry<P> = (u64, RetryableRequest<P>);

/// FIFO of retryable requests for one destination
#[derive(Debug)]
pub struct RetryQueue<P> {
    id: String,
    queue: ConcurrentQueue<Entry<P>>,
    journal: Option<Journal>,
    next_seq: AtomicU64,
    closed: AtomicBool,
}

impl<P> RetryQueue<P>
where
    P: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create a queue that lives only in memory
    ///
    /// `capacity` of `None` means unbounded.
    pub fn in_memory(id: impl Into<String>, capacity: Option<usize>) -> Self {
        Self {
            id: id.into(),
            queue: new_queue(capacity),
            journal: None,
            next_seq: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Open a journaled queue under `dir`, restoring pending requests
    ///
    /// Restored requests are accepted even beyond `capacity`.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be created, read or compacted.
    pub fn persistent(
        id: impl Into<String>,
        dir: impl AsRef<Path>,
        capacity: Option<usize>,
    ) -> Result<Self> {
        let id = id.into();
        let path = dir
            .as_ref()
            .join(format!("{}.queue", sanitize_file_name(&id)));
        let (journal, pending) = Journal::open::<RetryableRequest<P>>(&path)?;

        let next_seq = pending.last().map_or(0, |(seq, _)| seq + 1);
        if !pending.is_empty() {
            tracing::info!(
                destination = %id,
                restored = pending.len(),
                "restored pending requests from queue journal"
            );
        }

        let queue = new_queue(capacity);
        queue.restore(pending);

        Ok(Self {
            id,
            queue,
            journal: Some(journal),
            next_seq: AtomicU64::new(next_seq),
            closed: AtomicBool::new(false),
        })
    }

    /// Destination this queue belongs to
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Enqueue a first-attempt request
    ///
    /// # Errors
    ///
    /// `Closed` after close, `Full` when a bounded queue is at capacity.
    pub fn add(&self, payload: P, context: EventContext) -> Result<()> {
        self.add_request(RetryableRequest::new(payload, context))
    }

    /// Enqueue an existing request (used for retries)
    ///
    /// # Errors
    ///
    /// `Closed` after close, `Full` when a bounded queue is at capacity.
    pub fn add_request(&self, request: RetryableRequest<P>) -> Result<()> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        match &self.journal {
            None => self.queue.push((seq, request)),
            Some(journal) => {
                let record = request.clone();
                journal.append_push(seq, &record, move || self.queue.push((seq, request)))
            }
        }
    }

    /// Take the head request, waiting until one is available
    ///
    /// # Errors
    ///
    /// `Closed` once the queue is closed, including for waiting callers.
    pub async fn dequeue_block(&self) -> Result<RetryableRequest<P>> {
        let (seq, request) = self.queue.pop().await?;
        if let Some(journal) = &self.journal {
            journal.append_ack(seq, || self.queue.snapshot());
        }
        Ok(request)
    }

    /// Current depth
    #[inline]
    pub fn size(&self) -> u64 {
        self.queue.len() as u64
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Whether pending requests survive a close
    #[inline]
    pub fn is_persistent(&self) -> bool {
        self.journal.is_some()
    }

    /// Remove every pending request from an in-memory queue
    ///
    /// Persistent queues keep their pending requests for the next open and
    /// return nothing.
    pub fn drain(&self) -> Vec<RetryableRequest<P>> {
        if self.journal.is_some() {
            return Vec::new();
        }
        self.queue
            .drain()
            .into_iter()
            .map(|(_, request)| request)
            .collect()
    }

    /// Close the queue, waking all blocked dequeuers
    ///
    /// Idempotent. Persistent queues compact the journal down to the requests
    /// still queued so they are restored on the next open.
    ///
    /// # Errors
    ///
    /// Returns an error if the final journal compaction fails.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.queue.close();

        if let Some(journal) = &self.journal {
            let pending = self.queue.snapshot();
            journal.compact(&pending)?;
            tracing::debug!(
                destination = %self.id,
                pending = pending.len(),
                "closed persistent queue"
            );
        }
        Ok(())
    }
}

fn new_queue<T>(capacity: Option<usize>) -> ConcurrentQueue<T> {
    match capacity {
        Some(capacity) => ConcurrentQueue::bounded(capacity),
        None => ConcurrentQueue::unbounded(),
    }
}

/// Keep ids usable as file names
pub fn sanitize_file_name(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
