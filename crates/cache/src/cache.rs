//! EventsCache front end and drain tasks

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use courier_protocol::{Event, EventContext};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{CacheError, Result};
use crate::storage::{CachedEvent, EventsStorage, FieldRecord, SuccessRecord};
use crate::supervisor::supervise;

/// Column type recorded when the written table does not know a field
const UNKNOWN_TYPE: &str = "UNKNOWN";

/// Events cache settings
#[derive(Debug, Clone, Copy)]
pub struct EventsCacheConfig {
    /// Events kept per destination
    pub capacity_per_destination: usize,

    /// Buffer size of each of the three channels
    pub channel_size: usize,
}

impl Default for EventsCacheConfig {
    fn default() -> Self {
        Self {
            capacity_per_destination: 100,
            channel_size: 10_000,
        }
    }
}

/// Cache counters
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub stored: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub evicted: AtomicU64,
    pub dropped: AtomicU64,
    pub rejected: AtomicU64,
    pub storage_errors: AtomicU64,
}

impl CacheMetrics {
    #[inline]
    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            stored: self.stored.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            storage_errors: self.storage_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub stored: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub evicted: u64,
    /// Records lost to full channels
    pub dropped: u64,
    /// Records without an event id
    pub rejected: u64,
    pub storage_errors: u64,
}

#[derive(Debug)]
enum CacheMessage {
    Original {
        destination_id: String,
        event_id: String,
        event: Event,
    },
    Succeed(Box<EventContext>),
    Failed {
        destination_id: String,
        event_id: String,
        error: String,
    },
}

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<CacheMessage>>>;

/// Lossy asynchronous cache of recent events per destination
pub struct EventsCache {
    storage: Arc<dyn EventsStorage>,
    originals: mpsc::Sender<CacheMessage>,
    succeeded: mpsc::Sender<CacheMessage>,
    failed: mpsc::Sender<CacheMessage>,
    metrics: Arc<CacheMetrics>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for EventsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventsCache")
            .field("metrics", &self.metrics.snapshot())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl EventsCache {
    /// Create the cache and start its drain tasks
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(storage: Arc<dyn EventsStorage>, config: EventsCacheConfig) -> Self {
        let channel_size = config.channel_size.max(1);
        let (originals, originals_rx) = mpsc::channel(channel_size);
        let (succeeded, succeeded_rx) = mpsc::channel(channel_size);
        let (failed, failed_rx) = mpsc::channel(channel_size);

        let metrics = Arc::new(CacheMetrics::default());
        let cancel = CancellationToken::new();
        let worker = Worker {
            storage: Arc::clone(&storage),
            metrics: Arc::clone(&metrics),
            capacity: config.capacity_per_destination,
        };

        let tasks = [
            ("events-cache-originals", originals_rx),
            ("events-cache-succeeded", succeeded_rx),
            ("events-cache-failed", failed_rx),
        ]
        .into_iter()
        .map(|(name, rx)| {
            let rx: SharedReceiver = Arc::new(tokio::sync::Mutex::new(rx));
            let cancel_task = cancel.clone();
            let worker = worker.clone();
            supervise(name, cancel.clone(), move || {
                drain(Arc::clone(&rx), cancel_task.clone(), worker.clone())
            })
        })
        .collect();

        Self {
            storage,
            originals,
            succeeded,
            failed,
            metrics,
            cancel,
            tasks: Mutex::new(tasks),
            closed: AtomicBool::new(false),
        }
    }

    /// Record an accepted event
    pub fn put(&self, cache_disabled: bool, destination_id: &str, event_id: &str, event: &Event) {
        if cache_disabled || self.is_closed() || !self.accept_id(destination_id, event_id) {
            return;
        }
        self.send(
            &self.originals,
            CacheMessage::Original {
                destination_id: destination_id.to_string(),
                event_id: event_id.to_string(),
                event: event.clone(),
            },
        );
    }

    /// Record a successful delivery
    pub fn succeed(&self, context: &EventContext) {
        if context.cache_disabled
            || self.is_closed()
            || !self.accept_id(&context.destination_id, &context.event_id)
        {
            return;
        }
        self.send(
            &self.succeeded,
            CacheMessage::Succeed(Box::new(context.clone())),
        );
    }

    /// Record a delivery error
    pub fn error(&self, cache_disabled: bool, destination_id: &str, event_id: &str, error: &str) {
        if cache_disabled || self.is_closed() || !self.accept_id(destination_id, event_id) {
            return;
        }
        self.send(
            &self.failed,
            CacheMessage::Failed {
                destination_id: destination_id.to_string(),
                event_id: event_id.to_string(),
                error: error.to_string(),
            },
        );
    }

    /// Up to `n` most recent events of a destination, newest first
    ///
    /// # Errors
    ///
    /// Returns the storage error.
    pub async fn get_n(&self, destination_id: &str, n: usize) -> Result<Vec<CachedEvent>> {
        self.storage.get_n(destination_id, n).await
    }

    /// Number of cached events of a destination
    ///
    /// # Errors
    ///
    /// Returns the storage error.
    pub async fn get_total(&self, destination_id: &str) -> Result<usize> {
        self.storage.get_total(destination_id).await
    }

    #[inline]
    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop accepting records, flush what is queued and close the storage
    ///
    /// # Errors
    ///
    /// Returns the storage close error. A second call returns `Closed`.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(CacheError::Closed);
        }
        self.cancel.cancel();

        let tasks: Vec<_> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "events cache task did not stop cleanly");
            }
        }
        self.storage.close().await
    }

    fn accept_id(&self, destination_id: &str, event_id: &str) -> bool {
        if event_id.is_empty() {
            CacheMetrics::incr(&self.metrics.rejected);
            tracing::debug!(destination = %destination_id, "event without id is not cached");
            return false;
        }
        true
    }

    fn send(&self, channel: &mpsc::Sender<CacheMessage>, message: CacheMessage) {
        if channel.try_send(message).is_err() {
            let dropped = self.metrics.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(dropped, "events cache channel full, record dropped");
        }
    }
}

async fn drain(receiver: SharedReceiver, cancel: CancellationToken, worker: Worker) -> Result<()> {
    let mut rx = receiver.lock().await;
    loop {
        tokio::select! {
            biased;
            message = rx.recv() => match message {
                Some(message) => worker.handle(message).await,
                None => return Ok(()),
            },
            () = cancel.cancelled() => break,
        }
    }
    while let Ok(message) = rx.try_recv() {
        worker.handle(message).await;
    }
    Ok(())
}

#[derive(Clone)]
struct Worker {
    storage: Arc<dyn EventsStorage>,
    metrics: Arc<CacheMetrics>,
    capacity: usize,
}

impl Worker {
    async fn handle(&self, message: CacheMessage) {
        let result = match message {
            CacheMessage::Original {
                destination_id,
                event_id,
                event,
            } => self.store_original(&destination_id, &event_id, &event).await,
            CacheMessage::Succeed(context) => self.store_succeed(&context).await,
            CacheMessage::Failed {
                destination_id,
                event_id,
                error,
            } => self.store_error(&destination_id, &event_id, error).await,
        };

        match result {
            Ok(()) => {}
            Err(e @ CacheError::NotFound { .. }) => {
                CacheMetrics::incr(&self.metrics.storage_errors);
                tracing::error!(error = %e, "status update for an event that is not cached");
            }
            Err(e) => {
                CacheMetrics::incr(&self.metrics.storage_errors);
                tracing::warn!(error = %e, "events cache write failed");
            }
        }
    }

    async fn store_original(
        &self,
        destination_id: &str,
        event_id: &str,
        event: &Event,
    ) -> Result<()> {
        let original = serde_json::to_string(event)?;
        self.storage.insert(destination_id, event_id, original).await?;
        CacheMetrics::incr(&self.metrics.stored);

        while self.storage.get_total(destination_id).await? > self.capacity {
            if self.storage.evict_oldest(destination_id).await?.is_none() {
                break;
            }
            CacheMetrics::incr(&self.metrics.evicted);
        }
        Ok(())
    }

    async fn store_succeed(&self, context: &EventContext) -> Result<()> {
        let mut record = SuccessRecord {
            table: context.table.as_ref().map(|t| t.name.clone()),
            fields: Vec::new(),
            http_request: context.http_request.clone(),
        };

        if let Some(table) = &context.table {
            for (field, value) in context.effective_event().iter() {
                let sql_type = match table.column_type(field) {
                    Some(sql_type) => sql_type.to_string(),
                    None => {
                        tracing::warn!(
                            destination = %context.destination_id,
                            table = %table.name,
                            field = %field,
                            "written field has no column type"
                        );
                        UNKNOWN_TYPE.to_string()
                    }
                };
                record.fields.push(FieldRecord {
                    field: field.clone(),
                    sql_type,
                    value: value.clone(),
                });
            }
        }

        self.storage
            .update_succeed(&context.destination_id, &context.event_id, record)
            .await?;
        CacheMetrics::incr(&self.metrics.succeeded);
        Ok(())
    }

    async fn store_error(
        &self,
        destination_id: &str,
        event_id: &str,
        error: String,
    ) -> Result<()> {
        self.storage
            .update_error(destination_id, event_id, error)
            .await?;
        CacheMetrics::incr(&self.metrics.failed);
        Ok(())
    }
}
