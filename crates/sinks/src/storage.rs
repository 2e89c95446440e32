//! Storage abstraction
//!
//! A `Storage` is one configured destination as the rest of the server sees
//! it. The destination mode decides which entry point is used:
//!
//! | Mode | Entry point | Path |
//! |------|-------------|------|
//! | `stream` | [`Storage::consume`] | retry queue + [`DeliveryAdapter`] |
//! | `batch` | [`Storage::store_batch`] | called by the uploader with a logged file |
//! | `synchronous` | [`Storage::sync_store`] | written inline, result returned |

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use courier_config::{DestinationMode, StreamingConfig};
use courier_protocol::{Event, EventContext};
use courier_queue::RetryQueue;

use crate::common::{MetricsSnapshot, SinkError};
use crate::delivery::{AdapterConfig, Delivery, DeliveryAdapter, DeliveryHooks};
use crate::http::HttpConfig;

/// Outcome of a batch store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Rows written
    pub stored: usize,
    /// Events that could not be processed (no table name, ...)
    pub skipped: usize,
    /// Tables written to
    pub tables: usize,
}

/// One configured destination
#[async_trait]
pub trait Storage: Send + Sync {
    /// Destination id (config name)
    fn id(&self) -> &str;

    /// Destination type (`postgres`, `webhook`, ...)
    fn kind(&self) -> &str;

    fn mode(&self) -> DestinationMode;

    /// Accept a stream-mode event; only enqueues
    ///
    /// # Errors
    ///
    /// Fails if the event cannot be processed or enqueued, or the storage is
    /// not in stream mode.
    fn consume(&self, token_id: &str, event: Event) -> Result<(), SinkError>;

    /// Write a batch of logged events
    ///
    /// # Errors
    ///
    /// Fails if any table write fails; the caller retries the whole file.
    async fn store_batch(&self, file_name: &str, events: Vec<Event>)
    -> Result<BatchResult, SinkError>;

    /// Write one event inline and return its context with the result
    ///
    /// # Errors
    ///
    /// Returns the processing or write error.
    async fn sync_store(&self, token_id: &str, event: Event) -> Result<EventContext, SinkError>;

    fn metrics(&self) -> MetricsSnapshot;

    /// Requests waiting for delivery (stream mode)
    fn queue_size(&self) -> u64 {
        0
    }

    /// Stop delivery and release resources
    ///
    /// # Errors
    ///
    /// Returns the first resource that failed to close.
    async fn close(&self) -> Result<(), SinkError>;
}

/// Settings every storage is built with
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    pub adapter: AdapterConfig,
    pub http: HttpConfig,
    /// Journal directory for persistent retry queues
    pub queue_dir: Option<PathBuf>,
    pub queue_capacity: Option<usize>,
}

impl From<&StreamingConfig> for StorageOptions {
    fn from(config: &StreamingConfig) -> Self {
        Self {
            adapter: AdapterConfig::from(config),
            http: HttpConfig::from(config),
            queue_dir: config.queue_dir.as_ref().map(PathBuf::from),
            queue_capacity: config.queue_capacity,
        }
    }
}

impl StorageOptions {
    /// Retry queue for a destination, persistent when a queue dir is set
    ///
    /// # Errors
    ///
    /// Returns `Init` if the journal cannot be opened.
    pub fn open_queue<P>(&self, destination_id: &str) -> Result<RetryQueue<P>, SinkError>
    where
        P: serde::Serialize + serde::de::DeserializeOwned + Clone + Send + Sync + 'static,
    {
        match &self.queue_dir {
            Some(dir) => RetryQueue::persistent(destination_id, dir, self.queue_capacity)
                .map_err(|e| SinkError::init(format!("retry queue for '{destination_id}': {e}"))),
            None => Ok(RetryQueue::in_memory(destination_id, self.queue_capacity)),
        }
    }
}

/// How a storage reaches its delivery
///
/// Stream mode wraps the delivery in an adapter; other modes call it inline.
pub(crate) enum Transport<D: Delivery> {
    Queued(DeliveryAdapter<D>),
    Direct(D),
}

impl<D: Delivery> Transport<D> {
    pub(crate) fn open(
        destination_id: &str,
        mode: DestinationMode,
        delivery: D,
        hooks: Arc<dyn DeliveryHooks>,
        options: &StorageOptions,
    ) -> Result<Self, SinkError> {
        match mode {
            DestinationMode::Stream => {
                let queue = options.open_queue(destination_id)?;
                Ok(Self::Queued(DeliveryAdapter::start(
                    queue,
                    delivery,
                    hooks,
                    options.adapter,
                )))
            }
            DestinationMode::Batch | DestinationMode::Synchronous => Ok(Self::Direct(delivery)),
        }
    }

    pub(crate) fn delivery(&self) -> &D {
        match self {
            Self::Queued(adapter) => adapter.delivery(),
            Self::Direct(delivery) => delivery,
        }
    }

    pub(crate) fn send_async(
        &self,
        kind: &str,
        payload: D::Payload,
        context: EventContext,
    ) -> Result<(), SinkError> {
        match self {
            Self::Queued(adapter) => adapter.send_async(payload, context),
            Self::Direct(_) => Err(SinkError::unsupported(kind, "stream consume outside stream mode")),
        }
    }

    pub(crate) fn metrics(&self) -> MetricsSnapshot {
        match self {
            Self::Queued(adapter) => adapter.metrics(),
            Self::Direct(_) => MetricsSnapshot::default(),
        }
    }

    pub(crate) fn queue_size(&self) -> u64 {
        match self {
            Self::Queued(adapter) => adapter.queue_size(),
            Self::Direct(_) => 0,
        }
    }

    pub(crate) async fn close(&self) -> Result<(), SinkError> {
        match self {
            Self::Queued(adapter) => adapter.close().await,
            Self::Direct(delivery) => delivery.close().await,
        }
    }
}
