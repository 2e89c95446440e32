//! Observer loop and worker pool

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use courier_config::StreamingConfig;
use courier_protocol::EventContext;
use courier_queue::{RetryQueue, RetryableRequest};
use parking_lot::Mutex;
use tokio::sync::{Semaphore, TryAcquireError};
use tokio::task::JoinHandle;

use super::policy::{RetryDecision, RetryPolicy};
use super::{Delivery, DeliveryHooks};
use crate::common::{MetricsSnapshot, SinkError, SinkMetrics};

/// Worker pool and retry settings
#[derive(Debug, Clone, Copy)]
pub struct AdapterConfig {
    /// Concurrent deliveries
    pub threads_count: usize,

    pub policy: RetryPolicy,

    /// Observer sleep while the pool is saturated or only deferred requests
    /// are queued
    pub idle_poll: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            threads_count: 10,
            policy: RetryPolicy::default(),
            idle_poll: Duration::from_millis(50),
        }
    }
}

impl From<&StreamingConfig> for AdapterConfig {
    fn from(config: &StreamingConfig) -> Self {
        Self {
            threads_count: config.threads_count,
            policy: RetryPolicy::from(config),
            ..Self::default()
        }
    }
}

/// Queue-backed retrying delivery for one destination
pub struct DeliveryAdapter<D: Delivery> {
    shared: Arc<Shared<D>>,
    observer: Mutex<Option<JoinHandle<()>>>,
}

struct Shared<D: Delivery> {
    id: String,
    queue: RetryQueue<D::Payload>,
    delivery: D,
    hooks: Arc<dyn DeliveryHooks>,
    policy: RetryPolicy,
    pool: Arc<Semaphore>,
    idle_poll: Duration,
    closed: AtomicBool,
    metrics: SinkMetrics,
}

impl<D: Delivery> DeliveryAdapter<D> {
    /// Spawn the observer over `queue`
    ///
    /// Requests already in the queue (restored from a journal) are picked up
    /// immediately. Must be called inside a tokio runtime.
    pub fn start(
        queue: RetryQueue<D::Payload>,
        delivery: D,
        hooks: Arc<dyn DeliveryHooks>,
        config: AdapterConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            id: queue.id().to_string(),
            queue,
            delivery,
            hooks,
            policy: config.policy,
            pool: Arc::new(Semaphore::new(config.threads_count.max(1))),
            idle_poll: config.idle_poll,
            closed: AtomicBool::new(false),
            metrics: SinkMetrics::new(),
        });

        let observer = tokio::spawn(observe(Arc::clone(&shared)));
        Self {
            shared,
            observer: Mutex::new(Some(observer)),
        }
    }

    /// Destination id
    #[inline]
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// The wrapped delivery, for inline (synchronous) writes
    #[inline]
    pub fn delivery(&self) -> &D {
        &self.shared.delivery
    }

    /// Enqueue a first attempt
    ///
    /// # Errors
    ///
    /// Fails fast once the adapter is closed, or when a bounded queue is full.
    pub fn send_async(&self, payload: D::Payload, context: EventContext) -> Result<(), SinkError> {
        if self.is_closed() {
            self.shared.metrics.dropped();
            return Err(SinkError::closed(&self.shared.id));
        }
        match self.shared.queue.add(payload, context) {
            Ok(()) => {
                self.shared.metrics.enqueued();
                Ok(())
            }
            Err(err) => {
                self.shared.metrics.dropped();
                Err(err.into())
            }
        }
    }

    #[inline]
    pub fn queue_size(&self) -> u64 {
        self.shared.queue.size()
    }

    #[inline]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Stop scheduling, close the queue and the delivery
    ///
    /// In-flight attempts are not cancelled. Requests still pending in an
    /// in-memory queue go to `on_error` with fallback; a persistent queue
    /// keeps them for the next start. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns the queue compaction or delivery close error.
    pub async fn close(&self) -> Result<(), SinkError> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let queue_result = self.shared.queue.close();
        self.shared.pool.close();

        let observer = self.observer.lock().take();
        if let Some(observer) = observer {
            if let Err(e) = observer.await {
                tracing::warn!(destination = %self.shared.id, error = %e, "delivery observer failed");
            }
        }

        let abandoned = self.shared.queue.drain();
        if !abandoned.is_empty() {
            tracing::warn!(
                destination = %self.shared.id,
                pending = abandoned.len(),
                "delivery adapter closed with pending requests"
            );
            let err = SinkError::closed(&self.shared.id);
            for request in &abandoned {
                self.shared.fail(&request.context, &err);
            }
        }

        let delivery_result = self.shared.delivery.close().await;
        tracing::debug!(
            destination = %self.shared.id,
            pending = self.shared.queue.size(),
            "delivery adapter closed"
        );

        queue_result?;
        delivery_result
    }
}

impl<D: Delivery> Drop for DeliveryAdapter<D> {
    fn drop(&mut self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.shared.queue.close();
        self.shared.pool.close();
        if let Some(observer) = self.observer.lock().take() {
            observer.abort();
        }
        let err = SinkError::closed(&self.shared.id);
        for request in self.shared.queue.drain() {
            self.shared.fail(&request.context, &err);
        }
    }
}

impl<D: Delivery> std::fmt::Debug for DeliveryAdapter<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryAdapter")
            .field("id", &self.shared.id)
            .field("queue_size", &self.shared.queue.size())
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn observe<D: Delivery>(shared: Arc<Shared<D>>) {
    let mut not_due_streak: u64 = 0;

    while !shared.closed.load(Ordering::Acquire) {
        let permit = match Arc::clone(&shared.pool).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                tokio::time::sleep(shared.idle_poll).await;
                continue;
            }
            Err(TryAcquireError::Closed) => break,
        };

        let request = match shared.queue.dequeue_block().await {
            Ok(request) => request,
            Err(err) if err.is_closed() => break,
            Err(err) => {
                tracing::warn!(destination = %shared.id, error = %err, "dequeue failed");
                tokio::time::sleep(shared.idle_poll).await;
                continue;
            }
        };

        if !request.is_due(Utc::now()) {
            drop(permit);
            shared.requeue(request);

            // a full cycle of deferred requests: back off instead of spinning
            not_due_streak += 1;
            if not_due_streak >= shared.queue.size().max(1) {
                not_due_streak = 0;
                tokio::time::sleep(shared.idle_poll).await;
            }
            continue;
        }
        not_due_streak = 0;

        let worker = Arc::clone(&shared);
        tokio::spawn(async move {
            worker.process(request).await;
            drop(permit);
        });
    }

    tracing::debug!(destination = %shared.id, "delivery observer stopped");
}

impl<D: Delivery> Shared<D> {
    async fn process(&self, mut request: RetryableRequest<D::Payload>) {
        match self
            .delivery
            .deliver(&request.payload, &mut request.context)
            .await
        {
            Ok(()) => {
                self.metrics.delivered(1);
                tracing::trace!(
                    destination = %self.id,
                    event_id = %request.context.event_id,
                    attempt = request.retry + 1,
                    "delivered"
                );
                self.hooks.on_success(&request.context);
            }
            Err(err) => self.retry(request, err),
        }
    }

    fn retry(&self, mut request: RetryableRequest<D::Payload>, err: SinkError) {
        match self.policy.decide(request.retry, self.queue.size()) {
            RetryDecision::Retry(delay) => {
                request.schedule_retry(delay);
                let attempt = request.retry;
                let context = request.context.clone();
                match self.queue.add_request(request) {
                    Ok(()) => {
                        self.metrics.retried();
                        tracing::warn!(
                            destination = %self.id,
                            event_id = %context.event_id,
                            retry = attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "delivery failed, scheduled retry"
                        );
                        self.hooks.on_error(false, &context, &err);
                    }
                    Err(queue_err) => {
                        tracing::warn!(
                            destination = %self.id,
                            event_id = %context.event_id,
                            error = %queue_err,
                            "cannot re-enqueue failed request"
                        );
                        self.fail(&context, &err);
                    }
                }
            }
            RetryDecision::Fallback => self.fail(&request.context, &err),
        }
    }

    fn requeue(&self, request: RetryableRequest<D::Payload>) {
        let context = request.context.clone();
        if let Err(err) = self.queue.add_request(request) {
            self.fail(&context, &err.into());
        }
    }

    fn fail(&self, context: &EventContext, err: &SinkError) {
        self.metrics.fallback();
        tracing::error!(
            destination = %self.id,
            event_id = %context.event_id,
            error = %err,
            "delivery failed permanently"
        );
        self.hooks.on_error(true, context, err);
    }
}
