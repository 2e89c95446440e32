//! Tests for the delivery adapter

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use courier_protocol::{Event, EventContext};
use courier_queue::RetryQueue;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use super::{AdapterConfig, Delivery, DeliveryAdapter, DeliveryHooks, RetryPolicy};
use crate::common::SinkError;

// =============================================================================
// Test doubles
// =============================================================================

/// Fails each payload a configured number of times, then succeeds
#[derive(Default)]
struct FlakyDelivery {
    failures: Mutex<HashMap<String, u32>>,
    attempts: AtomicU32,
    closes: AtomicU32,
    gate: Option<Arc<Semaphore>>,
}

impl FlakyDelivery {
    fn failing(payload: &str, times: u32) -> Self {
        let delivery = Self::default();
        delivery.failures.lock().insert(payload.to_string(), times);
        delivery
    }

    fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl Delivery for FlakyDelivery {
    type Payload = String;

    async fn deliver(&self, payload: &String, _context: &mut EventContext) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        let mut failures = self.failures.lock();
        match failures.get_mut(payload) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Err(SinkError::Connection("connection refused".into()))
            }
            _ => Ok(()),
        }
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingHooks {
    successes: Mutex<Vec<String>>,
    errors: Mutex<Vec<(String, bool)>>,
}

impl RecordingHooks {
    fn successes(&self) -> Vec<String> {
        self.successes.lock().clone()
    }

    fn errors(&self) -> Vec<(String, bool)> {
        self.errors.lock().clone()
    }
}

impl DeliveryHooks for RecordingHooks {
    fn on_success(&self, context: &EventContext) {
        self.successes.lock().push(context.event_id.clone());
    }

    fn on_error(&self, fallback: bool, context: &EventContext, _error: &SinkError) {
        self.errors.lock().push((context.event_id.clone(), fallback));
    }
}

fn context(event_id: &str) -> EventContext {
    let mut event = Event::new();
    event.insert("event_id", event_id);
    EventContext::new("d1", "t1", event)
}

fn config(threads: usize, retry_count: u32, delay_ms: u64) -> AdapterConfig {
    AdapterConfig {
        threads_count: threads,
        policy: RetryPolicy::new(retry_count, Duration::from_millis(delay_ms)),
        idle_poll: Duration::from_millis(5),
    }
}

fn start(
    delivery: FlakyDelivery,
    config: AdapterConfig,
) -> (DeliveryAdapter<FlakyDelivery>, Arc<RecordingHooks>) {
    let hooks = Arc::new(RecordingHooks::default());
    let adapter = DeliveryAdapter::start(
        RetryQueue::in_memory("d1", None),
        delivery,
        Arc::clone(&hooks) as Arc<dyn DeliveryHooks>,
        config,
    );
    (adapter, hooks)
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// =============================================================================
// Retry state machine
// =============================================================================

#[tokio::test]
async fn test_fails_twice_then_succeeds() {
    let (adapter, hooks) = start(FlakyDelivery::failing("p1", 2), config(2, 2, 10));

    adapter.send_async("p1".into(), context("e1")).unwrap();
    wait_for(|| !hooks.successes().is_empty()).await;

    assert_eq!(hooks.successes(), vec!["e1"]);
    assert_eq!(
        hooks.errors(),
        vec![("e1".to_string(), false), ("e1".to_string(), false)]
    );

    let metrics = adapter.metrics();
    assert_eq!(metrics.events_enqueued, 1);
    assert_eq!(metrics.events_delivered, 1);
    assert_eq!(metrics.retries, 2);
    assert_eq!(metrics.fallbacks, 0);

    adapter.close().await.unwrap();
}

#[tokio::test]
async fn test_retries_exhausted_go_to_fallback_once() {
    let (adapter, hooks) = start(FlakyDelivery::failing("p1", u32::MAX), config(2, 3, 5));

    adapter.send_async("p1".into(), context("e1")).unwrap();
    wait_for(|| hooks.errors().iter().any(|(_, fallback)| *fallback)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let errors = hooks.errors();
    assert_eq!(errors.len(), 4);
    assert!(errors[..3].iter().all(|(_, fallback)| !fallback));
    assert!(errors[3].1);
    assert!(hooks.successes().is_empty());
    assert_eq!(adapter.delivery().attempts.load(Ordering::SeqCst), 4);
    assert_eq!(adapter.queue_size(), 0);
    assert_eq!(adapter.metrics().fallbacks, 1);

    adapter.close().await.unwrap();
}

#[tokio::test]
async fn test_queue_fullness_threshold_skips_retries() {
    let gate = Arc::new(Semaphore::new(0));
    let delivery = FlakyDelivery::failing("p1", u32::MAX).gated(Arc::clone(&gate));
    let mut config = config(1, 5, 5);
    config.policy = config.policy.with_queue_fullness_threshold(2);
    let (adapter, hooks) = start(delivery, config);

    adapter.send_async("p1".into(), context("e1")).unwrap();
    wait_for(|| adapter.delivery().attempts.load(Ordering::SeqCst) == 1).await;

    // worker holds e1; the queue reaches the threshold behind it
    adapter.send_async("p2".into(), context("e2")).unwrap();
    adapter.send_async("p3".into(), context("e3")).unwrap();
    assert_eq!(adapter.queue_size(), 2);

    gate.add_permits(1);
    wait_for(|| !hooks.errors().is_empty()).await;
    assert_eq!(hooks.errors()[0], ("e1".to_string(), true));

    gate.add_permits(10);
    adapter.close().await.unwrap();
}

#[tokio::test]
async fn test_deferred_retry_does_not_block_queue() {
    let (adapter, hooks) = start(FlakyDelivery::failing("slow", 1), config(1, 3, 500));

    adapter.send_async("slow".into(), context("e1")).unwrap();
    wait_for(|| hooks.errors().len() == 1).await;

    let sent = Instant::now();
    adapter.send_async("fast".into(), context("e2")).unwrap();
    wait_for(|| hooks.successes().contains(&"e2".to_string())).await;
    assert!(sent.elapsed() < Duration::from_millis(400));
    assert!(!hooks.successes().contains(&"e1".to_string()));

    wait_for(|| hooks.successes().len() == 2).await;
    assert_eq!(hooks.successes(), vec!["e2", "e1"]);

    adapter.close().await.unwrap();
}

#[tokio::test]
async fn test_many_events_all_settle() {
    let (adapter, hooks) = start(FlakyDelivery::default(), config(4, 1, 5));

    for i in 0..100 {
        adapter
            .send_async(format!("p{i}"), context(&format!("e{i}")))
            .unwrap();
    }
    wait_for(|| hooks.successes().len() == 100).await;
    assert!(hooks.errors().is_empty());

    adapter.close().await.unwrap();
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_send_after_close_fails_fast() {
    let (adapter, _hooks) = start(FlakyDelivery::default(), config(1, 1, 5));
    adapter.close().await.unwrap();

    let err = adapter.send_async("p".into(), context("e")).unwrap_err();
    assert!(err.is_closed());
    assert_eq!(adapter.metrics().events_dropped, 1);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let (adapter, _hooks) = start(FlakyDelivery::default(), config(1, 1, 5));

    adapter.close().await.unwrap();
    adapter.close().await.unwrap();

    assert!(adapter.is_closed());
    assert_eq!(adapter.delivery().closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_close_falls_back_pending_in_memory_requests() {
    let gate = Arc::new(Semaphore::new(0));
    let (adapter, hooks) = start(
        FlakyDelivery::default().gated(Arc::clone(&gate)),
        config(1, 1, 5),
    );

    adapter.send_async("p1".into(), context("e1")).unwrap();
    wait_for(|| adapter.delivery().attempts.load(Ordering::SeqCst) == 1).await;
    adapter.send_async("p2".into(), context("e2")).unwrap();
    adapter.send_async("p3".into(), context("e3")).unwrap();

    adapter.close().await.unwrap();

    let mut errors = hooks.errors();
    errors.sort();
    assert_eq!(errors, vec![("e2".to_string(), true), ("e3".to_string(), true)]);
    assert_eq!(adapter.queue_size(), 0);
    assert_eq!(adapter.metrics().fallbacks, 2);

    // the in-flight attempt still settles exactly once
    gate.add_permits(1);
    wait_for(|| hooks.successes().len() + hooks.errors().len() == 3).await;
    assert_eq!(hooks.successes(), vec!["e1"]);
}

#[tokio::test]
async fn test_full_bounded_queue_rejects() {
    let gate = Arc::new(Semaphore::new(0));
    let hooks = Arc::new(RecordingHooks::default());
    let adapter = DeliveryAdapter::start(
        RetryQueue::in_memory("d1", Some(1)),
        FlakyDelivery::default().gated(Arc::clone(&gate)),
        hooks as Arc<dyn DeliveryHooks>,
        config(1, 1, 5),
    );

    adapter.send_async("p1".into(), context("e1")).unwrap();
    wait_for(|| adapter.delivery().attempts.load(Ordering::SeqCst) == 1).await;
    adapter.send_async("p2".into(), context("e2")).unwrap();

    let err = adapter.send_async("p3".into(), context("e3")).unwrap_err();
    assert!(matches!(err, SinkError::Queue(_)));
    assert_eq!(adapter.metrics().events_dropped, 1);

    gate.add_permits(10);
    adapter.close().await.unwrap();
}

#[tokio::test]
async fn test_persistent_queue_delivers_restored_requests() {
    let dir = tempfile::tempdir().unwrap();

    let queue: RetryQueue<String> = RetryQueue::persistent("d1", dir.path(), None).unwrap();
    queue.add("p1".into(), context("e1")).unwrap();
    queue.add("p2".into(), context("e2")).unwrap();
    queue.close().unwrap();

    let hooks = Arc::new(RecordingHooks::default());
    let adapter = DeliveryAdapter::start(
        RetryQueue::persistent("d1", dir.path(), None).unwrap(),
        FlakyDelivery::default(),
        Arc::clone(&hooks) as Arc<dyn DeliveryHooks>,
        config(1, 1, 5),
    );

    wait_for(|| hooks.successes().len() == 2).await;
    assert_eq!(hooks.successes(), vec!["e1", "e2"]);
    adapter.close().await.unwrap();
}
