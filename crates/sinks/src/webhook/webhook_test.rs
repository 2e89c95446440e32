//! Tests for the webhook storage

use std::sync::Arc;
use std::time::Duration;

use courier_cache::{EventsCache, EventsCacheConfig, MemoryEventsStorage};
use courier_config::{DestinationConfig, DestinationMode};
use courier_protocol::{Event, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::WebhookStorage;
use crate::common::SinkError;
use crate::delivery::{AdapterConfig, RetryPolicy};
use crate::fallback::{FallbackLogger, FallbackRecord};
use crate::hooks::StorageHooks;
use crate::storage::{Storage, StorageOptions};

fn event(id: &str) -> Event {
    Event::from_json(format!(r#"{{"event_id": "{id}", "event_type": "click"}}"#).as_bytes())
        .unwrap()
}

fn options(retry_count: u32) -> StorageOptions {
    StorageOptions {
        adapter: AdapterConfig {
            threads_count: 2,
            policy: RetryPolicy::new(retry_count, Duration::from_millis(10)),
            idle_poll: Duration::from_millis(5),
        },
        ..StorageOptions::default()
    }
}

fn hooks(log_dir: &std::path::Path, cache: Option<Arc<EventsCache>>) -> Arc<StorageHooks> {
    Arc::new(StorageHooks::new(
        "hook",
        cache,
        FallbackLogger::new(log_dir, "courier", "hook"),
    ))
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

// =============================================================================
// Stream mode
// =============================================================================

#[tokio::test]
async fn test_stream_delivers_events() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook/click"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = DestinationConfig::new("webhook")
        .with_webhook(format!("{}/hook/{{{{ .event_type }}}}", server.uri()));
    let storage = WebhookStorage::new("hook", &config, hooks(dir.path(), None), &options(0)).unwrap();

    for i in 0..3 {
        storage.consume("t1", event(&format!("e{i}"))).unwrap();
    }
    wait_for(|| storage.metrics().events_delivered == 3).await;

    let metrics = storage.metrics();
    assert_eq!(metrics.events_enqueued, 3);
    assert_eq!(metrics.fallbacks, 0);
    storage.close().await.unwrap();
}

#[tokio::test]
async fn test_stream_success_reaches_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(EventsCache::new(
        Arc::new(MemoryEventsStorage::new()),
        EventsCacheConfig::default(),
    ));
    let config = DestinationConfig::new("webhook").with_webhook(server.uri());
    let storage = WebhookStorage::new(
        "hook",
        &config,
        hooks(dir.path(), Some(Arc::clone(&cache))),
        &options(0),
    )
    .unwrap();

    storage.consume("t1", event("e1")).unwrap();
    wait_for(|| cache.metrics().succeeded == 1).await;

    let cached = cache.get_n("hook", 10).await.unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].event_id, "e1");
    assert!(cached[0].success.is_some());

    storage.close().await.unwrap();
    cache.close().await.unwrap();
}

#[tokio::test]
async fn test_stream_exhausted_retries_fall_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let hooks = hooks(dir.path(), None);
    let config = DestinationConfig::new("webhook").with_webhook(server.uri());
    let storage = WebhookStorage::new("hook", &config, Arc::clone(&hooks), &options(1)).unwrap();

    storage.consume("t1", event("e1")).unwrap();
    wait_for(|| storage.metrics().fallbacks == 1).await;
    storage.close().await.unwrap();

    assert_eq!(storage.metrics().retries, 1);
    let contents = std::fs::read_to_string(hooks.fallback().path()).unwrap();
    let record: FallbackRecord = serde_json::from_str(contents.trim()).unwrap();
    assert_eq!(record.event, event("e1"));
    assert!(record.error.contains("503"), "{}", record.error);
}

#[tokio::test]
async fn test_template_failure_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = DestinationConfig::new("webhook").with_webhook("http://127.0.0.1:1/{{ .missing }}");
    let storage = WebhookStorage::new("hook", &config, hooks(dir.path(), None), &options(0)).unwrap();

    let err = storage.consume("t1", event("e1")).unwrap_err();
    assert!(matches!(err, SinkError::Template(_)));

    let metrics = storage.metrics();
    assert_eq!(metrics.events_dropped, 1);
    assert_eq!(metrics.events_enqueued, 0);
    storage.close().await.unwrap();
}

#[tokio::test]
async fn test_consume_after_close() {
    let dir = tempfile::tempdir().unwrap();
    let config = DestinationConfig::new("webhook").with_webhook("http://127.0.0.1:1");
    let storage = WebhookStorage::new("hook", &config, hooks(dir.path(), None), &options(0)).unwrap();

    storage.close().await.unwrap();
    storage.close().await.unwrap();

    let err = storage.consume("t1", event("e1")).unwrap_err();
    assert!(err.is_closed());
}

#[test]
fn test_missing_webhook_section() {
    let dir = tempfile::tempdir().unwrap();
    let config = DestinationConfig::new("webhook").with_mode(DestinationMode::Synchronous);
    let err = WebhookStorage::new("hook", &config, hooks(dir.path(), None), &options(0)).unwrap_err();
    assert!(matches!(err, SinkError::Config(_)));
}

// =============================================================================
// Batch and synchronous modes
// =============================================================================

#[tokio::test]
async fn test_store_batch_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let config = DestinationConfig::new("webhook")
        .with_mode(DestinationMode::Batch)
        .with_webhook("http://127.0.0.1:1");
    let storage = WebhookStorage::new("hook", &config, hooks(dir.path(), None), &options(0)).unwrap();

    let err = storage.store_batch("f.log", vec![event("e1")]).await.unwrap_err();
    assert!(matches!(err, SinkError::Unsupported { .. }));
    storage.close().await.unwrap();
}

#[tokio::test]
async fn test_sync_store_returns_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sync"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = DestinationConfig::new("webhook")
        .with_mode(DestinationMode::Synchronous)
        .with_webhook(format!("{}/sync", server.uri()));
    let storage = WebhookStorage::new("hook", &config, hooks(dir.path(), None), &options(0)).unwrap();

    let context = storage.sync_store("t1", event("e1")).await.unwrap();
    assert_eq!(context.synchronous_result, Some(Value::Int(201)));
    assert_eq!(context.event_id, "e1");
    assert_eq!(
        context.http_request.as_ref().map(|r| r.url.as_str()),
        Some(format!("{}/sync", server.uri()).as_str())
    );
    assert_eq!(storage.queue_size(), 0);
    storage.close().await.unwrap();
}

#[tokio::test]
async fn test_consume_outside_stream_mode() {
    let dir = tempfile::tempdir().unwrap();
    let config = DestinationConfig::new("webhook")
        .with_mode(DestinationMode::Synchronous)
        .with_webhook("http://127.0.0.1:1");
    let storage = WebhookStorage::new("hook", &config, hooks(dir.path(), None), &options(0)).unwrap();

    let err = storage.consume("t1", event("e1")).unwrap_err();
    assert!(matches!(err, SinkError::Unsupported { .. }));
    storage.close().await.unwrap();
}
