//! Tests for the config watcher

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use courier_config::ConfigSource;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{ConfigWatcher, ConfigWatcherConfig};
use crate::DestinationRegistry;
use crate::testing::{MockFactory, payload};

fn registry(factory: &Arc<MockFactory>, log_dir: &Path) -> Arc<DestinationRegistry> {
    Arc::new(DestinationRegistry::new(
        Arc::clone(factory) as Arc<dyn crate::StorageFactory>,
        vec!["t1".into(), "t2".into()],
        log_dir,
    ))
}

fn file_source(path: &Path) -> ConfigSource {
    ConfigSource::File(path.to_string_lossy().into_owned())
}

fn write_payload(path: &Path, json: serde_json::Value) {
    std::fs::write(path, payload(json)).unwrap();
}

// =============================================================================
// reload
// =============================================================================

#[tokio::test]
async fn test_first_reload_creates_destinations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("destinations.json");
    write_payload(
        &path,
        json!({"destinations": {"d1": {"type": "postgres", "only_tokens": ["t1"]}}}),
    );
    let factory = Arc::new(MockFactory::default());
    let registry = registry(&factory, dir.path());

    let (mut watcher, _handle) = ConfigWatcher::new(
        file_source(&path),
        Arc::clone(&registry),
        ConfigWatcherConfig::default(),
        CancellationToken::new(),
    );

    let summary = watcher.reload().await.unwrap().unwrap();
    assert_eq!(summary.created, vec!["d1"]);
    assert_eq!(registry.storages("t1").len(), 1);
}

#[tokio::test]
async fn test_unchanged_payload_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("destinations.json");
    write_payload(
        &path,
        json!({"destinations": {"d1": {"type": "postgres", "only_tokens": ["t1"]}}}),
    );
    let factory = Arc::new(MockFactory::default());
    let registry = registry(&factory, dir.path());

    let (mut watcher, _handle) = ConfigWatcher::new(
        file_source(&path),
        registry,
        ConfigWatcherConfig::default(),
        CancellationToken::new(),
    );

    watcher.reload().await.unwrap();
    assert!(watcher.reload().await.unwrap().is_none());
    assert_eq!(factory.create_count(), 1);
}

#[tokio::test]
async fn test_changed_payload_is_reconciled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("destinations.json");
    write_payload(
        &path,
        json!({"destinations": {"d1": {"type": "postgres", "only_tokens": ["t1"]}}}),
    );
    let factory = Arc::new(MockFactory::default());
    let registry = registry(&factory, dir.path());

    let (mut watcher, _handle) = ConfigWatcher::new(
        file_source(&path),
        Arc::clone(&registry),
        ConfigWatcherConfig::default(),
        CancellationToken::new(),
    );
    watcher.reload().await.unwrap();

    write_payload(
        &path,
        json!({"destinations": {
            "d1": {"type": "postgres", "only_tokens": ["t1"]},
            "d2": {"type": "postgres", "only_tokens": ["t2"]}
        }}),
    );
    let summary = watcher.reload().await.unwrap().unwrap();

    assert_eq!(summary.created, vec!["d2"]);
    assert_eq!(summary.unchanged, vec!["d1"]);
    assert_eq!(registry.unit_names(), vec!["d1", "d2"]);
}

#[tokio::test]
async fn test_bad_payload_keeps_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("destinations.json");
    write_payload(
        &path,
        json!({"destinations": {"d1": {"type": "postgres", "only_tokens": ["t1"]}}}),
    );
    let factory = Arc::new(MockFactory::default());
    let registry = registry(&factory, dir.path());

    let (mut watcher, _handle) = ConfigWatcher::new(
        file_source(&path),
        Arc::clone(&registry),
        ConfigWatcherConfig::default(),
        CancellationToken::new(),
    );
    watcher.reload().await.unwrap();

    std::fs::write(&path, b"{\"destinations\": ").unwrap();
    assert!(watcher.reload().await.is_err());

    std::fs::remove_file(&path).unwrap();
    assert!(watcher.reload().await.is_err());

    assert_eq!(registry.unit_names(), vec!["d1"]);
    assert!(!factory.latest("d1").unwrap().is_closed());
}

// =============================================================================
// run
// =============================================================================

#[tokio::test]
async fn test_run_applies_trigger_and_stops_on_cancel() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("destinations.json");
    write_payload(
        &path,
        json!({"destinations": {"d1": {"type": "postgres", "only_tokens": ["t1"]}}}),
    );
    let factory = Arc::new(MockFactory::default());
    let registry = registry(&factory, dir.path());
    let cancel = CancellationToken::new();

    let (watcher, handle) = ConfigWatcher::new(
        file_source(&path),
        Arc::clone(&registry),
        ConfigWatcherConfig::default().with_interval(Duration::from_secs(3600)),
        cancel.clone(),
    );
    let task = tokio::spawn(watcher.run());

    // first tick fires immediately
    wait_for(|| registry.unit_names() == vec!["d1"]).await;

    write_payload(
        &path,
        json!({"destinations": {"d2": {"type": "postgres", "only_tokens": ["t2"]}}}),
    );
    assert!(handle.trigger_reload_async().await);
    wait_for(|| registry.unit_names() == vec!["d2"]).await;
    assert!(factory.latest("d1").unwrap().is_closed());

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .unwrap()
        .unwrap();
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
