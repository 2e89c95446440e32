//! Tests for DefaultStorageFactory

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use courier_config::{DestinationConfig, DestinationMode, GlobalConfig};
use courier_protocol::{Event, Table};
use courier_schema::{SchemaError, SqlAdapter, TypeMapping};
use courier_sinks::StorageOptions;

use super::{DefaultStorageFactory, SqlAdapterProvider, StorageFactory};
use crate::PipelineError;

// =============================================================================
// Test doubles
// =============================================================================

#[derive(Default)]
struct NullAdapter {
    ping_fails: bool,
    closes: AtomicU32,
}

#[async_trait]
impl SqlAdapter for NullAdapter {
    fn kind(&self) -> &str {
        "postgres"
    }

    async fn ping(&self) -> courier_schema::Result<()> {
        if self.ping_fails {
            return Err(SchemaError::from_driver("ping", "", "connection refused"));
        }
        Ok(())
    }

    async fn get_table_schema(&self, name: &str) -> courier_schema::Result<Table> {
        Ok(Table::new(name))
    }

    async fn create_table(&self, _table: &Table) -> courier_schema::Result<()> {
        Ok(())
    }

    async fn patch_table_schema(&self, _diff: &Table) -> courier_schema::Result<()> {
        Ok(())
    }

    async fn insert(&self, _table: &Table, _rows: &[Event]) -> courier_schema::Result<()> {
        Ok(())
    }

    async fn close(&self) -> courier_schema::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Provider {
    adapter: Arc<NullAdapter>,
    refuse: AtomicBool,
}

impl Provider {
    fn new(ping_fails: bool) -> Self {
        Self {
            adapter: Arc::new(NullAdapter {
                ping_fails,
                ..NullAdapter::default()
            }),
            refuse: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SqlAdapterProvider for Provider {
    async fn connect(
        &self,
        name: &str,
        _config: &DestinationConfig,
    ) -> Result<Arc<dyn SqlAdapter>, SchemaError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(SchemaError::from_driver("connect", name, "authentication failed"));
        }
        Ok(Arc::clone(&self.adapter) as Arc<dyn SqlAdapter>)
    }

    fn type_mapping(&self) -> TypeMapping {
        TypeMapping::default()
    }
}

fn factory(log_dir: &std::path::Path, provider: Arc<Provider>) -> DefaultStorageFactory {
    let global = GlobalConfig {
        log_dir: log_dir.to_string_lossy().into_owned(),
        ..GlobalConfig::default()
    };
    DefaultStorageFactory::new(&global, StorageOptions::default())
        .with_provider("postgres", provider as Arc<dyn SqlAdapterProvider>)
}

// =============================================================================
// create
// =============================================================================

#[tokio::test]
async fn test_create_webhook() {
    let dir = tempfile::tempdir().unwrap();
    let factory = factory(dir.path(), Arc::new(Provider::new(false)));
    let config = DestinationConfig::new("webhook")
        .with_mode(DestinationMode::Synchronous)
        .with_webhook("http://127.0.0.1:1/hook");

    let storage = factory.create("hook", &config).await.unwrap();

    assert_eq!(storage.id(), "hook");
    assert_eq!(storage.kind(), "webhook");
    assert_eq!(storage.mode(), DestinationMode::Synchronous);
    storage.close().await.unwrap();
}

#[tokio::test]
async fn test_create_sql_through_provider() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(Provider::new(false));
    let factory = factory(dir.path(), Arc::clone(&provider));
    let config = DestinationConfig::new("postgres").with_mode(DestinationMode::Batch);

    let storage = factory.create("pg", &config).await.unwrap();
    assert_eq!(storage.kind(), "postgres");

    let mut event = Event::new();
    event.insert("a", 1);
    let result = storage.store_batch("f.log", vec![event]).await.unwrap();
    assert_eq!(result.stored, 1);

    storage.close().await.unwrap();
    assert_eq!(provider.adapter.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_create_unknown_kind() {
    let dir = tempfile::tempdir().unwrap();
    let factory = factory(dir.path(), Arc::new(Provider::new(false)));

    let err = factory
        .create("dw", &DestinationConfig::new("snowflake"))
        .await
        .err()
        .expect("create should fail");
    assert!(matches!(err, PipelineError::UnknownKind { .. }));
    assert_eq!(factory.kinds(), vec!["postgres", "webhook"]);
}

#[tokio::test]
async fn test_create_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let factory = factory(dir.path(), Arc::new(Provider::new(false)));

    let err = factory
        .create("hook", &DestinationConfig::new("webhook"))
        .await
        .err()
        .expect("create should fail");
    assert!(matches!(err, PipelineError::Config(_)));
}

#[tokio::test]
async fn test_create_connect_failure() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(Provider::new(false));
    provider.refuse.store(true, Ordering::SeqCst);
    let factory = factory(dir.path(), provider);

    let err = factory
        .create("pg", &DestinationConfig::new("postgres"))
        .await
        .err()
        .expect("create should fail");
    assert!(err.to_string().contains("authentication failed"), "{err}");
}

#[tokio::test]
async fn test_create_sql_storage_failure_closes_adapter() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("queue");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let provider = Arc::new(Provider::new(false));
    let global = GlobalConfig {
        log_dir: dir.path().to_string_lossy().into_owned(),
        ..GlobalConfig::default()
    };
    let options = StorageOptions {
        queue_dir: Some(blocker),
        ..StorageOptions::default()
    };
    let factory = DefaultStorageFactory::new(&global, options)
        .with_provider("postgres", Arc::clone(&provider) as Arc<dyn SqlAdapterProvider>);

    let result = factory
        .create("pg", &DestinationConfig::new("postgres").with_mode(DestinationMode::Stream))
        .await;
    assert!(result.is_err());
    assert_eq!(provider.adapter.closes.load(Ordering::SeqCst), 1);
}

// =============================================================================
// test_connection
// =============================================================================

#[tokio::test]
async fn test_connection_ok_closes_adapter() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(Provider::new(false));
    let factory = factory(dir.path(), Arc::clone(&provider));

    factory
        .test_connection("pg", &DestinationConfig::new("postgres"))
        .await
        .unwrap();
    assert_eq!(provider.adapter.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connection_ping_failure() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(Provider::new(true));
    let factory = factory(dir.path(), Arc::clone(&provider));

    let err = factory
        .test_connection("pg", &DestinationConfig::new("postgres"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Adapter { .. }));
    assert!(err.to_string().contains("connection refused"), "{err}");
    assert_eq!(provider.adapter.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connection_webhook_template() {
    let dir = tempfile::tempdir().unwrap();
    let factory = factory(dir.path(), Arc::new(Provider::new(false)));

    factory
        .test_connection("hook", &DestinationConfig::new("webhook").with_webhook("http://h/{{ .a }}"))
        .await
        .unwrap();

    let err = factory
        .test_connection("hook", &DestinationConfig::new("webhook").with_webhook("http://h/{{ .a"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Storage(_)));
}
