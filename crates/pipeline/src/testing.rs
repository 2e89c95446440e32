//! Test doubles shared by the pipeline tests

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use courier_config::{DestinationConfig, DestinationMode};
use courier_protocol::{Event, EventContext};
use courier_sinks::{BatchResult, MetricsSnapshot, SinkError, Storage};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::error::{PipelineError, Result};
use crate::factory::StorageFactory;

/// Storage recording what it is asked to do
pub struct MockStorage {
    pub id: String,
    pub kind: String,
    pub mode: DestinationMode,
    pub consumed: Mutex<Vec<(String, Event)>>,
    pub closes: AtomicU32,
    pub fail_close: bool,
    closed: AtomicBool,
}

impl MockStorage {
    pub fn new(id: &str, config: &DestinationConfig, fail_close: bool) -> Self {
        Self {
            id: id.to_string(),
            kind: config.kind.clone(),
            mode: config.mode,
            consumed: Mutex::new(Vec::new()),
            closes: AtomicU32::new(0),
            fail_close,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for MockStorage {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn mode(&self) -> DestinationMode {
        self.mode
    }

    fn consume(&self, token_id: &str, event: Event) -> std::result::Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::closed(&self.id));
        }
        self.consumed.lock().push((token_id.to_string(), event));
        Ok(())
    }

    async fn store_batch(
        &self,
        _file_name: &str,
        events: Vec<Event>,
    ) -> std::result::Result<BatchResult, SinkError> {
        Ok(BatchResult {
            stored: events.len(),
            skipped: 0,
            tables: 1,
        })
    }

    async fn sync_store(
        &self,
        token_id: &str,
        event: Event,
    ) -> std::result::Result<EventContext, SinkError> {
        Ok(EventContext::new(&self.id, token_id, event))
    }

    fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot::default()
    }

    async fn close(&self) -> std::result::Result<(), SinkError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(SinkError::write(format!("{} flush failed", self.id)));
        }
        Ok(())
    }
}

/// Factory building mock storages
#[derive(Default)]
pub struct MockFactory {
    pub created: Mutex<HashMap<String, Vec<Arc<MockStorage>>>>,
    pub fail_create: Mutex<HashSet<String>>,
    pub fail_close: Mutex<HashSet<String>>,
    /// Builds of these destinations wait for a permit
    pub gates: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl MockFactory {
    pub fn create_count(&self) -> usize {
        self.created.lock().values().map(Vec::len).sum()
    }

    /// Latest storage built for a destination
    pub fn latest(&self, name: &str) -> Option<Arc<MockStorage>> {
        self.created.lock().get(name).and_then(|v| v.last().cloned())
    }

    /// Every storage built for a destination, oldest first
    pub fn all(&self, name: &str) -> Vec<Arc<MockStorage>> {
        self.created.lock().get(name).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl StorageFactory for MockFactory {
    async fn create(&self, name: &str, config: &DestinationConfig) -> Result<Arc<dyn Storage>> {
        if self.fail_create.lock().contains(name) {
            return Err(PipelineError::unknown_kind(name, &config.kind));
        }
        let gate = self.gates.lock().get(name).cloned();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        let fail_close = self.fail_close.lock().contains(name);
        let storage = Arc::new(MockStorage::new(name, config, fail_close));
        self.created
            .lock()
            .entry(name.to_string())
            .or_default()
            .push(Arc::clone(&storage));
        Ok(storage)
    }

    async fn test_connection(&self, _name: &str, _config: &DestinationConfig) -> Result<()> {
        Ok(())
    }
}

/// Destinations payload bytes from a JSON literal
pub fn payload(json: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&json).unwrap()
}

pub fn event(id: &str) -> Event {
    let mut event = Event::new();
    event.insert("event_id", id);
    event
}
