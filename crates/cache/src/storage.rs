//! Events cache storage
//!
//! `EventsStorage` is the persistence boundary of the cache. The in-memory
//! implementation keeps, per destination, an insertion-ordered id list next
//! to an id map so eviction of the oldest entry and update-by-id are both
//! cheap.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_protocol::{Request, Value};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// One processed field as written to the destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub field: String,
    pub sql_type: String,
    pub value: Value,
}

/// What was delivered for a successful event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuccessRecord {
    /// Target table (SQL destinations)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    /// Written fields with their column types
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldRecord>,

    /// Request sent (HTTP destinations)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_request: Option<Request>,
}

/// A cached event with its latest status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEvent {
    pub event_id: String,

    /// Original event as JSON text
    pub original: String,

    #[serde(default)]
    pub success: Option<SuccessRecord>,

    #[serde(default)]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persistence for cached events
#[async_trait]
pub trait EventsStorage: Send + Sync {
    /// Store a new event (replacing an entry with the same id)
    async fn insert(&self, destination_id: &str, event_id: &str, original: String) -> Result<()>;

    /// Attach a success record to a stored event
    ///
    /// # Errors
    ///
    /// `NotFound` if the event is not stored.
    async fn update_succeed(
        &self,
        destination_id: &str,
        event_id: &str,
        record: SuccessRecord,
    ) -> Result<()>;

    /// Attach an error to a stored event
    ///
    /// # Errors
    ///
    /// `NotFound` if the event is not stored.
    async fn update_error(&self, destination_id: &str, event_id: &str, error: String)
    -> Result<()>;

    /// Remove the oldest event of a destination, returning its id
    async fn evict_oldest(&self, destination_id: &str) -> Result<Option<String>>;

    /// Number of events stored for a destination
    async fn get_total(&self, destination_id: &str) -> Result<usize>;

    /// Up to `n` most recent events, newest first
    async fn get_n(&self, destination_id: &str, n: usize) -> Result<Vec<CachedEvent>>;

    /// Release resources
    async fn close(&self) -> Result<()>;
}

#[derive(Debug, Default)]
struct DestinationEvents {
    order: VecDeque<String>,
    entries: HashMap<String, CachedEvent>,
}

/// In-process events storage
#[derive(Debug, Default)]
pub struct MemoryEventsStorage {
    destinations: RwLock<HashMap<String, DestinationEvents>>,
}

impl MemoryEventsStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, destination_id: &str, event_id: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut CachedEvent),
    {
        let mut destinations = self.destinations.write();
        let entry = destinations
            .get_mut(destination_id)
            .and_then(|d| d.entries.get_mut(event_id))
            .ok_or_else(|| CacheError::not_found(destination_id, event_id))?;
        apply(entry);
        entry.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl EventsStorage for MemoryEventsStorage {
    async fn insert(&self, destination_id: &str, event_id: &str, original: String) -> Result<()> {
        let now = Utc::now();
        let mut destinations = self.destinations.write();
        let events = destinations.entry(destination_id.to_string()).or_default();

        if events.entries.contains_key(event_id) {
            events.order.retain(|id| id != event_id);
        }
        events.order.push_back(event_id.to_string());
        events.entries.insert(
            event_id.to_string(),
            CachedEvent {
                event_id: event_id.to_string(),
                original,
                success: None,
                error: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn update_succeed(
        &self,
        destination_id: &str,
        event_id: &str,
        record: SuccessRecord,
    ) -> Result<()> {
        self.update(destination_id, event_id, |entry| {
            entry.success = Some(record);
            entry.error = None;
        })
    }

    async fn update_error(
        &self,
        destination_id: &str,
        event_id: &str,
        error: String,
    ) -> Result<()> {
        self.update(destination_id, event_id, |entry| entry.error = Some(error))
    }

    async fn evict_oldest(&self, destination_id: &str) -> Result<Option<String>> {
        let mut destinations = self.destinations.write();
        let Some(events) = destinations.get_mut(destination_id) else {
            return Ok(None);
        };
        let evicted = events.order.pop_front();
        if let Some(id) = &evicted {
            events.entries.remove(id);
        }
        if events.order.is_empty() {
            destinations.remove(destination_id);
        }
        Ok(evicted)
    }

    async fn get_total(&self, destination_id: &str) -> Result<usize> {
        Ok(self
            .destinations
            .read()
            .get(destination_id)
            .map_or(0, |d| d.order.len()))
    }

    async fn get_n(&self, destination_id: &str, n: usize) -> Result<Vec<CachedEvent>> {
        let destinations = self.destinations.read();
        let Some(events) = destinations.get(destination_id) else {
            return Ok(Vec::new());
        };
        Ok(events
            .order
            .iter()
            .rev()
            .take(n)
            .filter_map(|id| events.entries.get(id).cloned())
            .collect())
    }

    async fn close(&self) -> Result<()> {
        self.destinations.write().clear();
        Ok(())
    }
}
