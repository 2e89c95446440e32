//! Event correlation context
//!
//! One `EventContext` exists per (event, destination) pair. It is created when
//! a consumer accepts the event, travels with the queued request, and is handed
//! to the success or error hook once delivery settles.

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::request::Request;
use crate::table::Table;
use crate::value::Value;

/// Correlation record for a single event's delivery to one destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    /// Destination identifier (config name)
    pub destination_id: String,

    /// Event identifier (empty if the event carried none)
    pub event_id: String,

    /// Token the event arrived with
    pub token_id: String,

    /// Skip events cache bookkeeping for this destination
    #[serde(default)]
    pub cache_disabled: bool,

    /// Event as received by the consumer
    pub raw_event: Event,

    /// Event after mappings/flattening (what was actually written)
    #[serde(default)]
    pub processed_event: Option<Event>,

    /// Table the processed event resolves to
    #[serde(default)]
    pub table: Option<Table>,

    /// Request sent on successful HTTP delivery
    #[serde(default)]
    pub http_request: Option<Request>,

    /// Result of a synchronous store
    #[serde(default)]
    pub synchronous_result: Option<Value>,
}

impl EventContext {
    /// Create a context for an accepted event
    pub fn new(
        destination_id: impl Into<String>,
        token_id: impl Into<String>,
        raw_event: Event,
    ) -> Self {
        let event_id = raw_event.event_id().unwrap_or_default().to_string();
        Self {
            destination_id: destination_id.into(),
            event_id,
            token_id: token_id.into(),
            cache_disabled: false,
            raw_event,
            processed_event: None,
            table: None,
            http_request: None,
            synchronous_result: None,
        }
    }

    #[must_use]
    pub fn with_cache_disabled(mut self, disabled: bool) -> Self {
        self.cache_disabled = disabled;
        self
    }

    /// Attach the processed event and its resolved table
    #[must_use]
    pub fn with_processed(mut self, event: Event, table: Option<Table>) -> Self {
        self.processed_event = Some(event);
        self.table = table;
        self
    }

    /// Attach the request that was sent
    #[must_use]
    pub fn with_request(mut self, request: Request) -> Self {
        self.http_request = Some(request);
        self
    }

    /// Processed event if present, otherwise the raw one
    #[inline]
    pub fn effective_event(&self) -> &Event {
        self.processed_event.as_ref().unwrap_or(&self.raw_event)
    }
}
