//! Delivery outcome reporting
//!
//! ```text
//! consume ─────────> cache.put
//! on_success ──────> cache.succeed
//! on_error(false) ─> cache.error
//! on_error(true) ──> cache.error + fallback log
//! ```
//!
//! Cache and fallback failures are logged and never reach delivery.

use std::sync::Arc;

use courier_cache::EventsCache;
use courier_protocol::EventContext;

use crate::common::SinkError;
use crate::delivery::DeliveryHooks;
use crate::fallback::FallbackLogger;
use crate::util::RateLimitedLogger;

/// Hooks shared by the stream-mode storages of one destination
#[derive(Debug)]
pub struct StorageHooks {
    destination_id: String,
    cache: Option<Arc<EventsCache>>,
    fallback: FallbackLogger,
    fallback_errors: RateLimitedLogger,
}

impl StorageHooks {
    pub fn new(
        destination_id: impl Into<String>,
        cache: Option<Arc<EventsCache>>,
        fallback: FallbackLogger,
    ) -> Self {
        let destination_id = destination_id.into();
        Self {
            fallback_errors: RateLimitedLogger::default_interval(&destination_id),
            destination_id,
            cache,
            fallback,
        }
    }

    #[inline]
    pub fn fallback(&self) -> &FallbackLogger {
        &self.fallback
    }

    /// Record an accepted event before it is queued
    pub fn on_consume(&self, context: &EventContext) {
        if let Some(cache) = &self.cache {
            cache.put(
                context.cache_disabled,
                &context.destination_id,
                &context.event_id,
                &context.raw_event,
            );
        }
    }

    /// Record an event rejected before it reached the queue
    pub fn on_rejected(&self, cache_disabled: bool, event_id: &str, error: &SinkError) {
        tracing::warn!(
            destination = %self.destination_id,
            event_id = %event_id,
            error = %error,
            "event rejected"
        );
        if let Some(cache) = &self.cache {
            cache.error(cache_disabled, &self.destination_id, event_id, &error.to_string());
        }
    }

    /// Flush the fallback file
    ///
    /// # Errors
    ///
    /// Returns an error if the fallback file cannot be flushed.
    pub fn close(&self) -> Result<(), SinkError> {
        self.fallback.close()
    }

    fn cache_error(&self, context: &EventContext, error: &SinkError) {
        if let Some(cache) = &self.cache {
            cache.error(
                context.cache_disabled,
                &context.destination_id,
                &context.event_id,
                &error.to_string(),
            );
        }
    }
}

impl DeliveryHooks for StorageHooks {
    fn on_success(&self, context: &EventContext) {
        if let Some(cache) = &self.cache {
            cache.succeed(context);
        }
    }

    fn on_error(&self, fallback: bool, context: &EventContext, error: &SinkError) {
        self.cache_error(context, error);
        if !fallback {
            return;
        }
        if let Err(e) = self.fallback.log(&context.raw_event, &error.to_string()) {
            self.fallback_errors.error("failed to write fallback event", &e);
        }
    }
}

/// Shared handle, as the adapters take it
pub(crate) fn shared(hooks: &Arc<StorageHooks>) -> Arc<dyn DeliveryHooks> {
    Arc::clone(hooks) as Arc<dyn DeliveryHooks>
}
