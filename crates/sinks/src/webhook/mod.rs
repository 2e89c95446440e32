//! Webhook storage
//!
//! Renders every event into an HTTP request with a [`RequestFactory`] and
//! hands it to an [`HttpDelivery`]. In stream mode the request goes through
//! the retry queue; in synchronous mode it is sent inline and the response
//! status becomes the result.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use courier_config::{DestinationConfig, DestinationMode, WEBHOOK_KIND};
use courier_protocol::{Event, EventContext, Value};

use crate::common::{MetricsSnapshot, SinkError, SinkMetrics};
use crate::hooks::{self, StorageHooks};
use crate::http::{HttpDelivery, RequestFactory, WebhookRequestFactory};
use crate::storage::{BatchResult, Storage, StorageOptions, Transport};

/// Destination delivering events as HTTP requests
pub struct WebhookStorage {
    id: String,
    mode: DestinationMode,
    cache_disabled: bool,
    factory: Box<dyn RequestFactory>,
    hooks: Arc<StorageHooks>,
    transport: Transport<HttpDelivery>,
    /// Rejections before the queue; delivery counts live in the adapter
    metrics: SinkMetrics,
    closed: AtomicBool,
}

impl WebhookStorage {
    /// Build from a destination config
    ///
    /// # Errors
    ///
    /// Returns `Config` if the `webhook` section is missing or its templates
    /// do not parse, `Init` if the HTTP client or retry queue cannot be built.
    pub fn new(
        id: impl Into<String>,
        config: &DestinationConfig,
        hooks: Arc<StorageHooks>,
        options: &StorageOptions,
    ) -> Result<Self, SinkError> {
        let id = id.into();
        let webhook = config
            .webhook
            .as_ref()
            .ok_or_else(|| SinkError::config(format!("destination '{id}': missing webhook section")))?;
        let factory = WebhookRequestFactory::new(webhook)?;
        Self::with_factory(id, config, Box::new(factory), hooks, options)
    }

    /// Build with a custom request factory
    ///
    /// # Errors
    ///
    /// Returns `Init` if the HTTP client or retry queue cannot be built.
    pub fn with_factory(
        id: impl Into<String>,
        config: &DestinationConfig,
        factory: Box<dyn RequestFactory>,
        hooks: Arc<StorageHooks>,
        options: &StorageOptions,
    ) -> Result<Self, SinkError> {
        let id = id.into();
        let delivery = HttpDelivery::new(id.clone(), &options.http)?;
        let transport = Transport::open(&id, config.mode, delivery, hooks::shared(&hooks), options)?;

        tracing::info!(destination = %id, mode = config.mode.as_str(), "webhook storage started");

        Ok(Self {
            mode: config.mode,
            cache_disabled: config.caching.disabled,
            factory,
            hooks,
            transport,
            metrics: SinkMetrics::new(),
            closed: AtomicBool::new(false),
            id,
        })
    }

    fn check_open(&self) -> Result<(), SinkError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SinkError::closed(&self.id));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for WebhookStorage {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        WEBHOOK_KIND
    }

    fn mode(&self) -> DestinationMode {
        self.mode
    }

    fn consume(&self, token_id: &str, event: Event) -> Result<(), SinkError> {
        if let Err(e) = self.check_open() {
            self.metrics.dropped();
            return Err(e);
        }

        let context =
            EventContext::new(&self.id, token_id, event).with_cache_disabled(self.cache_disabled);
        self.hooks.on_consume(&context);

        let request = match self.factory.create(&context.raw_event) {
            Ok(request) => request,
            Err(e) => {
                self.hooks
                    .on_rejected(context.cache_disabled, &context.event_id, &e);
                self.metrics.dropped();
                return Err(e);
            }
        };

        let (cache_disabled, event_id) = (context.cache_disabled, context.event_id.clone());
        self.transport
            .send_async(WEBHOOK_KIND, request, context)
            .inspect_err(|e| {
                self.hooks.on_rejected(cache_disabled, &event_id, e);
            })
    }

    async fn store_batch(
        &self,
        _file_name: &str,
        _events: Vec<Event>,
    ) -> Result<BatchResult, SinkError> {
        Err(SinkError::unsupported(WEBHOOK_KIND, "batch store"))
    }

    async fn sync_store(&self, token_id: &str, event: Event) -> Result<EventContext, SinkError> {
        self.check_open()?;

        let mut context =
            EventContext::new(&self.id, token_id, event).with_cache_disabled(self.cache_disabled);
        let request = self.factory.create(&context.raw_event)?;
        let status = self.transport.delivery().send(&request).await?;

        context.http_request = Some(request);
        context.synchronous_result = Some(Value::Int(i64::from(status)));
        Ok(context)
    }

    fn metrics(&self) -> MetricsSnapshot {
        self.transport.metrics().merge(self.metrics.snapshot())
    }

    fn queue_size(&self) -> u64 {
        self.transport.queue_size()
    }

    async fn close(&self) -> Result<(), SinkError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let transport = self.transport.close().await;
        self.factory.close();
        let hooks = self.hooks.close();

        tracing::info!(destination = %self.id, "webhook storage closed");
        transport.and(hooks)
    }
}

impl std::fmt::Debug for WebhookStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookStorage")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "webhook_test.rs"]
mod webhook_test;
