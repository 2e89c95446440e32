//! Storage construction
//!
//! The registry builds storages through a [`StorageFactory`]. The default
//! factory knows webhooks natively; SQL destination types are served by
//! registered [`SqlAdapterProvider`]s, one per dialect:
//!
//! ```text
//! DestinationConfig { type: "webhook" } ──> WebhookStorage
//! DestinationConfig { type: "postgres" } ──> providers["postgres"].connect ──> SqlStorage
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use courier_cache::EventsCache;
use courier_config::{DestinationConfig, GlobalConfig, WEBHOOK_KIND};
use courier_schema::{SchemaError, SqlAdapter, TypeMapping};
use courier_sinks::{
    FallbackLogger, SqlStorage, Storage, StorageHooks, StorageOptions, WebhookRequestFactory,
    WebhookStorage,
};

use crate::error::{PipelineError, Result};

/// Builds storages from destination configs
#[async_trait]
pub trait StorageFactory: Send + Sync {
    /// Build the storage of destination `name`
    async fn create(&self, name: &str, config: &DestinationConfig) -> Result<Arc<dyn Storage>>;

    /// Check that a destination config can be built and reached
    async fn test_connection(&self, name: &str, config: &DestinationConfig) -> Result<()>;
}

/// Connects a SQL dialect
#[async_trait]
pub trait SqlAdapterProvider: Send + Sync {
    /// Open an adapter for a destination
    async fn connect(
        &self,
        name: &str,
        config: &DestinationConfig,
    ) -> std::result::Result<Arc<dyn SqlAdapter>, SchemaError>;

    /// SQL types of the dialect
    fn type_mapping(&self) -> TypeMapping {
        TypeMapping::default()
    }
}

/// Factory for webhooks and registered SQL dialects
pub struct DefaultStorageFactory {
    server_name: String,
    log_dir: PathBuf,
    cache: Option<Arc<EventsCache>>,
    options: StorageOptions,
    providers: HashMap<String, Arc<dyn SqlAdapterProvider>>,
}

impl DefaultStorageFactory {
    pub fn new(global: &GlobalConfig, options: StorageOptions) -> Self {
        Self {
            server_name: global.server_name.clone(),
            log_dir: PathBuf::from(&global.log_dir),
            cache: None,
            options,
            providers: HashMap::new(),
        }
    }

    /// Report consumed, delivered and failed events to the cache
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<EventsCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Serve destination type `kind` with a SQL adapter provider
    #[must_use]
    pub fn with_provider(
        mut self,
        kind: impl Into<String>,
        provider: Arc<dyn SqlAdapterProvider>,
    ) -> Self {
        self.providers.insert(kind.into(), provider);
        self
    }

    /// Destination types this factory can build
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        kinds.push(WEBHOOK_KIND);
        kinds.sort_unstable();
        kinds
    }

    fn hooks(&self, name: &str) -> Arc<StorageHooks> {
        Arc::new(StorageHooks::new(
            name,
            self.cache.clone(),
            FallbackLogger::new(&self.log_dir, &self.server_name, name),
        ))
    }

    fn provider(&self, name: &str, config: &DestinationConfig) -> Result<&Arc<dyn SqlAdapterProvider>> {
        self.providers
            .get(&config.kind)
            .ok_or_else(|| PipelineError::unknown_kind(name, &config.kind))
    }
}

#[async_trait]
impl StorageFactory for DefaultStorageFactory {
    async fn create(&self, name: &str, config: &DestinationConfig) -> Result<Arc<dyn Storage>> {
        config.validate(name)?;

        if config.kind == WEBHOOK_KIND {
            let storage = WebhookStorage::new(name, config, self.hooks(name), &self.options)?;
            return Ok(Arc::new(storage));
        }

        let provider = self.provider(name, config)?;
        let adapter = provider
            .connect(name, config)
            .await
            .map_err(|e| PipelineError::adapter(name, e))?;
        let storage = match SqlStorage::new(
            name,
            config,
            Arc::clone(&adapter),
            provider.type_mapping(),
            self.hooks(name),
            &self.options,
        ) {
            Ok(storage) => storage,
            Err(e) => {
                if let Err(close_err) = adapter.close().await {
                    tracing::warn!(destination = %name, error = %close_err, "failed to close adapter");
                }
                return Err(e.into());
            }
        };
        Ok(Arc::new(storage))
    }

    async fn test_connection(&self, name: &str, config: &DestinationConfig) -> Result<()> {
        config.validate(name)?;

        if config.kind == WEBHOOK_KIND {
            if let Some(webhook) = &config.webhook {
                WebhookRequestFactory::new(webhook)?;
            }
            return Ok(());
        }

        let provider = self.provider(name, config)?;
        let adapter = provider
            .connect(name, config)
            .await
            .map_err(|e| PipelineError::adapter(name, e))?;
        let ping = adapter.ping().await;
        if let Err(e) = adapter.close().await {
            tracing::warn!(destination = %name, error = %e, "failed to close test connection");
        }
        ping.map_err(|e| PipelineError::adapter(name, e))
    }
}

impl std::fmt::Debug for DefaultStorageFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultStorageFactory")
            .field("server_name", &self.server_name)
            .field("log_dir", &self.log_dir)
            .field("cache", &self.cache.is_some())
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
#[path = "factory_test.rs"]
mod factory_test;
