//! Application context
//!
//! Owns the long-lived components and brings them up and down in order:
//!
//! ```text
//! start:    cache -> storage factory -> registry -> destinations -> watcher
//! shutdown: watcher -> registry -> cache
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use courier_cache::{EventsCache, EventsCacheConfig, MemoryEventsStorage};
use courier_config::{CacheConfig, Config, ConfigSource};
use courier_pipeline::{
    ConfigWatcher, ConfigWatcherConfig, ConfigWatcherHandle, DefaultStorageFactory,
    DestinationRegistry, StorageFactory,
};
use courier_sinks::StorageOptions;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How long shutdown waits for the config watcher to stop
const WATCHER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the events cache, if enabled
pub fn build_cache(config: &CacheConfig) -> Option<Arc<EventsCache>> {
    if !config.enabled {
        info!("events cache disabled");
        return None;
    }
    let cache = EventsCache::new(
        Arc::new(MemoryEventsStorage::new()),
        EventsCacheConfig {
            capacity_per_destination: config.capacity_per_destination,
            channel_size: config.channel_size,
        },
    );
    Some(Arc::new(cache))
}

/// Build the storage factory for a server config
pub fn build_factory(config: &Config, cache: Option<Arc<EventsCache>>) -> DefaultStorageFactory {
    let factory = DefaultStorageFactory::new(&config.global, StorageOptions::from(&config.streaming));
    match cache {
        Some(cache) => factory.with_cache(cache),
        None => factory,
    }
}

/// Running server components
pub struct App {
    registry: Arc<DestinationRegistry>,
    cache: Option<Arc<EventsCache>>,
    cancel: CancellationToken,
    watcher: Option<(ConfigWatcherHandle, JoinHandle<()>)>,
}

impl App {
    /// Start every component and load the initial destinations
    ///
    /// A static (inline) destinations payload that does not parse is fatal.
    /// A file or HTTP source that fails on the first load is logged and
    /// retried by the watcher.
    pub async fn start(config: &Config) -> Result<Self> {
        let cancel = CancellationToken::new();
        let cache = build_cache(&config.cache);

        let factory = build_factory(config, cache.clone());
        info!(kinds = ?factory.kinds(), "storage factory ready");

        let registry = Arc::new(DestinationRegistry::new(
            Arc::new(factory) as Arc<dyn StorageFactory>,
            config.global.tokens.clone(),
            &config.global.log_dir,
        ));

        let watcher_config = ConfigWatcherConfig::from(&config.destinations);
        let watcher = match config.destinations.config_source() {
            None => {
                warn!("no destinations source configured, no events will be delivered");
                None
            }
            Some(ConfigSource::Inline(json)) => {
                registry
                    .update_config(json.as_bytes())
                    .await
                    .context("failed to apply inline destinations")?;
                None
            }
            Some(source) => {
                let (mut watcher, handle) = ConfigWatcher::new(
                    source,
                    Arc::clone(&registry),
                    watcher_config,
                    cancel.clone(),
                );
                if let Err(e) = watcher.reload().await {
                    error!(error = %e, "initial destinations load failed, will retry");
                }
                let task = tokio::spawn(watcher.run());
                Some((handle, task))
            }
        };

        Ok(Self {
            registry,
            cache,
            cancel,
            watcher,
        })
    }

    #[inline]
    pub fn registry(&self) -> &Arc<DestinationRegistry> {
        &self.registry
    }

    /// Handle for triggering an immediate destinations reload
    pub fn watcher_handle(&self) -> Option<ConfigWatcherHandle> {
        self.watcher.as_ref().map(|(handle, _)| handle.clone())
    }

    /// Stop the watcher, then close destinations and the cache
    pub async fn shutdown(self) {
        self.cancel.cancel();

        if let Some((_, task)) = self.watcher {
            match tokio::time::timeout(WATCHER_STOP_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "config watcher panicked"),
                Err(_) => warn!("config watcher did not stop within timeout"),
            }
        }

        if let Err(errors) = self.registry.close().await {
            error!(%errors, "destinations closed with errors");
        }

        if let Some(cache) = self.cache {
            if let Err(e) = cache.close().await {
                error!(error = %e, "failed to close events cache");
            }
        }
    }
}
