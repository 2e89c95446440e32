//! Destinations config watcher
//!
//! Periodically reloads the destinations payload from its source and
//! reconciles the registry with it.
//!
//! # Design
//!
//! The watcher runs as a background task that:
//! 1. Loads the payload on every interval tick or manual trigger
//! 2. Skips payloads whose hash matches the last applied one
//! 3. Reconciles the registry with anything new
//!
//! A source that fails to load or parse is logged; the running destinations
//! stay as they are until a good payload arrives.

use std::sync::Arc;
use std::time::Duration;

use courier_config::{ConfigSource, DestinationsConfig};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::registry::{DestinationRegistry, ReconcileSummary};

/// Configuration for the config watcher
#[derive(Debug, Clone)]
pub struct ConfigWatcherConfig {
    /// Interval between reloads
    pub interval: Duration,

    /// Timeout for fetching an HTTP source
    pub fetch_timeout: Duration,
}

impl Default for ConfigWatcherConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&DestinationsConfig> for ConfigWatcherConfig {
    fn from(config: &DestinationsConfig) -> Self {
        Self {
            interval: config.reload_interval(),
            fetch_timeout: Duration::from_secs(config.fetch_timeout_sec.max(1)),
        }
    }
}

impl ConfigWatcherConfig {
    /// Set the reload interval
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Handle for controlling the config watcher
#[derive(Debug, Clone)]
pub struct ConfigWatcherHandle {
    /// Trigger manual reload
    trigger: tokio::sync::mpsc::Sender<()>,
}

impl ConfigWatcherHandle {
    /// Trigger an immediate reload
    ///
    /// Returns true if the trigger was sent; a reload already pending counts
    /// as false.
    pub fn trigger_reload(&self) -> bool {
        self.trigger.try_send(()).is_ok()
    }

    /// Trigger a reload, waiting if one is already pending
    pub async fn trigger_reload_async(&self) -> bool {
        self.trigger.send(()).await.is_ok()
    }
}

/// Background worker keeping the registry in sync with its source
pub struct ConfigWatcher {
    source: ConfigSource,
    registry: Arc<DestinationRegistry>,
    config: ConfigWatcherConfig,
    trigger_rx: tokio::sync::mpsc::Receiver<()>,
    cancel: CancellationToken,
    last_hash: Option<String>,
}

impl ConfigWatcher {
    /// Create a new watcher
    ///
    /// Returns (watcher, handle). Spawn the watcher as a tokio task.
    pub fn new(
        source: ConfigSource,
        registry: Arc<DestinationRegistry>,
        config: ConfigWatcherConfig,
        cancel: CancellationToken,
    ) -> (Self, ConfigWatcherHandle) {
        let (trigger_tx, trigger_rx) = tokio::sync::mpsc::channel(1);

        let watcher = Self {
            source,
            registry,
            config,
            trigger_rx,
            cancel,
            last_hash: None,
        };

        let handle = ConfigWatcherHandle {
            trigger: trigger_tx,
        };

        (watcher, handle)
    }

    /// Load the source once and apply it if it changed
    ///
    /// Returns `None` when the payload matches the last applied one.
    ///
    /// # Errors
    ///
    /// Returns the load, parse or reconcile error.
    pub async fn reload(&mut self) -> Result<Option<ReconcileSummary>> {
        let payload = self.source.load_payload(self.config.fetch_timeout).await?;
        let hash = payload.content_hash();
        if self.last_hash.as_deref() == Some(hash.as_str()) {
            tracing::debug!(source = %self.source.describe(), "destinations unchanged");
            return Ok(None);
        }

        let summary = self.registry.reconcile(payload.destinations).await?;
        self.last_hash = Some(hash);
        Ok(Some(summary))
    }

    /// Run the watcher until cancelled
    ///
    /// The first reload happens immediately.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            source = %self.source.describe(),
            interval_secs = self.config.interval.as_secs(),
            "config watcher started"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("config watcher stopping");
                    break;
                }

                _ = interval.tick() => {
                    self.reload_logged().await;
                }

                Some(()) = self.trigger_rx.recv() => {
                    tracing::debug!("manual reload triggered");
                    self.reload_logged().await;
                }
            }
        }

        tracing::info!("config watcher stopped");
    }

    async fn reload_logged(&mut self) {
        if let Err(e) = self.reload().await {
            tracing::error!(
                source = %self.source.describe(),
                error = %e,
                "failed to reload destinations, keeping current destinations"
            );
        }
    }
}

#[cfg(test)]
#[path = "watcher_test.rs"]
mod watcher_test;
