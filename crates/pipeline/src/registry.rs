//! Destination registry
//!
//! Hot-reloadable directory of running destinations. Each reconcile diffs
//! the new destination map against the running units by config hash:
//!
//! ```text
//!            same hash
//!          ┌───────────┐
//!          v           │
//! ABSENT ──> RUNNING ──┼── changed hash ──> close old ──> RUNNING'
//!                      └── removed ───────> close ──────> ABSENT
//! ```
//!
//! Lookups by token read two projections:
//!
//! - `storages`: token → destination name → storage
//! - `consumers`: token → destination name → stream consumer, plus one
//!   shared incoming-log consumer per token for batch and synchronous units
//!
//! The projection lock is only taken to mutate the maps; storages are built
//! and closed outside it. Reconciles are serialized.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use courier_config::{DestinationConfig, DestinationsPayload};
use courier_routing::{TokenTable, resolve_tokens};
use courier_sinks::Storage;
use parking_lot::RwLock;

use crate::consumer::{Consumer, LoggerConsumer};
use crate::error::{CloseErrors, PipelineError, Result};
use crate::factory::StorageFactory;
use crate::unit::DestinationUnit;

/// Consumer key of the shared incoming-log consumer of a token
fn logger_key(token: &str) -> String {
    format!("incoming.tok={token}")
}

/// Outcome of one reconcile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub created: Vec<String>,
    pub replaced: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
    /// Destinations that could not be built; they are not running
    pub failed: Vec<String>,
}

impl ReconcileSummary {
    /// Whether the running set changed
    pub fn has_changes(&self) -> bool {
        !(self.created.is_empty() && self.replaced.is_empty() && self.removed.is_empty())
    }
}

struct SharedLogger {
    consumer: Arc<LoggerConsumer>,
    refs: usize,
}

#[derive(Default)]
struct Projections {
    units: HashMap<String, Arc<DestinationUnit>>,
    storages: TokenTable<Arc<dyn Storage>>,
    consumers: TokenTable<Arc<dyn Consumer>>,
    loggers: HashMap<String, SharedLogger>,
}

impl Projections {
    fn register(&mut self, unit: Arc<DestinationUnit>, log_dir: &Path) {
        for token in unit.tokens() {
            if unit.has_own_consumer() {
                self.consumers.insert(token, unit.name(), unit.consumer(token));
            } else {
                let shared = self
                    .loggers
                    .entry(token.clone())
                    .or_insert_with(|| SharedLogger {
                        consumer: Arc::new(LoggerConsumer::new(log_dir, token)),
                        refs: 0,
                    });
                shared.refs += 1;
                let consumer: Arc<dyn Consumer> = Arc::clone(&shared.consumer) as Arc<dyn Consumer>;
                self.consumers.insert(token, logger_key(token), consumer);
            }
            self.storages
                .insert(token, unit.name(), Arc::clone(unit.storage()));
        }
        self.units.insert(unit.name().to_string(), unit);
    }

    /// Remove a unit; returns it with the loggers that lost their last user
    fn unregister(&mut self, name: &str) -> Option<(Arc<DestinationUnit>, Vec<Arc<LoggerConsumer>>)> {
        let unit = self.units.remove(name)?;
        let mut released = Vec::new();

        for token in unit.tokens() {
            self.storages.remove(token, name);
            if unit.has_own_consumer() {
                self.consumers.remove(token, name);
                continue;
            }
            let Some(shared) = self.loggers.get_mut(token) else {
                continue;
            };
            debug_assert!(shared.refs > 0, "logger refcount underflow for {token}");
            shared.refs = shared.refs.saturating_sub(1);
            if shared.refs == 0 {
                self.consumers.remove(token, &logger_key(token));
                if let Some(shared) = self.loggers.remove(token) {
                    released.push(shared.consumer);
                }
            }
        }
        Some((unit, released))
    }
}

/// Registry of running destinations
pub struct DestinationRegistry {
    factory: Arc<dyn StorageFactory>,
    known_tokens: Vec<String>,
    log_dir: PathBuf,
    state: RwLock<Projections>,
    reconcile_lock: tokio::sync::Mutex<bool>,
}

impl DestinationRegistry {
    /// Create an empty registry
    ///
    /// `known_tokens` is what a destination without `only_tokens` serves;
    /// incoming logs go under `log_dir`.
    pub fn new(
        factory: Arc<dyn StorageFactory>,
        known_tokens: Vec<String>,
        log_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            factory,
            known_tokens,
            log_dir: log_dir.into(),
            state: RwLock::new(Projections::default()),
            reconcile_lock: tokio::sync::Mutex::new(false),
        }
    }

    /// Consumers registered for a token (snapshot)
    pub fn consumers(&self, token: &str) -> Vec<Arc<dyn Consumer>> {
        self.state.read().consumers.get(token)
    }

    /// Storages registered for a token (snapshot)
    pub fn storages(&self, token: &str) -> Vec<Arc<dyn Storage>> {
        self.state.read().storages.get(token)
    }

    /// Running unit by destination name
    pub fn unit(&self, name: &str) -> Option<Arc<DestinationUnit>> {
        self.state.read().units.get(name).cloned()
    }

    /// Names of the running destinations, sorted
    pub fn unit_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().units.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Tokens with at least one storage
    pub fn tokens(&self) -> Vec<String> {
        self.state
            .read()
            .storages
            .tokens()
            .map(str::to_string)
            .collect()
    }

    #[inline]
    pub fn factory(&self) -> &Arc<dyn StorageFactory> {
        &self.factory
    }

    /// Parse a destinations payload and reconcile with it
    ///
    /// # Errors
    ///
    /// Returns `Config` if the payload does not parse; running destinations
    /// are left untouched.
    pub async fn update_config(&self, raw: &[u8]) -> Result<ReconcileSummary> {
        let payload = DestinationsPayload::from_json(raw).inspect_err(|e| {
            tracing::error!(error = %e, "invalid destinations payload, keeping current destinations");
        })?;
        self.reconcile(payload.destinations).await
    }

    /// Make the running destinations match `destinations`
    ///
    /// A destination that fails to build is logged and skipped; the others
    /// are still applied.
    ///
    /// # Errors
    ///
    /// Returns `Closed` after [`close`](Self::close).
    pub async fn reconcile(
        &self,
        destinations: BTreeMap<String, DestinationConfig>,
    ) -> Result<ReconcileSummary> {
        let closed = self.reconcile_lock.lock().await;
        if *closed {
            return Err(PipelineError::Closed);
        }

        let mut summary = ReconcileSummary::default();
        let running: HashMap<String, String> = self
            .state
            .read()
            .units
            .iter()
            .map(|(name, unit)| (name.clone(), unit.config_hash().to_string()))
            .collect();

        for name in running.keys().filter(|n| !destinations.contains_key(*n)) {
            self.teardown(name).await;
            summary.removed.push(name.clone());
        }

        let mut built = Vec::new();
        for (name, config) in &destinations {
            let hash = config.content_hash();
            let replacing = match running.get(name) {
                Some(current) if *current == hash => {
                    summary.unchanged.push(name.clone());
                    continue;
                }
                Some(_) => {
                    self.teardown(name).await;
                    true
                }
                None => false,
            };

            match self.build(name, config, hash).await {
                Ok(unit) => {
                    tracing::info!(
                        destination = %name,
                        kind = %config.kind,
                        mode = config.mode.as_str(),
                        tokens = ?unit.tokens(),
                        "destination started"
                    );
                    built.push((name.clone(), replacing, unit));
                }
                Err(e) => {
                    tracing::error!(destination = %name, error = %e, "failed to start destination");
                    summary.failed.push(name.clone());
                }
            }
        }

        // readers see either none or all of the new units
        {
            let mut state = self.state.write();
            for (_, _, unit) in &built {
                state.register(Arc::clone(unit), &self.log_dir);
            }
        }
        for (name, replacing, _) in built {
            if replacing {
                summary.replaced.push(name);
            } else {
                summary.created.push(name);
            }
        }

        summary.removed.sort_unstable();
        if summary.has_changes() || !summary.failed.is_empty() {
            tracing::info!(
                created = summary.created.len(),
                replaced = summary.replaced.len(),
                removed = summary.removed.len(),
                unchanged = summary.unchanged.len(),
                failed = summary.failed.len(),
                "destinations reconciled"
            );
        }
        Ok(summary)
    }

    /// Close every destination and shared consumer
    ///
    /// Keeps going past failures.
    ///
    /// # Errors
    ///
    /// Returns every close that failed.
    pub async fn close(&self) -> std::result::Result<(), CloseErrors> {
        let mut closed = self.reconcile_lock.lock().await;
        *closed = true;

        let removed: Vec<_> = {
            let mut state = self.state.write();
            let names: Vec<String> = state.units.keys().cloned().collect();
            names
                .iter()
                .filter_map(|name| state.unregister(name))
                .collect()
        };

        let mut errors = CloseErrors::new();
        for (unit, loggers) in removed {
            for logger in loggers {
                errors.record(&logger_key(logger.token_id()), logger.close());
            }
            errors.record(unit.name(), unit.close().await);
        }

        tracing::info!(failures = errors.len(), "destination registry closed");
        errors.into_result()
    }

    async fn build(
        &self,
        name: &str,
        config: &DestinationConfig,
        hash: String,
    ) -> Result<Arc<DestinationUnit>> {
        let tokens = resolve_tokens(name, &config.only_tokens, &self.known_tokens)?;
        let storage = self.factory.create(name, config).await?;
        Ok(Arc::new(DestinationUnit::new(name, hash, tokens, storage)))
    }

    /// Unregister a unit, then close it and the loggers it released
    async fn teardown(&self, name: &str) {
        let removed = self.state.write().unregister(name);
        let Some((unit, loggers)) = removed else {
            return;
        };

        for logger in loggers {
            if let Err(e) = logger.close() {
                tracing::error!(token = %logger.token_id(), error = %e, "failed to close incoming log");
            }
        }
        match unit.close().await {
            Ok(()) => tracing::info!(destination = %name, "destination stopped"),
            Err(e) => tracing::error!(destination = %name, error = %e, "failed to close destination"),
        }
    }
}

impl std::fmt::Debug for DestinationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("DestinationRegistry")
            .field("units", &state.units.len())
            .field("tokens", &state.storages.token_count())
            .field("loggers", &state.loggers.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;
