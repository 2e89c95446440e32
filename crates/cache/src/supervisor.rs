//! Supervised background tasks
//!
//! `supervise` runs a task built by a factory and restarts it when it panics
//! or returns an error, waiting with capped exponential backoff between
//! attempts. A task that returns `Ok(())` is finished and is not restarted.
//! Cancellation stops the restart loop; the task itself is expected to watch
//! the same token and return.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Restart backoff settings
#[derive(Debug, Clone, Copy)]
pub struct SupervisorConfig {
    /// Delay before the first restart
    pub initial_backoff: Duration,

    /// Upper bound for the delay
    pub max_backoff: Duration,

    /// A run at least this long resets the delay
    pub stable_after: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            stable_after: Duration::from_secs(60),
        }
    }
}

/// Run a task under supervision with default backoff
pub fn supervise<F, Fut, E>(
    name: impl Into<String>,
    cancel: CancellationToken,
    factory: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    supervise_with(name, SupervisorConfig::default(), cancel, factory)
}

/// Run a task under supervision
pub fn supervise_with<F, Fut, E>(
    name: impl Into<String>,
    config: SupervisorConfig,
    cancel: CancellationToken,
    factory: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let name = name.into();
    tokio::spawn(async move {
        let mut backoff = config.initial_backoff;
        let mut restarts: u64 = 0;

        loop {
            let started = Instant::now();
            match tokio::spawn(factory()).await {
                Ok(Ok(())) => {
                    tracing::debug!(task = %name, "supervised task finished");
                    break;
                }
                Ok(Err(e)) => {
                    tracing::error!(task = %name, error = %e, restarts, "supervised task failed");
                }
                Err(join) if join.is_panic() => {
                    tracing::error!(task = %name, restarts, "supervised task panicked");
                }
                Err(_) => {
                    tracing::debug!(task = %name, "supervised task cancelled");
                    break;
                }
            }

            if cancel.is_cancelled() {
                break;
            }
            if started.elapsed() >= config.stable_after {
                backoff = config.initial_backoff;
            }

            tokio::select! {
                () = tokio::time::sleep(backoff) => {}
                () = cancel.cancelled() => break,
            }
            backoff = (backoff * 2).min(config.max_backoff);
            restarts += 1;
            tracing::info!(task = %name, restarts, "restarting supervised task");
        }
    })
}
