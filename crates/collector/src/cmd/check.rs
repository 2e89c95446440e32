//! Check command - test destination connections without serving

use anyhow::{Context, Result};
use clap::Args;
use courier_config::Config;
use courier_pipeline::{ConfigWatcherConfig, StorageFactory};
use tracing::{error, info};

use crate::app::build_factory;

/// Check command arguments
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Only check this destination
    #[arg(short, long)]
    pub destination: Option<String>,
}

/// Load the destinations once and test each of them
pub async fn run(config: Config, args: CheckArgs) -> Result<()> {
    let source = config
        .destinations
        .config_source()
        .context("no destinations source configured")?;
    let timeout = ConfigWatcherConfig::from(&config.destinations).fetch_timeout;

    let payload = source
        .load_payload(timeout)
        .await
        .with_context(|| format!("failed to load destinations from {}", source.describe()))?;

    let mut destinations = payload.destinations;
    if let Some(name) = &args.destination {
        destinations.retain(|n, _| n == name);
        if destinations.is_empty() {
            anyhow::bail!("destination '{name}' is not configured");
        }
    }

    let factory = build_factory(&config, None);
    let mut failed = 0usize;
    for (name, destination) in &destinations {
        match factory.test_connection(name, destination).await {
            Ok(()) => info!(destination = %name, kind = %destination.kind, "connection OK"),
            Err(e) => {
                failed += 1;
                error!(destination = %name, kind = %destination.kind, error = %e, "connection failed");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} destination(s) failed the connection test", destinations.len());
    }
    info!(checked = destinations.len(), "all destinations OK");
    Ok(())
}
