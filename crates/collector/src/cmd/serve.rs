//! Serve command - run the Courier server

use std::path::PathBuf;

use anyhow::Result;
use courier_config::Config;
#[cfg(unix)]
use courier_pipeline::ConfigWatcherHandle;
use tokio::signal;
use tracing::{info, warn};

use crate::app::App;

/// Run the server until SIGINT or SIGTERM
pub async fn run(config: Config, config_path: Option<PathBuf>) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        platform = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        config = %config_path.as_ref().map_or_else(|| "(defaults)".into(), |p| p.display().to_string()),
        server_name = %config.global.server_name,
        "Courier starting"
    );

    let app = App::start(&config).await?;

    #[cfg(unix)]
    if let Some(handle) = app.watcher_handle() {
        spawn_reload_on_hangup(handle);
    }

    info!(
        destinations = app.registry().unit_names().len(),
        tokens = app.registry().tokens().len(),
        "Courier running"
    );

    wait_for_shutdown().await;
    info!("shutdown signal received, stopping server...");

    app.shutdown().await;
    info!("Courier shutdown complete");
    Ok(())
}

/// Reload destinations on SIGHUP
#[cfg(unix)]
fn spawn_reload_on_hangup(handle: ConfigWatcherHandle) {
    let mut sig = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(sig) => sig,
        Err(e) => {
            warn!(error = %e, "failed to install SIGHUP handler");
            return;
        }
    };
    tokio::spawn(async move {
        while sig.recv().await.is_some() {
            if handle.trigger_reload() {
                info!("SIGHUP: destinations reload triggered");
            }
        }
    });
    info!("SIGHUP handler installed for destinations reload");
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
