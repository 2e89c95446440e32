//! Courier - event routing and destination delivery server
//!
//! # Usage
//!
//! ```bash
//! # Run the server (default)
//! courier
//! courier --config configs/courier.toml
//!
//! # Validate every configured destination and exit
//! courier check
//! courier check --destination warehouse
//! ```

mod app;
mod cmd;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use courier_config::{Config, LogConfig, LogFormat, LogOutput};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Config files tried when `--config` is not given
const DEFAULT_CONFIG_PATHS: [&str; 2] = ["configs/courier.toml", "courier.toml"];

/// Courier - event routing and destination delivery server
#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level or filter directives, overrides `[log] level`
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the server
    Serve,

    /// Test the connection of configured destinations
    Check(cmd::check::CheckArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_path) = load_config(cli.config.as_deref())?;
    init_logging(&config.log, cli.log_level.as_deref())?;

    match cli.command {
        Some(Command::Check(args)) => cmd::check::run(config, args).await,
        Some(Command::Serve) | None => cmd::serve::run(config, config_path).await,
    }
}

/// Load the config file, falling back to defaults when none exists
fn load_config(path: Option<&Path>) -> Result<(Config, Option<PathBuf>)> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        let config = Config::from_file(path).context("failed to load configuration")?;
        return Ok((config, Some(path.to_path_buf())));
    }

    for candidate in DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from) {
        if candidate.exists() {
            let config = Config::from_file(&candidate).context("failed to load configuration")?;
            return Ok((config, Some(candidate)));
        }
    }

    Ok((Config::default(), None))
}

/// Initialize the tracing subscriber for logging
fn init_logging(config: &LogConfig, level_override: Option<&str>) -> Result<()> {
    let level = level_override.unwrap_or(config.level.as_str());
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let (writer, ansi) = match &config.output {
        LogOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), true),
        LogOutput::Stderr => (BoxMakeWriter::new(std::io::stderr), true),
        LogOutput::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {path}"))?;
            (BoxMakeWriter::new(Arc::new(file)), false)
        }
    };

    let layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Console => fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    Ok(())
}
