//! Courier Configuration
//!
//! TOML-based server configuration with sensible defaults, plus the JSON
//! destination payloads that are reloaded at runtime.
//! Minimal config should just work - only specify what you need to change.
//!
//! # Parsing
//!
//! ```
//! use courier_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[global]\ntokens = [\"js.public\"]").unwrap();
//! assert_eq!(config.global.tokens.len(), 1);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [global]
//! server_name = "courier-1"
//! tokens = ["js.public", "s2s.secret"]
//! log_dir = "/var/log/courier"
//!
//! [log]
//! level = "info"
//! format = "json"
//!
//! [destinations]
//! source = "/etc/courier/destinations.json"
//! reload_sec = 30
//!
//! [streaming]
//! threads_count = 10
//! retry_count = 5
//! queue_dir = "/var/lib/courier/queues"
//!
//! [cache]
//! capacity_per_destination = 100
//! ```

mod destination;
mod error;
mod global;
mod logging;
mod source;
mod streaming;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use destination::{
    CachingConfig, DataLayout, DestinationConfig, DestinationMode, DestinationsPayload,
    MappingAction, MappingRule, Mappings, UsersRecognition, WEBHOOK_KIND, WebhookConfig,
};
pub use error::{ConfigError, Result};
pub use global::GlobalConfig;
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use source::{ConfigSource, DestinationsConfig};
pub use streaming::{CacheConfig, StreamingConfig};

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server identity, tokens and log directory
    pub global: GlobalConfig,

    /// Logging configuration
    pub log: LogConfig,

    /// Where destination payloads come from
    pub destinations: DestinationsConfig,

    /// Stream-mode delivery tuning
    pub streaming: StreamingConfig,

    /// Events cache
    pub cache: CacheConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or contains invalid TOML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
