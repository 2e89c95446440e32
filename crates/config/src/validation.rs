//! Configuration validation
//!
//! Validates config consistency:
//! - Server name and log directory are set
//! - Tokens are non-empty and unique
//! - Streaming pool and cache sizes are usable
//! - Reloadable destination sources have a reload interval
//! - Inline destination payloads parse
//!
//! Individual destinations are not validated here: a bad destination is
//! skipped at reconcile time without failing the server.

use std::collections::HashSet;

use crate::Config;
use crate::destination::DestinationsPayload;
use crate::error::{ConfigError, Result};
use crate::source::ConfigSource;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_global(config)?;
    validate_streaming(config)?;
    validate_cache(config)?;
    validate_destinations(config)?;
    Ok(())
}

fn validate_global(config: &Config) -> Result<()> {
    if config.global.server_name.trim().is_empty() {
        return Err(ConfigError::missing_field("global", "global", "server_name"));
    }
    if config.global.log_dir.trim().is_empty() {
        return Err(ConfigError::missing_field("global", "global", "log_dir"));
    }

    let mut seen = HashSet::new();
    for token in &config.global.tokens {
        if token.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "global",
                "global",
                "tokens",
                "empty token",
            ));
        }
        if !seen.insert(token.as_str()) {
            return Err(ConfigError::invalid_value(
                "global",
                "global",
                "tokens",
                format!("duplicate token '{token}'"),
            ));
        }
    }
    Ok(())
}

fn validate_streaming(config: &Config) -> Result<()> {
    let streaming = &config.streaming;
    if streaming.threads_count == 0 {
        return Err(ConfigError::invalid_value(
            "streaming",
            "streaming",
            "threads_count",
            "must be at least 1",
        ));
    }
    if streaming.http_timeout_sec == 0 {
        return Err(ConfigError::invalid_value(
            "streaming",
            "streaming",
            "http_timeout_sec",
            "must be at least 1",
        ));
    }
    if streaming.queue_capacity == Some(0) {
        return Err(ConfigError::invalid_value(
            "streaming",
            "streaming",
            "queue_capacity",
            "must be at least 1 when set",
        ));
    }
    if let Some(ref dir) = streaming.queue_dir
        && dir.trim().is_empty()
    {
        return Err(ConfigError::invalid_value(
            "streaming",
            "streaming",
            "queue_dir",
            "must not be blank when set",
        ));
    }
    Ok(())
}

fn validate_cache(config: &Config) -> Result<()> {
    let cache = &config.cache;
    if !cache.enabled {
        return Ok(());
    }
    if cache.capacity_per_destination == 0 {
        return Err(ConfigError::invalid_value(
            "cache",
            "cache",
            "capacity_per_destination",
            "must be at least 1",
        ));
    }
    if cache.channel_size == 0 {
        return Err(ConfigError::invalid_value(
            "cache",
            "cache",
            "channel_size",
            "must be at least 1",
        ));
    }
    Ok(())
}

fn validate_destinations(config: &Config) -> Result<()> {
    let Some(source) = config.destinations.config_source() else {
        return Ok(());
    };

    match source {
        ConfigSource::Inline(json) => {
            DestinationsPayload::from_json(json.as_bytes())?;
        }
        ConfigSource::File(_) | ConfigSource::Http(_) => {
            if config.destinations.reload_sec == 0 {
                return Err(ConfigError::invalid_value(
                    "destinations",
                    "destinations",
                    "reload_sec",
                    "must be at least 1 for file and http sources",
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn parse(toml: &str) -> Result<Config> {
        Config::from_str(toml)
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_duplicate_token() {
        let err = parse("[global]\ntokens = [\"a\", \"b\", \"a\"]").unwrap_err();
        assert!(err.to_string().contains("duplicate token 'a'"));
    }

    #[test]
    fn test_empty_token() {
        assert!(parse("[global]\ntokens = [\"a\", \" \"]").is_err());
    }

    #[test]
    fn test_blank_server_name() {
        let err = parse("[global]\nserver_name = \"\"").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "server_name", .. }));
    }

    #[test]
    fn test_zero_queue_capacity() {
        assert!(parse("[streaming]\nqueue_capacity = 0").is_err());
        assert!(parse("[streaming]\nqueue_capacity = 10").is_ok());
    }

    #[test]
    fn test_cache_sizes_ignored_when_disabled() {
        assert!(parse("[cache]\ncapacity_per_destination = 0").is_err());
        assert!(parse("[cache]\nenabled = false\ncapacity_per_destination = 0").is_ok());
    }

    #[test]
    fn test_inline_source_must_parse() {
        let bad = "[destinations]\nsource = '{\"destinations\": 5}'";
        assert!(matches!(parse(bad), Err(ConfigError::PayloadError(_))));

        let good = "[destinations]\nsource = '{\"destinations\": {}}'";
        assert!(parse(good).is_ok());
    }

    #[test]
    fn test_reload_interval_required_for_polling() {
        let toml = "[destinations]\nsource = \"dest.json\"\nreload_sec = 0";
        assert!(parse(toml).is_err());

        let inline = "[destinations]\nsource = '{}'\nreload_sec = 0";
        assert!(parse(inline).is_ok());
    }
}
