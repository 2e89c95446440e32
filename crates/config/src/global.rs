//! Global configuration settings
//!
//! Server identity and the token universe shared by all destinations.

use serde::Deserialize;

/// Global configuration that applies to all components
///
/// # Example
///
/// ```toml
/// [global]
/// server_name = "courier-eu-1"
/// tokens = ["js.public", "s2s.secret"]
/// log_dir = "/var/log/courier"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Name of this server instance, used in fallback file names
    /// Default: "courier"
    pub server_name: String,

    /// Every token this server accepts
    ///
    /// Destinations without `only_tokens` subscribe to all of them.
    pub tokens: Vec<String>,

    /// Directory for fallback and incoming event logs
    /// Default: "logs"
    pub log_dir: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            server_name: "courier".into(),
            tokens: Vec::new(),
            log_dir: "logs".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GlobalConfig::default();
        assert_eq!(config.server_name, "courier");
        assert!(config.tokens.is_empty());
        assert_eq!(config.log_dir, "logs");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: GlobalConfig = toml::from_str(r#"tokens = ["t1", "t2"]"#).unwrap();
        assert_eq!(config.tokens, vec!["t1", "t2"]);
        assert_eq!(config.server_name, "courier");
    }
}
