//! Destination configuration payloads
//!
//! Destinations are not part of the TOML file: they arrive as JSON from a
//! destinations source (inline, file or HTTP) and are reloaded at runtime.
//!
//! ```json
//! {
//!   "destinations": {
//!     "pg_main": {
//!       "type": "postgres",
//!       "mode": "stream",
//!       "only_tokens": ["js.public"],
//!       "data_layout": {
//!         "table_name_template": "events_{{ .event_type }}",
//!         "primary_key_fields": ["eventn_ctx_event_id"]
//!       },
//!       "datasource": {"host": "db", "database": "analytics"}
//!     },
//!     "hook": {
//!       "type": "webhook",
//!       "webhook": {"url": "https://example.com/{{ .event_type }}"}
//!     }
//!   }
//! }
//! ```
//!
//! # Change detection
//!
//! [`DestinationConfig::content_hash`] is the SHA-256 of the config's
//! canonical JSON (object keys sorted at every level). Two configs with the
//! same hash are interchangeable; a different hash means the running unit is
//! torn down and rebuilt.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{ConfigError, Result};

/// Destination type served by the HTTP request factory
pub const WEBHOOK_KIND: &str = "webhook";

/// How events reach the destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationMode {
    /// Per-event delivery through a retry queue (default)
    #[default]
    Stream,
    /// Logged to disk and uploaded in batches by an external uploader
    Batch,
    /// Written inline by the caller, result returned to it
    Synchronous,
}

impl DestinationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stream => "stream",
            Self::Batch => "batch",
            Self::Synchronous => "synchronous",
        }
    }
}

/// What a mapping rule does to its source field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingAction {
    /// Move `src` to `dst`
    Move,
    /// Delete `src`
    Remove,
    /// Set `dst` to `value`
    Constant,
}

/// One field mapping rule; paths are `/`-separated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRule {
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub dst: String,
    pub action: MappingAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Field mappings applied before flattening
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mappings {
    /// Keep fields no rule mentions
    /// Default: true
    #[serde(default = "default_true")]
    pub keep_unmapped: bool,

    #[serde(default)]
    pub rules: Vec<MappingRule>,
}

impl Default for Mappings {
    fn default() -> Self {
        Self {
            keep_unmapped: true,
            rules: Vec::new(),
        }
    }
}

/// Table layout for SQL destinations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataLayout {
    /// `{{ .field }}` template for the table name (blank means `events`)
    pub table_name_template: String,

    /// Primary key columns (after flattening)
    pub primary_key_fields: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mappings: Option<Mappings>,
}

/// Events cache toggle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachingConfig {
    pub disabled: bool,
}

/// Users recognition override
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsersRecognition {
    pub enabled: bool,
}

/// HTTP request template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// URL template
    pub url: String,

    /// Default: POST
    #[serde(default = "default_method")]
    pub method: String,

    /// Header templates
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Body template (the event as JSON when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// One destination as declared by the destinations source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Destination type (`postgres`, `clickhouse`, `webhook`, ...)
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub mode: DestinationMode,

    /// Tokens whose events this destination receives (empty means all)
    #[serde(default)]
    pub only_tokens: Vec<String>,

    #[serde(default)]
    pub data_layout: DataLayout,

    #[serde(default)]
    pub caching: CachingConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users_recognition: Option<UsersRecognition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookConfig>,

    /// Adapter-specific connection settings, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<Value>,
}

impl DestinationConfig {
    /// Create a config of the given type with defaults
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            mode: DestinationMode::default(),
            only_tokens: Vec::new(),
            data_layout: DataLayout::default(),
            caching: CachingConfig::default(),
            users_recognition: None,
            webhook: None,
            datasource: None,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: DestinationMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.webhook = Some(WebhookConfig {
            url: url.into(),
            method: default_method(),
            headers: BTreeMap::new(),
            body: None,
        });
        self
    }

    /// Hex SHA-256 of the canonical serialized config
    pub fn content_hash(&self) -> String {
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        let canonical = canonicalize(value).to_string();
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }

    /// Check the config of destination `name`
    ///
    /// # Errors
    ///
    /// Returns an error for an empty type, a webhook without URL or an
    /// incomplete mapping rule.
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.kind.trim().is_empty() {
            return Err(ConfigError::missing_field("destination", name, "type"));
        }
        if self.kind == WEBHOOK_KIND {
            match &self.webhook {
                Some(webhook) if !webhook.url.trim().is_empty() => {}
                _ => return Err(ConfigError::missing_field("destination", name, "webhook.url")),
            }
        }
        if let Some(mappings) = &self.data_layout.mappings {
            for rule in &mappings.rules {
                let valid = match rule.action {
                    MappingAction::Move => !rule.src.is_empty() && !rule.dst.is_empty(),
                    MappingAction::Remove => !rule.src.is_empty(),
                    MappingAction::Constant => !rule.dst.is_empty() && rule.value.is_some(),
                };
                if !valid {
                    return Err(ConfigError::invalid_value(
                        "destination",
                        name,
                        "data_layout.mappings",
                        format!("incomplete {:?} rule", rule.action).to_lowercase(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Destinations source payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestinationsPayload {
    #[serde(default)]
    pub destinations: BTreeMap<String, DestinationConfig>,
}

impl DestinationsPayload {
    /// Parse a JSON payload
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a destinations object.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Hash of the whole payload, for skipping unchanged reloads
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for (name, config) in &self.destinations {
            hasher.update(name.as_bytes());
            hasher.update([0]);
            hasher.update(config.content_hash().as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

fn default_true() -> bool {
    true
}

fn default_method() -> String {
    "POST".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "destinations": {
            "pg": {
                "type": "postgres",
                "only_tokens": ["t1", "t2"],
                "data_layout": {"table_name_template": "events", "primary_key_fields": ["id"]},
                "datasource": {"host": "db", "port": 5432}
            },
            "hook": {
                "type": "webhook",
                "mode": "batch",
                "webhook": {"url": "http://hook/{{ .event_type }}"}
            }
        }
    }"#;

    #[test]
    fn test_parse_payload() {
        let payload = DestinationsPayload::from_json(PAYLOAD.as_bytes()).unwrap();
        assert_eq!(payload.destinations.len(), 2);

        let pg = &payload.destinations["pg"];
        assert_eq!(pg.kind, "postgres");
        assert_eq!(pg.mode, DestinationMode::Stream);
        assert_eq!(pg.only_tokens, vec!["t1", "t2"]);
        assert_eq!(pg.data_layout.primary_key_fields, vec!["id"]);

        let hook = &payload.destinations["hook"];
        assert_eq!(hook.mode, DestinationMode::Batch);
        assert_eq!(hook.webhook.as_ref().unwrap().method, "POST");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(DestinationsPayload::from_json(b"{\"destinations\": [1]}").is_err());
        assert!(DestinationsPayload::from_json(b"not json").is_err());
    }

    #[test]
    fn test_empty_payload() {
        let payload = DestinationsPayload::from_json(b"{}").unwrap();
        assert!(payload.destinations.is_empty());
    }

    #[test]
    fn test_hash_stable_and_key_order_independent() {
        let a: DestinationConfig = serde_json::from_str(
            r#"{"type": "postgres", "datasource": {"host": "db", "port": 5432}}"#,
        )
        .unwrap();
        let b: DestinationConfig = serde_json::from_str(
            r#"{"datasource": {"port": 5432, "host": "db"}, "type": "postgres"}"#,
        )
        .unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 64);
    }

    #[test]
    fn test_hash_changes_with_content() {
        let a = DestinationConfig::new("postgres").with_tokens(["t1"]);
        let b = DestinationConfig::new("postgres").with_tokens(["t1", "t2"]);
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_validate() {
        assert!(DestinationConfig::new("postgres").validate("pg").is_ok());
        assert!(DestinationConfig::new(" ").validate("x").is_err());
        assert!(DestinationConfig::new("webhook").validate("hook").is_err());
        assert!(
            DestinationConfig::new("webhook")
                .with_webhook("http://hook")
                .validate("hook")
                .is_ok()
        );
    }

    #[test]
    fn test_validate_mapping_rules() {
        let mut config = DestinationConfig::new("postgres");
        config.data_layout.mappings = Some(Mappings {
            keep_unmapped: true,
            rules: vec![MappingRule {
                src: "/a".into(),
                dst: String::new(),
                action: MappingAction::Move,
                value: None,
            }],
        });
        let err = config.validate("pg").unwrap_err();
        assert!(err.to_string().contains("incomplete move rule"));
    }

    #[test]
    fn test_mode_serde() {
        let config: DestinationConfig =
            serde_json::from_str(r#"{"type": "x", "mode": "synchronous"}"#).unwrap();
        assert_eq!(config.mode, DestinationMode::Synchronous);
        assert_eq!(config.mode.as_str(), "synchronous");
    }
}
