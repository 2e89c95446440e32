//! Destinations source
//!
//! Where the destinations payload comes from and how often it is reloaded.
//!
//! ```toml
//! [destinations]
//! source = "https://configurator.internal/api/v1/destinations"
//! reload_sec = 30
//! ```
//!
//! `source` is classified by shape:
//!
//! ```text
//! "{ ... }"              inline JSON, loaded once
//! "http://…", "https://" fetched with GET every reload_sec
//! anything else          file path, re-read every reload_sec
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::destination::DestinationsPayload;
use crate::error::{ConfigError, Result};

/// `[destinations]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DestinationsConfig {
    /// Inline JSON, file path or URL (no destinations when unset)
    pub source: Option<String>,

    /// Reload interval for file and HTTP sources
    /// Default: 30
    pub reload_sec: u64,

    /// HTTP fetch timeout in seconds
    /// Default: 10
    pub fetch_timeout_sec: u64,
}

impl Default for DestinationsConfig {
    fn default() -> Self {
        Self {
            source: None,
            reload_sec: 30,
            fetch_timeout_sec: 10,
        }
    }
}

impl DestinationsConfig {
    #[inline]
    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.reload_sec)
    }

    /// Classified source, if one is configured
    pub fn config_source(&self) -> Option<ConfigSource> {
        self.source
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(ConfigSource::parse)
    }
}

/// A classified destinations source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Inline(String),
    File(String),
    Http(String),
}

impl ConfigSource {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('{') {
            Self::Inline(trimmed.to_string())
        } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::Http(trimmed.to_string())
        } else {
            Self::File(trimmed.to_string())
        }
    }

    /// Whether reloading can observe new content
    pub fn is_reloadable(&self) -> bool {
        !matches!(self, Self::Inline(_))
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            Self::Inline(_) => "inline".to_string(),
            Self::File(path) => format!("file {path}"),
            Self::Http(url) => format!("url {url}"),
        }
    }

    /// Fetch the raw payload bytes
    ///
    /// # Errors
    ///
    /// Returns `IoError` for unreadable files and `FetchError` for failed or
    /// non-2xx HTTP responses.
    pub async fn load(&self, timeout: Duration) -> Result<Vec<u8>> {
        match self {
            Self::Inline(json) => Ok(json.as_bytes().to_vec()),
            Self::File(path) => tokio::fs::read(path)
                .await
                .map_err(|source| ConfigError::IoError {
                    path: path.clone(),
                    source,
                }),
            Self::Http(url) => fetch(url, timeout).await,
        }
    }

    /// Fetch and parse the payload
    ///
    /// # Errors
    ///
    /// Returns the load error or a `PayloadError` for malformed JSON.
    pub async fn load_payload(&self, timeout: Duration) -> Result<DestinationsPayload> {
        let bytes = self.load(timeout).await?;
        DestinationsPayload::from_json(&bytes)
    }
}

async fn fetch(url: &str, timeout: Duration) -> Result<Vec<u8>> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConfigError::fetch(url, e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ConfigError::fetch(url, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ConfigError::fetch(url, format!("status {}", status.as_u16())));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| ConfigError::fetch(url, e.to_string()))?;
    Ok(body.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAYLOAD: &str = r#"{"destinations": {"pg": {"type": "postgres"}}}"#;
    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_parse_classifies() {
        assert!(matches!(ConfigSource::parse(" {\"a\":1}"), ConfigSource::Inline(_)));
        assert!(matches!(ConfigSource::parse("https://x/y"), ConfigSource::Http(_)));
        assert!(matches!(ConfigSource::parse("http://x/y"), ConfigSource::Http(_)));
        assert_eq!(
            ConfigSource::parse("/etc/courier/destinations.json"),
            ConfigSource::File("/etc/courier/destinations.json".into())
        );
        assert!(!ConfigSource::parse("{}").is_reloadable());
    }

    #[test]
    fn test_destinations_section() {
        let config: DestinationsConfig = toml::from_str("").unwrap();
        assert!(config.config_source().is_none());
        assert_eq!(config.reload_interval(), Duration::from_secs(30));

        let config: DestinationsConfig = toml::from_str(r#"source = "  ""#).unwrap();
        assert!(config.config_source().is_none());
    }

    #[tokio::test]
    async fn test_load_inline() {
        let payload = ConfigSource::parse(PAYLOAD).load_payload(TIMEOUT).await.unwrap();
        assert!(payload.destinations.contains_key("pg"));
    }

    #[tokio::test]
    async fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PAYLOAD.as_bytes()).unwrap();

        let source = ConfigSource::parse(file.path().to_str().unwrap());
        let payload = source.load_payload(TIMEOUT).await.unwrap();
        assert_eq!(payload.destinations.len(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = ConfigSource::File("/nonexistent/courier.json".into())
            .load(TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::IoError { .. }));
    }

    #[tokio::test]
    async fn test_load_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/destinations"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAYLOAD))
            .mount(&server)
            .await;

        let source = ConfigSource::parse(&format!("{}/destinations", server.uri()));
        let payload = source.load_payload(TIMEOUT).await.unwrap();
        assert!(payload.destinations.contains_key("pg"));
    }

    #[tokio::test]
    async fn test_load_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = ConfigSource::parse(&server.uri()).load(TIMEOUT).await.unwrap_err();
        assert!(err.to_string().contains("status 503"));
    }

    #[tokio::test]
    async fn test_load_malformed_payload() {
        let err = ConfigSource::parse("{not json")
            .load_payload(TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::PayloadError(_)));
    }
}
