//! Outbound request model
//!
//! `Request` is what a request factory produces and what the retry queue
//! persists. Bodies are raw bytes; on disk they are base64 encoded so journals
//! stay line-oriented JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Outbound request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// HTTP method (upper-case)
    pub method: String,

    /// Target URL
    pub url: String,

    /// Request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request body
    #[serde(default, with = "base64_body")]
    pub body: Vec<u8>,
}

impl Request {
    /// Create a request without headers or body
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

mod base64_body {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let req = Request::new("post", "http://localhost/hook")
            .with_header("Content-Type", "application/json")
            .with_body(b"{}".to_vec());

        assert_eq!(req.method, "POST");
        assert_eq!(req.headers.get("Content-Type").unwrap(), "application/json");
        assert_eq!(req.body, b"{}");
    }

    #[test]
    fn test_body_is_base64_on_the_wire() {
        let req = Request::new("POST", "http://x").with_body(b"hello".to_vec());
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("aGVsbG8="));

        let back: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
    }
}
