//! HTTP delivery
//!
//! [`HttpDelivery`] executes [`Request`]s built by a [`RequestFactory`]. A
//! response status in `200..=299` is a success; any other status or transport
//! error is a failure for the retry policy to handle.

mod factory;

use std::time::Duration;

use async_trait::async_trait;
use courier_config::StreamingConfig;
use courier_protocol::{EventContext, Request};
use parking_lot::RwLock;
use reqwest::Method;

use crate::common::SinkError;
use crate::delivery::Delivery;

pub use factory::{RequestFactory, WebhookRequestFactory};

/// Response bodies longer than this are cut in error messages
const MAX_ERROR_BODY: usize = 512;

/// HTTP client tuning
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub max_idle_conns: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_idle_conns: 100,
        }
    }
}

impl From<&StreamingConfig> for HttpConfig {
    fn from(config: &StreamingConfig) -> Self {
        Self {
            timeout: config.http_timeout(),
            max_idle_conns: config.max_idle_conns,
        }
    }
}

/// Sends requests with a pooled client owned by one destination
#[derive(Debug)]
pub struct HttpDelivery {
    destination_id: String,
    client: RwLock<Option<reqwest::Client>>,
}

impl HttpDelivery {
    /// # Errors
    ///
    /// Returns `Init` if the client cannot be built.
    pub fn new(destination_id: impl Into<String>, config: &HttpConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.max_idle_conns)
            .build()
            .map_err(|e| SinkError::init(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            destination_id: destination_id.into(),
            client: RwLock::new(Some(client)),
        })
    }

    /// Execute one request, returning the response status
    ///
    /// # Errors
    ///
    /// `Timeout` or `Connection` for transport failures, `Http` for a
    /// non-2xx status, `Closed` after [`Delivery::close`].
    pub async fn send(&self, request: &Request) -> Result<u16, SinkError> {
        let client = self
            .client
            .read()
            .clone()
            .ok_or_else(|| SinkError::closed(&self.destination_id))?;

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| SinkError::config(format!("invalid HTTP method '{}'", request.method)))?;

        let mut builder = client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                SinkError::Timeout(e.to_string())
            } else if e.is_connect() {
                SinkError::Connection(format!("connection failed: {e}"))
            } else {
                SinkError::Connection(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if (200..=299).contains(&status) {
            return Ok(status);
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(SinkError::Http { status, body })
    }
}

#[async_trait]
impl Delivery for HttpDelivery {
    type Payload = Request;

    async fn deliver(&self, payload: &Request, context: &mut EventContext) -> Result<(), SinkError> {
        self.send(payload).await?;
        context.http_request = Some(payload.clone());
        Ok(())
    }

    /// Drops the client and with it every idle connection
    async fn close(&self) -> Result<(), SinkError> {
        self.client.write().take();
        Ok(())
    }
}
