//! Request construction

use courier_config::WebhookConfig;
use courier_protocol::{Event, Request, Template};

use crate::common::SinkError;

const CONTENT_TYPE: &str = "Content-Type";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Builds the outbound request for one event
pub trait RequestFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the event cannot be rendered into a request.
    fn create(&self, event: &Event) -> Result<Request, SinkError>;

    fn close(&self) {}
}

/// Request factory driven by webhook templates
///
/// URL, header values and body are `{{ .field }}` templates. Without a body
/// template the event itself is sent as JSON.
#[derive(Debug)]
pub struct WebhookRequestFactory {
    method: String,
    url: Template,
    headers: Vec<(String, Template)>,
    body: Option<Template>,
}

impl WebhookRequestFactory {
    /// # Errors
    ///
    /// Returns `Template` if any template does not parse.
    pub fn new(config: &WebhookConfig) -> Result<Self, SinkError> {
        let url = Template::parse(config.url.trim())?;
        let headers = config
            .headers
            .iter()
            .map(|(name, value)| Ok((name.clone(), Template::parse(value)?)))
            .collect::<Result<Vec<_>, SinkError>>()?;
        let body = config.body.as_deref().map(Template::parse).transpose()?;

        Ok(Self {
            method: config.method.trim().to_ascii_uppercase(),
            url,
            headers,
            body,
        })
    }
}

impl RequestFactory for WebhookRequestFactory {
    fn create(&self, event: &Event) -> Result<Request, SinkError> {
        let url = self.url.render(event)?;
        let mut request = Request::new(&self.method, url);

        for (name, template) in &self.headers {
            request = request.with_header(name, template.render(event)?);
        }

        let body = match &self.body {
            Some(template) => template.render(event)?.into_bytes(),
            None => event.to_json().map_err(SinkError::serialization)?,
        };
        request = request.with_body(body);

        let has_content_type = request
            .headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case(CONTENT_TYPE));
        if !has_content_type {
            request = request.with_header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        }
        Ok(request)
    }
}
