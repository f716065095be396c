//! HTTP transport
//!
//! Requests and responses are plain values so that the session logic (retry,
//! classification, pagination) can be driven by any transport. The production
//! transport wraps one blocking reqwest client per script run.

use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::constants;

// ============================================================================
// REQUEST / RESPONSE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::Put, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::Patch, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    /// Add a query parameter
    pub fn query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    /// Add a query parameter only when a value is present
    pub fn query_opt<T: ToString>(self, name: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.query(name, value),
            None => self,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Look up a query parameter value
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn json_body(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON, degrading to an empty object
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            if !self.body.is_empty() {
                log::debug!("Response body is not JSON ({}), using empty object", e);
            }
            Value::Object(Map::new())
        })
    }

    /// Decode the body as JSON, `None` when it does not parse
    pub fn try_json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Canonical reason phrase for the status code
    pub fn reason(&self) -> &'static str {
        reqwest::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("Unknown Status")
    }
}

// ============================================================================
// TRANSPORT
// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Failed to create HTTP client: {0}")]
    Build(String),

    #[error("Invalid URL {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    Request(String),
}

/// Something that can carry a request to a vendor and bring the response back
pub trait HttpTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Block the current script (rate-limit waits, poll intervals)
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Per-session transport settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub verify_ssl: bool,
    pub timeout: Option<Duration>,
}

impl SessionSettings {
    pub fn new(verify_ssl: bool) -> Self {
        Self { verify_ssl, timeout: None }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Opens a fresh transport for every client constructed by a script
pub trait TransportFactory {
    fn open(&self, settings: &SessionSettings) -> Result<Box<dyn HttpTransport>, TransportError>;
}

// ============================================================================
// REQWEST TRANSPORT
// ============================================================================

pub struct BlockingTransport {
    client: reqwest::blocking::Client,
}

impl BlockingTransport {
    pub fn new(verify_ssl: bool, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_ssl)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        Ok(Self { client })
    }
}

impl HttpTransport for BlockingTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        log::debug!("{} {}", request.method.as_str(), request.url);

        let mut builder = self.client.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (name.as_str().to_string(), value.to_str().unwrap_or_default().to_string())
            })
            .collect();
        let body = response
            .bytes()
            .map_err(|e| TransportError::Request(e.to_string()))?
            .to_vec();

        Ok(HttpResponse { status, headers, body })
    }
}

/// Factory for the production transport
#[derive(Debug, Clone, Default)]
pub struct BlockingTransportFactory {
    timeout_override: Option<Duration>,
}

impl BlockingTransportFactory {
    pub fn new(timeout_override: Option<Duration>) -> Self {
        Self { timeout_override }
    }

    /// Override, then the session's own timeout, then the crate default
    pub fn timeout_for(&self, settings: &SessionSettings) -> Duration {
        self.timeout_override
            .or(settings.timeout)
            .unwrap_or_else(|| Duration::from_secs(constants::DEFAULT_REQUEST_TIMEOUT))
    }
}

impl TransportFactory for BlockingTransportFactory {
    fn open(&self, settings: &SessionSettings) -> Result<Box<dyn HttpTransport>, TransportError> {
        let timeout = self.timeout_for(settings);
        log::debug!("Opening HTTP session (verify_ssl={}, timeout={:?})", settings.verify_ssl, timeout);
        Ok(Box::new(BlockingTransport::new(settings.verify_ssl, timeout)?))
    }
}
