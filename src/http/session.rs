//! REST session: base URL, default headers, rate-limit retry and response
//! classification shared by every vendor client.

use std::time::Duration;

use serde_json::Value;

use super::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

// ============================================================================
// ERROR CLASSIFICATION
// ============================================================================

/// Vendor error types the session can produce on its own
pub trait ApiError: From<TransportError> {
    /// The retry budget for the rate-limit status was exhausted
    fn rate_limited(message: String) -> Self;

    /// Generic wrap of a non-2xx response nothing more specific understood
    fn http_status(status: u16, message: String) -> Self;
}

/// Turns a failed response into a vendor error. One implementation per
/// endpoint family; each client maps its endpoint identifiers onto them.
pub trait ResponseInterpreter<E>: Sync {
    fn interpret(&self, response: &HttpResponse) -> E;
}

/// Fallback: wrap the HTTP status line and body text
pub struct StatusTextInterpreter;

impl<E: ApiError> ResponseInterpreter<E> for StatusTextInterpreter {
    fn interpret(&self, response: &HttpResponse) -> E {
        E::http_status(response.status, status_text(response))
    }
}

/// "404 Not Found: <body>"
pub fn status_text(response: &HttpResponse) -> String {
    let text = response.text();
    if text.trim().is_empty() {
        format!("{} {}", response.status, response.reason())
    } else {
        format!("{} {}: {}", response.status, response.reason(), text.trim())
    }
}

/// First string found at any of the given JSON pointers
pub fn message_at(body: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|pointer| match body.pointer(pointer) {
        Some(Value::String(message)) if !message.trim().is_empty() => Some(message.clone()),
        _ => None,
    })
}

// ============================================================================
// RETRY POLICY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Status code the vendor uses for rate limiting
    pub rate_limit_status: u16,
    /// Transparent retries before giving up
    pub max_retries: u32,
    /// Fixed wait before every retry
    pub wait: Duration,
}

impl RetryPolicy {
    pub fn new(rate_limit_status: u16, max_retries: u32, wait: Duration) -> Self {
        Self { rate_limit_status, max_retries, wait }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(429, 3, Duration::from_secs(5))
    }
}

// ============================================================================
// SESSION
// ============================================================================

pub struct RestSession {
    base_url: String,
    default_headers: Vec<(String, String)>,
    retry: RetryPolicy,
    transport: Box<dyn HttpTransport>,
}

impl RestSession {
    pub fn new(base_url: &str, transport: Box<dyn HttpTransport>) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            default_headers: Vec::new(),
            retry: RetryPolicy::default(),
            transport,
        }
    }

    /// Attach a header to every request of this session
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.default_headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Join a path onto the base URL
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Join a path and percent-encoded path segments onto the base URL
    pub fn url_with_segments(&self, path: &str, segments: &[&str]) -> Result<String, TransportError> {
        let raw = self.url(path);
        let mut url = reqwest::Url::parse(&raw)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", raw, e)))?;
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(raw.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.to_string())
    }

    /// Block for the given duration through the transport
    pub fn pause(&self, duration: Duration) {
        self.transport.pause(duration);
    }

    /// Send a request: default headers, rate-limit retry, then classification
    pub fn dispatch<E: ApiError>(
        &self,
        mut request: HttpRequest,
        interpreter: &dyn ResponseInterpreter<E>,
    ) -> Result<HttpResponse, E> {
        for (name, value) in &self.default_headers {
            if request.header_value(name).is_none() {
                request.headers.push((name.clone(), value.clone()));
            }
        }

        let mut retries_left = self.retry.max_retries;
        loop {
            let response = self.transport.execute(&request)?;

            if response.status == self.retry.rate_limit_status {
                if retries_left == 0 {
                    log::error!(
                        "{} {} still rate limited after {} retries",
                        request.method.as_str(),
                        request.url,
                        self.retry.max_retries
                    );
                    return Err(E::rate_limited(format!(
                        "Rate limit reached, {} retries exhausted",
                        self.retry.max_retries
                    )));
                }
                retries_left -= 1;
                log::warn!(
                    "Rate limited on {}, waiting {}s before retry ({} left)",
                    request.url,
                    self.retry.wait.as_secs(),
                    retries_left
                );
                self.transport.pause(self.retry.wait);
                continue;
            }

            if response.is_success() {
                return Ok(response);
            }

            log::debug!(
                "{} {} failed with status {}",
                request.method.as_str(),
                request.url,
                response.status
            );
            return Err(interpreter.interpret(&response));
        }
    }

    /// Dispatch and decode the body as JSON (empty object when it is not JSON)
    pub fn dispatch_json<E: ApiError>(
        &self,
        request: HttpRequest,
        interpreter: &dyn ResponseInterpreter<E>,
    ) -> Result<Value, E> {
        Ok(self.dispatch(request, interpreter)?.json())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::MockTransport;
    use crate::http::transport::Method;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transport(String),
        RateLimited(String),
        Status(u16, String),
    }

    impl From<TransportError> for TestError {
        fn from(err: TransportError) -> Self {
            TestError::Transport(err.to_string())
        }
    }

    impl ApiError for TestError {
        fn rate_limited(message: String) -> Self {
            TestError::RateLimited(message)
        }

        fn http_status(status: u16, message: String) -> Self {
            TestError::Status(status, message)
        }
    }

    fn session(mock: &MockTransport, retry: RetryPolicy) -> RestSession {
        RestSession::new("https://vendor.example.com/", Box::new(mock.clone()))
            .with_header("X-Api-Key", "secret")
            .with_retry(retry)
    }

    #[test]
    fn test_rate_limit_retried_exactly_budget_times() {
        let mock = MockTransport::new();
        mock.on(Method::Get, "/items", 429, json!({"detail": "slow down"}));
        let retry = RetryPolicy::new(429, 3, Duration::from_secs(7));
        let session = session(&mock, retry);

        let result = session.dispatch::<TestError>(
            HttpRequest::get(session.url("items")),
            &StatusTextInterpreter,
        );

        assert!(matches!(result, Err(TestError::RateLimited(_))));
        // One initial attempt plus three retries
        assert_eq!(mock.requests().len(), 4);
        assert_eq!(mock.pauses(), vec![Duration::from_secs(7); 3]);
    }

    #[test]
    fn test_rate_limit_recovers_within_budget() {
        let mock = MockTransport::new();
        mock.on(Method::Get, "/items", 429, json!({}));
        mock.on(Method::Get, "/items", 200, json!({"results": [1, 2]}));
        let session = session(&mock, RetryPolicy::new(429, 3, Duration::from_secs(1)));

        let body = session
            .dispatch_json::<TestError>(HttpRequest::get(session.url("/items")), &StatusTextInterpreter)
            .unwrap();

        assert_eq!(body["results"], json!([1, 2]));
        assert_eq!(mock.pauses().len(), 1);
    }

    #[test]
    fn test_default_headers_attached() {
        let mock = MockTransport::new();
        mock.on(Method::Get, "/ping", 200, json!({}));
        let session = session(&mock, RetryPolicy::default());

        session
            .dispatch::<TestError>(HttpRequest::get(session.url("ping")), &StatusTextInterpreter)
            .unwrap();

        let request = &mock.requests()[0];
        assert_eq!(request.url, "https://vendor.example.com/ping");
        assert_eq!(request.header_value("x-api-key"), Some("secret"));
    }

    #[test]
    fn test_non_json_success_degrades_to_empty_object() {
        let mock = MockTransport::new();
        mock.on_raw(Method::Get, "/text", HttpResponse::new(200, "plain text"));
        let session = session(&mock, RetryPolicy::default());

        let body = session
            .dispatch_json::<TestError>(HttpRequest::get(session.url("text")), &StatusTextInterpreter)
            .unwrap();

        assert_eq!(body, json!({}));
    }

    #[test]
    fn test_fallback_interpreter_wraps_status_text() {
        let mock = MockTransport::new();
        mock.on_raw(Method::Delete, "/items/1", HttpResponse::new(418, "teapot"));
        let session = session(&mock, RetryPolicy::default());

        let err = session
            .dispatch::<TestError>(HttpRequest::delete(session.url("items/1")), &StatusTextInterpreter)
            .unwrap_err();

        assert_eq!(err, TestError::Status(418, "418 I'm a teapot: teapot".to_string()));
    }

    #[test]
    fn test_url_with_segments_encodes() {
        let mock = MockTransport::new();
        let session = session(&mock, RetryPolicy::default());

        let url = session
            .url_with_segments("v2/url", &["https://evil.example.com/a b"])
            .unwrap();

        assert_eq!(
            url,
            "https://vendor.example.com/v2/url/https:%2F%2Fevil.example.com%2Fa%20b"
        );
    }

    #[test]
    fn test_message_at_picks_first_present() {
        let body = json!({"error": [{"message": "bad filter"}]});
        assert_eq!(
            message_at(&body, &["/detail", "/error/0/message"]),
            Some("bad filter".to_string())
        );
        assert_eq!(message_at(&body, &["/detail"]), None);
    }
}
