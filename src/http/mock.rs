//! Scripted transport for unit tests
//!
//! Routes match on method and URL path suffix. Responses queued on a route are
//! served in order; the last one keeps being served once the queue is drained.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use super::transport::{
    HttpRequest, HttpResponse, HttpTransport, Method, SessionSettings, TransportError,
    TransportFactory,
};

struct Route {
    method: Method,
    path: String,
    responses: VecDeque<HttpResponse>,
}

#[derive(Default)]
struct MockState {
    routes: Vec<Route>,
    requests: Vec<HttpRequest>,
    pauses: Vec<Duration>,
    sessions: Vec<SessionSettings>,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON response for `method` on URLs ending with `path`
    pub fn on(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.on_raw(method, path, HttpResponse::json_body(status, &body))
    }

    pub fn on_raw(&self, method: Method, path: &str, response: HttpResponse) -> &Self {
        let mut state = self.state.lock();
        if let Some(route) = state
            .routes
            .iter_mut()
            .find(|route| route.method == method && route.path == path)
        {
            route.responses.push_back(response);
        } else {
            state.routes.push(Route {
                method,
                path: path.to_string(),
                responses: VecDeque::from([response]),
            });
        }
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().requests.clone()
    }

    /// Requests whose URL ends with `path`
    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|request| request.url.ends_with(path))
            .cloned()
            .collect()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.state.lock().pauses.clone()
    }

    pub fn sessions(&self) -> Vec<SessionSettings> {
        self.state.lock().sessions.clone()
    }
}

impl HttpTransport for MockTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut state = self.state.lock();
        state.requests.push(request.clone());

        // Longest matching suffix wins so "/assignments/1/resolve" beats "/resolve"
        let route = state
            .routes
            .iter_mut()
            .filter(|route| route.method == request.method && request.url.ends_with(&route.path))
            .max_by_key(|route| route.path.len())
            .ok_or_else(|| {
                TransportError::Request(format!(
                    "no scripted response for {} {}",
                    request.method.as_str(),
                    request.url
                ))
            })?;

        let response = if route.responses.len() > 1 {
            route.responses.pop_front()
        } else {
            route.responses.front().cloned()
        };

        response.ok_or_else(|| TransportError::Request("empty route".to_string()))
    }

    fn pause(&self, duration: Duration) {
        self.state.lock().pauses.push(duration);
    }
}

impl TransportFactory for MockTransport {
    fn open(&self, settings: &SessionSettings) -> Result<Box<dyn HttpTransport>, TransportError> {
        self.state.lock().sessions.push(settings.clone());
        Ok(Box::new(self.clone()))
    }
}
