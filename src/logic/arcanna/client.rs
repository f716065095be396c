//! Arcanna.ai client

use std::time::Duration;

use serde_json::{json, Value};

use super::types::{Decision, EventReceipt, Job};
use super::{ArcannaError, Endpoint};
use crate::http::{HttpRequest, RestSession, RetryPolicy, SessionSettings, TransportFactory};
use crate::logic::{parse_list, RawModel};

/// Per-request timeout for Arcanna calls
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ArcannaClient {
    session: RestSession,
}

impl ArcannaClient {
    pub fn new(
        api_root: &str,
        api_key: &str,
        verify_ssl: bool,
        transports: &dyn TransportFactory,
    ) -> Result<Self, ArcannaError> {
        let transport = transports.open(&SessionSettings::new(verify_ssl).with_timeout(REQUEST_TIMEOUT))?;
        let session = RestSession::new(api_root, transport)
            .with_header("x-arcanna-api-key", api_key.trim())
            .with_header("Content-Type", "application/json")
            .with_retry(RetryPolicy::default());
        Ok(Self { session })
    }

    fn url(&self, endpoint: Endpoint, job_id: Option<i64>, event_id: Option<&str>) -> Result<String, ArcannaError> {
        let mut path = endpoint.path().to_string();
        if let Some(job_id) = job_id {
            path = path.replace("{job}", &job_id.to_string());
        }
        match event_id {
            // Event IDs are caller supplied, so they go through segment encoding
            Some(event_id) => {
                let (head, tail) = path.split_once("{event}").unwrap_or((path.as_str(), ""));
                let mut segments = vec![event_id];
                segments.extend(tail.split('/').filter(|segment| !segment.is_empty()));
                Ok(self.session.url_with_segments(head, &segments)?)
            }
            None => Ok(self.session.url(&path)),
        }
    }

    fn send(&self, endpoint: Endpoint, request: HttpRequest) -> Result<Value, ArcannaError> {
        self.session.dispatch_json(request, endpoint.interpreter())
    }

    pub fn test_connectivity(&self) -> Result<(), ArcannaError> {
        let body = self.send(Endpoint::Health, HttpRequest::get(self.url(Endpoint::Health, None, None)?))?;
        if body.get("connected").and_then(Value::as_bool) == Some(false) {
            return Err(ArcannaError::Api("Arcanna reported it is not connected".to_string()));
        }
        Ok(())
    }

    pub fn get_jobs(&self) -> Result<Vec<Job>, ArcannaError> {
        let body = self.send(Endpoint::Jobs, HttpRequest::get(self.url(Endpoint::Jobs, None, None)?))?;
        let items = match body {
            Value::Array(items) => items,
            other => other.get("jobs").and_then(Value::as_array).cloned().unwrap_or_default(),
        };
        Ok(parse_list(items)?)
    }

    pub fn get_job_by_name(&self, name: &str) -> Result<Job, ArcannaError> {
        let request = HttpRequest::post(self.url(Endpoint::JobByName, None, None)?)
            .json(json!({ "job_name": name }));
        Ok(Job::from_raw(self.send(Endpoint::JobByName, request)?)?)
    }

    /// Ingest one raw event; `custom_id` replaces the ID Arcanna would assign
    pub fn send_event(
        &self,
        job_id: i64,
        event: &Value,
        custom_id: Option<&str>,
    ) -> Result<EventReceipt, ArcannaError> {
        let mut body = json!({ "job_id": job_id, "raw_body": event });
        if let (Some(id), Some(map)) = (custom_id, body.as_object_mut()) {
            map.insert("id".into(), json!(id));
        }

        let request = HttpRequest::post(self.url(Endpoint::IngestEvent, None, None)?).json(body);
        let receipt = EventReceipt::from_raw(self.send(Endpoint::IngestEvent, request)?)?;
        if let Some(message) = receipt.error_message.as_deref().filter(|m| !m.is_empty()) {
            return Err(ArcannaError::Api(message.to_string()));
        }
        Ok(receipt)
    }

    pub fn get_decision(&self, job_id: i64, event_id: &str) -> Result<Decision, ArcannaError> {
        let request = HttpRequest::get(self.url(Endpoint::EventStatus, Some(job_id), Some(event_id))?);
        Ok(Decision::from_raw(self.send(Endpoint::EventStatus, request)?)?)
    }

    /// Poll until inference finishes or `retries` extra attempts were spent.
    /// Returns the last decision seen, which may still be pending.
    pub fn wait_for_decision(
        &self,
        job_id: i64,
        event_id: &str,
        retries: u32,
        interval: Duration,
    ) -> Result<Decision, ArcannaError> {
        let mut decision = self.get_decision(job_id, event_id)?;
        let mut attempts_left = retries;
        while decision.is_pending() && attempts_left > 0 {
            log::info!(
                "Decision for event {} is pending, checking again in {}s ({} retries left)",
                event_id,
                interval.as_secs(),
                attempts_left
            );
            self.session.pause(interval);
            attempts_left -= 1;
            decision = self.get_decision(job_id, event_id)?;
        }
        Ok(decision)
    }

    pub fn send_feedback(
        &self,
        job_id: i64,
        event_id: &str,
        username: &str,
        feedback: &str,
    ) -> Result<Value, ArcannaError> {
        let request = HttpRequest::put(self.url(Endpoint::Feedback, Some(job_id), Some(event_id))?)
            .json(json!({ "cortex_user": username, "feedback": feedback }));
        self.send(Endpoint::Feedback, request)
    }

    pub fn train_job(&self, job_id: i64, username: &str) -> Result<Value, ArcannaError> {
        let request = HttpRequest::post(self.url(Endpoint::Train, Some(job_id), None)?)
            .query("username", username);
        self.send(Endpoint::Train, request)
    }
}
