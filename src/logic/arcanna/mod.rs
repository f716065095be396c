//! Arcanna.ai REST API
//!
//! API key in the `x-arcanna-api-key` header. Events are ingested into a job
//! and inferred asynchronously; the decision is polled for by event ID.

pub mod client;
pub mod types;

use thiserror::Error;

use crate::http::{
    message_at, status_text, ApiError, HttpResponse, ResponseInterpreter, StatusTextInterpreter,
    TransportError,
};
use crate::logic::ModelError;
use crate::platform::ParamError;

pub use client::ArcannaClient;
pub use types::{Decision, EventReceipt, Job};

pub const INTEGRATION_NAME: &str = "Arcanna.ai";

#[derive(Debug, Error)]
pub enum ArcannaError {
    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    RateLimit(String),

    #[error("{0}")]
    InternalServer(String),

    #[error("{0}")]
    Api(String),

    #[error("{0}")]
    Validation(String),
}

impl ApiError for ArcannaError {
    fn rate_limited(message: String) -> Self {
        ArcannaError::RateLimit(message)
    }

    fn http_status(status: u16, message: String) -> Self {
        match status {
            404 => ArcannaError::NotFound(message),
            400 | 422 => ArcannaError::BadRequest(message),
            500..=599 => ArcannaError::InternalServer(message),
            _ => ArcannaError::Api(message),
        }
    }
}

// ============================================================================
// ENDPOINTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Health,
    Jobs,
    JobByName,
    IngestEvent,
    EventStatus,
    Feedback,
    Train,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Health => "/api/v1/health",
            Endpoint::Jobs => "/api/v1/jobs",
            Endpoint::JobByName => "/api/v1/jobs/get_by_name",
            Endpoint::IngestEvent => "/api/v1/events/",
            Endpoint::EventStatus => "/api/v1/events/{job}/{event}",
            Endpoint::Feedback => "/api/v1/events/{job}/{event}/feedback",
            Endpoint::Train => "/api/v1/jobs/{job}/train",
        }
    }

    pub fn interpreter(&self) -> &'static dyn ResponseInterpreter<ArcannaError> {
        match self {
            Endpoint::Health => &StatusTextInterpreter,
            Endpoint::Jobs | Endpoint::JobByName | Endpoint::Train => &JOB_INTERPRETER,
            Endpoint::IngestEvent | Endpoint::EventStatus | Endpoint::Feedback => {
                &EVENT_INTERPRETER
            }
        }
    }
}

// ============================================================================
// INTERPRETERS
// ============================================================================

const MESSAGE_POINTERS: &[&str] = &["/error", "/error_message", "/detail", "/message"];

/// Arcanna answers an unknown job or event with a 404 or with a 400 whose
/// message says so; both become [`ArcannaError::NotFound`] naming the subject
pub struct SubjectInterpreter {
    subject: &'static str,
}

static JOB_INTERPRETER: SubjectInterpreter = SubjectInterpreter { subject: "Job" };
static EVENT_INTERPRETER: SubjectInterpreter = SubjectInterpreter { subject: "Event" };

impl ResponseInterpreter<ArcannaError> for SubjectInterpreter {
    fn interpret(&self, response: &HttpResponse) -> ArcannaError {
        let message = response
            .try_json()
            .and_then(|body| message_at(&body, MESSAGE_POINTERS))
            .unwrap_or_else(|| status_text(response));

        let says_missing = message.to_lowercase().contains("not found")
            || message.to_lowercase().contains("does not exist");
        if response.status == 404 || (response.status == 400 && says_missing) {
            return ArcannaError::NotFound(format!("{} not found: {}", self.subject, message));
        }
        ArcannaError::http_status(response.status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_job_reported_as_bad_request() {
        let response = HttpResponse::json_body(400, &json!({"error": "Job id 9 does not exist"}));
        let err = Endpoint::Train.interpreter().interpret(&response);
        assert!(matches!(err, ArcannaError::NotFound(ref m) if m == "Job not found: Job id 9 does not exist"));
    }

    #[test]
    fn test_event_bad_request() {
        let response = HttpResponse::json_body(400, &json!({"detail": "raw_body must be an object"}));
        let err = Endpoint::IngestEvent.interpreter().interpret(&response);
        assert!(matches!(err, ArcannaError::BadRequest(ref m) if m == "raw_body must be an object"));
    }

    #[test]
    fn test_health_uses_status_text() {
        let response = HttpResponse::new(503, "");
        let err = Endpoint::Health.interpreter().interpret(&response);
        assert_eq!(err.to_string(), "503 Service Unavailable");
    }
}
