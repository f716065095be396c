//! Vectra QUX (on-prem brain) REST API v2.5
//!
//! Token authentication, page/page_size pagination with a `next` link.
//! Errors come back as `{"detail": "..."}`, `{"errors": [{"title": "..."}]}`
//! or `{"_meta": {"message": "..."}}` depending on the endpoint.

pub mod client;
pub mod types;

use thiserror::Error;

use crate::http::{
    message_at, status_text, ApiError, HttpResponse, ResponseInterpreter, StatusTextInterpreter,
    TransportError,
};
use crate::logic::ModelError;
use crate::platform::ParamError;

pub use client::{AssignmentQuery, EntityQuery, VectraQuxClient};
pub use types::{Assignment, Detection, Entity, EntityType, Note, Outcome};

pub const INTEGRATION_NAME: &str = "Vectra QUX";
pub const VENDOR_NAME: &str = "Vectra";
pub const PRODUCT_NAME: &str = "Vectra QUX";

#[derive(Debug, Error)]
pub enum VectraQuxError {
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

impl ApiError for VectraQuxError {
    fn rate_limited(message: String) -> Self {
        VectraQuxError::RateLimit(message)
    }

    fn http_status(status: u16, message: String) -> Self {
        match status {
            404 => VectraQuxError::NotFound(message),
            400 | 409 | 422 => VectraQuxError::BadRequest(message),
            500..=599 => VectraQuxError::InternalServer(message),
            _ => VectraQuxError::Api(message),
        }
    }
}

// ============================================================================
// ENDPOINTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Ping,
    ListEntities,
    DescribeEntity,
    ListDetections,
    DescribeDetection,
    MarkDetectionsFixed,
    DownloadPcap,
    Tagging,
    AddNote,
    ListAssignments,
    CreateAssignment,
    UpdateAssignment,
    ResolveAssignment,
    ListOutcomes,
}

impl Endpoint {
    pub fn interpreter(&self) -> &'static dyn ResponseInterpreter<VectraQuxError> {
        match self {
            Endpoint::Ping => &StatusTextInterpreter,
            Endpoint::ListEntities
            | Endpoint::DescribeEntity
            | Endpoint::ListDetections
            | Endpoint::DescribeDetection
            | Endpoint::MarkDetectionsFixed
            | Endpoint::DownloadPcap
            | Endpoint::AddNote
            | Endpoint::ListOutcomes => &DetailInterpreter,
            Endpoint::Tagging => &TaggingInterpreter,
            Endpoint::ListAssignments
            | Endpoint::CreateAssignment
            | Endpoint::UpdateAssignment
            | Endpoint::ResolveAssignment => &AssignmentInterpreter,
        }
    }
}

// ============================================================================
// INTERPRETERS
// ============================================================================

const MESSAGE_POINTERS: &[&str] = &["/detail", "/errors/0/title", "/errors/0/detail", "/_meta/message"];

fn vendor_message(response: &HttpResponse) -> Option<String> {
    response.try_json().and_then(|body| message_at(&body, MESSAGE_POINTERS))
}

/// Vendor message if the body has one, classified by status
pub struct DetailInterpreter;

impl ResponseInterpreter<VectraQuxError> for DetailInterpreter {
    fn interpret(&self, response: &HttpResponse) -> VectraQuxError {
        let message = vendor_message(response).unwrap_or_else(|| status_text(response));
        VectraQuxError::http_status(response.status, message)
    }
}

/// The tagging endpoint answers 200 with `{"status": "failure", "message": ...}`
/// as often as it fails with a status code
pub struct TaggingInterpreter;

impl ResponseInterpreter<VectraQuxError> for TaggingInterpreter {
    fn interpret(&self, response: &HttpResponse) -> VectraQuxError {
        let message = response
            .try_json()
            .and_then(|body| message_at(&body, &["/message", "/detail"]))
            .unwrap_or_else(|| status_text(response));
        VectraQuxError::http_status(response.status, message)
    }
}

/// Assignment endpoints report an unknown assignment as `"Not found."`
/// regardless of the status code
pub struct AssignmentInterpreter;

impl ResponseInterpreter<VectraQuxError> for AssignmentInterpreter {
    fn interpret(&self, response: &HttpResponse) -> VectraQuxError {
        match vendor_message(response) {
            Some(message) if message.trim().eq_ignore_ascii_case("not found.") => {
                VectraQuxError::NotFound(message)
            }
            Some(message) => VectraQuxError::http_status(response.status, message),
            None => VectraQuxError::http_status(response.status, status_text(response)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assignment_not_found_detail() {
        let response = HttpResponse::json_body(400, &json!({"detail": "Not found."}));
        let err = Endpoint::ResolveAssignment.interpreter().interpret(&response);
        assert!(matches!(err, VectraQuxError::NotFound(ref m) if m == "Not found."));

        // The same body elsewhere is just a bad request
        let err = Endpoint::DescribeDetection.interpreter().interpret(&response);
        assert!(matches!(err, VectraQuxError::BadRequest(_)));
    }

    #[test]
    fn test_errors_array_title() {
        let response = HttpResponse::json_body(
            422,
            &json!({"errors": [{"title": "Invalid outcome id"}]}),
        );
        let err = Endpoint::ListEntities.interpreter().interpret(&response);
        assert!(matches!(err, VectraQuxError::BadRequest(ref m) if m == "Invalid outcome id"));
    }
}
