//! Recorded Future Intelligence: Connect API (enrichment, alerts, analyst
//! notes), the playbook alert API and the Sandbox API used for URL
//! detonation.

pub mod client;
pub mod sandbox;
pub mod types;

use thiserror::Error;

use crate::http::{
    message_at, status_text, ApiError, HttpResponse, ResponseInterpreter, StatusTextInterpreter,
    TransportError,
};
use crate::logic::ModelError;
use crate::platform::ParamError;

pub use client::RecordedFutureClient;
pub use sandbox::SandboxClient;
pub use types::{
    AlertUpdate, EntityKind, Enrichment, Evidence, PlaybookAlert, PlaybookAlertSummary,
    PlaybookAlertUpdate, RfAlert, SandboxOverview, SandboxSample,
};

pub const INTEGRATION_NAME: &str = "Recorded Future";
pub const VENDOR_NAME: &str = "Recorded Future";
pub const PRODUCT_NAME: &str = "Recorded Future";

#[derive(Debug, Error)]
pub enum RecordedFutureError {
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

impl ApiError for RecordedFutureError {
    fn rate_limited(message: String) -> Self {
        RecordedFutureError::RateLimit(message)
    }

    fn http_status(status: u16, message: String) -> Self {
        match status {
            404 => RecordedFutureError::NotFound(message),
            400 | 422 => RecordedFutureError::BadRequest(message),
            500..=599 => RecordedFutureError::InternalServer(message),
            _ => RecordedFutureError::Api(message),
        }
    }
}

// ============================================================================
// ENDPOINTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Ping,
    Enrich,
    AlertDetails,
    UpdateAlert,
    PlaybookAlertDetails,
    UpdatePlaybookAlert,
    SearchPlaybookAlerts,
    PublishNote,
    SandboxSubmit,
    SandboxSample,
    SandboxOverview,
}

impl Endpoint {
    pub fn interpreter(&self) -> &'static dyn ResponseInterpreter<RecordedFutureError> {
        match self {
            Endpoint::Ping => &StatusTextInterpreter,
            Endpoint::Enrich => &ENRICHMENT,
            Endpoint::AlertDetails | Endpoint::UpdateAlert | Endpoint::PublishNote => &CONNECT,
            Endpoint::PlaybookAlertDetails
            | Endpoint::UpdatePlaybookAlert
            | Endpoint::SearchPlaybookAlerts => &PLAYBOOK,
            Endpoint::SandboxSubmit | Endpoint::SandboxSample | Endpoint::SandboxOverview => {
                &SANDBOX
            }
        }
    }
}

// ============================================================================
// INTERPRETERS
// ============================================================================

/// Vendor message from the first matching pointer, classified by status
pub struct ErrorBodyInterpreter {
    pointers: &'static [&'static str],
}

static CONNECT: ErrorBodyInterpreter = ErrorBodyInterpreter {
    pointers: &["/error/message", "/message", "/error"],
};

static PLAYBOOK: ErrorBodyInterpreter = ErrorBodyInterpreter {
    pointers: &["/status/status_message", "/message", "/error/message"],
};

static SANDBOX: ErrorBodyInterpreter = ErrorBodyInterpreter {
    pointers: &["/message", "/error"],
};

impl ResponseInterpreter<RecordedFutureError> for ErrorBodyInterpreter {
    fn interpret(&self, response: &HttpResponse) -> RecordedFutureError {
        let message = response
            .try_json()
            .and_then(|body| message_at(&body, self.pointers))
            .unwrap_or_else(|| status_text(response));
        RecordedFutureError::http_status(response.status, message)
    }
}

/// A 404 from the lookup endpoints means the entity is unknown to Recorded
/// Future, which actions report per entity rather than as a failure
pub struct EnrichmentInterpreter;

static ENRICHMENT: EnrichmentInterpreter = EnrichmentInterpreter;

impl ResponseInterpreter<RecordedFutureError> for EnrichmentInterpreter {
    fn interpret(&self, response: &HttpResponse) -> RecordedFutureError {
        let message = response
            .try_json()
            .and_then(|body| message_at(&body, CONNECT.pointers))
            .unwrap_or_else(|| status_text(response));
        match response.status {
            404 => RecordedFutureError::NotFound(message),
            401 | 403 => RecordedFutureError::Api(format!("Unauthorized: {}", message)),
            status => RecordedFutureError::http_status(status, message),
        }
    }
}
