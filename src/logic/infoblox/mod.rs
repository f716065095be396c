//! Infoblox Threat Defense (BloxOne) API
//!
//! - `/api/atcfw/v1`: custom (named) lists and security policies
//! - `/api/ddi/v1/ipam`: IPAM host records
//! - `/api/dnsdata/v2`: DNS security events, read by the connector
//!
//! Error bodies look like `{"error": [{"message": "..."}]}`.

pub mod client;
pub mod types;

use thiserror::Error;

use crate::http::{
    message_at, status_text, ApiError, HttpResponse, ResponseInterpreter, StatusTextInterpreter,
    TransportError,
};
use crate::logic::ModelError;
use crate::platform::ParamError;

pub use client::{DnsEventQuery, InfobloxClient, ListQuery};
pub use types::{CustomList, DnsSecurityEvent, HostRecord, SecurityPolicy};

pub const INTEGRATION_NAME: &str = "Infoblox Threat Defense";
pub const PRODUCT_NAME: &str = "Threat Defense";
pub const VENDOR_NAME: &str = "Infoblox";

#[derive(Debug, Error)]
pub enum InfobloxError {
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

impl ApiError for InfobloxError {
    fn rate_limited(message: String) -> Self {
        InfobloxError::RateLimit(message)
    }

    fn http_status(status: u16, message: String) -> Self {
        match status {
            404 => InfobloxError::NotFound(message),
            400 | 409 | 422 => InfobloxError::BadRequest(message),
            500..=599 => InfobloxError::InternalServer(message),
            _ => InfobloxError::Api(message),
        }
    }
}

// ============================================================================
// ENDPOINTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Ping,
    ListCustomLists,
    GetCustomList,
    CreateCustomList,
    UpdateCustomListItems,
    RemoveCustomList,
    ListSecurityPolicies,
    HostLookup,
    DnsEvents,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Ping => "/api/authn/v1/account",
            Endpoint::ListCustomLists | Endpoint::CreateCustomList => "/api/atcfw/v1/named_lists",
            Endpoint::GetCustomList | Endpoint::RemoveCustomList => "/api/atcfw/v1/named_lists/{id}",
            Endpoint::UpdateCustomListItems => "/api/atcfw/v1/named_lists/{id}/items",
            Endpoint::ListSecurityPolicies => "/api/atcfw/v1/security_policies",
            Endpoint::HostLookup => "/api/ddi/v1/ipam/host",
            Endpoint::DnsEvents => "/api/dnsdata/v2/dns_event",
        }
    }

    pub fn interpreter(&self) -> &'static dyn ResponseInterpreter<InfobloxError> {
        match self {
            Endpoint::Ping => &StatusTextInterpreter,
            Endpoint::ListCustomLists
            | Endpoint::GetCustomList
            | Endpoint::CreateCustomList
            | Endpoint::UpdateCustomListItems
            | Endpoint::RemoveCustomList
            | Endpoint::ListSecurityPolicies => &ATCFW,
            Endpoint::HostLookup => &DDI,
            Endpoint::DnsEvents => &DNS_DATA,
        }
    }
}

// ============================================================================
// INTERPRETERS
// ============================================================================

/// Extracts the vendor message from the given JSON pointers, then classifies by status
pub struct ErrorBodyInterpreter {
    pointers: &'static [&'static str],
}

static ATCFW: ErrorBodyInterpreter = ErrorBodyInterpreter {
    pointers: &["/error/0/message", "/message"],
};

static DDI: ErrorBodyInterpreter = ErrorBodyInterpreter {
    pointers: &["/error/0/message", "/error/message"],
};

static DNS_DATA: ErrorBodyInterpreter = ErrorBodyInterpreter {
    pointers: &["/error/0/message", "/error/message", "/message"],
};

impl ResponseInterpreter<InfobloxError> for ErrorBodyInterpreter {
    fn interpret(&self, response: &HttpResponse) -> InfobloxError {
        let message = response
            .try_json()
            .and_then(|body| message_at(&body, self.pointers))
            .unwrap_or_else(|| status_text(response));
        InfobloxError::http_status(response.status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_list_message() {
        let response = HttpResponse::json_body(
            409,
            &json!({"error": [{"message": "named list already exists"}]}),
        );
        let err = Endpoint::CreateCustomList.interpreter().interpret(&response);
        assert!(matches!(err, InfobloxError::BadRequest(ref m) if m == "named list already exists"));
    }

    #[test]
    fn test_server_error_without_body() {
        let response = HttpResponse::new(503, "");
        let err = Endpoint::DnsEvents.interpreter().interpret(&response);
        assert!(matches!(err, InfobloxError::InternalServer(ref m) if m == "503 Service Unavailable"));
    }

    #[test]
    fn test_missing_list_is_not_found() {
        let response = HttpResponse::json_body(404, &json!({"error": [{"message": "not found"}]}));
        let err = Endpoint::GetCustomList.interpreter().interpret(&response);
        assert!(matches!(err, InfobloxError::NotFound(_)));
    }
}
