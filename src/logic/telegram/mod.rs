//! Telegram Bot API
//!
//! Every method lives under `https://api.telegram.org/bot<token>/<method>`.
//! Failures carry `{"ok": false, "error_code": N, "description": "..."}`.

pub mod client;
pub mod types;

use thiserror::Error;

use crate::http::{message_at, ApiError, HttpResponse, ResponseInterpreter, TransportError};
use crate::logic::ModelError;
use crate::platform::ParamError;

pub use client::TelegramClient;
pub use types::{Chat, ChatPermissions, Message, TelegramUser, Update};

pub const INTEGRATION_NAME: &str = "Telegram";
pub const API_ROOT: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum TelegramError {
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

impl ApiError for TelegramError {
    fn rate_limited(message: String) -> Self {
        TelegramError::RateLimit(message)
    }

    fn http_status(status: u16, message: String) -> Self {
        if status >= 500 {
            TelegramError::InternalServer(message)
        } else {
            TelegramError::Api(message)
        }
    }
}

// ============================================================================
// ENDPOINTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    GetMe,
    SendMessage,
    SendDocument,
    SendPhoto,
    SendLocation,
    SendPoll,
    GetChat,
    SetChatPermissions,
    GetUpdates,
}

impl Endpoint {
    /// Bot API method name
    pub fn method(&self) -> &'static str {
        match self {
            Endpoint::GetMe => "getMe",
            Endpoint::SendMessage => "sendMessage",
            Endpoint::SendDocument => "sendDocument",
            Endpoint::SendPhoto => "sendPhoto",
            Endpoint::SendLocation => "sendLocation",
            Endpoint::SendPoll => "sendPoll",
            Endpoint::GetChat => "getChat",
            Endpoint::SetChatPermissions => "setChatPermissions",
            Endpoint::GetUpdates => "getUpdates",
        }
    }

    pub fn interpreter(&self) -> &'static dyn ResponseInterpreter<TelegramError> {
        match self {
            Endpoint::SendMessage
            | Endpoint::SendDocument
            | Endpoint::SendPhoto
            | Endpoint::SendLocation
            | Endpoint::SendPoll
            | Endpoint::GetChat
            | Endpoint::SetChatPermissions => &ChatInterpreter,
            Endpoint::GetMe | Endpoint::GetUpdates => &DescriptionInterpreter,
        }
    }
}

// ============================================================================
// INTERPRETERS
// ============================================================================

fn description(response: &HttpResponse) -> Option<String> {
    response
        .try_json()
        .and_then(|body| message_at(&body, &["/description"]))
}

/// Surfaces the `description` field
pub struct DescriptionInterpreter;

impl ResponseInterpreter<TelegramError> for DescriptionInterpreter {
    fn interpret(&self, response: &HttpResponse) -> TelegramError {
        let Some(message) = description(response) else {
            return TelegramError::http_status(response.status, crate::http::status_text(response));
        };

        match response.status {
            400 | 409 => TelegramError::BadRequest(message),
            404 => TelegramError::NotFound(message),
            status if status >= 500 => TelegramError::InternalServer(message),
            _ => TelegramError::Api(message),
        }
    }
}

/// Chat-scoped methods: "chat not found" is a missing resource, not a bad request
pub struct ChatInterpreter;

impl ResponseInterpreter<TelegramError> for ChatInterpreter {
    fn interpret(&self, response: &HttpResponse) -> TelegramError {
        match DescriptionInterpreter.interpret(response) {
            TelegramError::BadRequest(message) if message.to_lowercase().contains("chat not found") => {
                TelegramError::NotFound(message)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_not_found_is_not_found() {
        let response = HttpResponse::json_body(
            400,
            &json!({"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}),
        );
        let err = Endpoint::SendMessage.interpreter().interpret(&response);
        assert!(matches!(err, TelegramError::NotFound(ref m) if m == "Bad Request: chat not found"));

        let err = Endpoint::GetUpdates.interpreter().interpret(&response);
        assert!(matches!(err, TelegramError::BadRequest(_)));
    }

    #[test]
    fn test_unparseable_body_falls_back_to_status() {
        let response = HttpResponse::new(502, "<html>bad gateway</html>");
        let err = Endpoint::GetMe.interpreter().interpret(&response);
        assert!(matches!(err, TelegramError::InternalServer(ref m) if m.starts_with("502 Bad Gateway")));
    }
}
