//! Telegram Bot API client

use std::time::Duration;

use serde_json::{json, Value};

use super::types::{Chat, ChatPermissions, TelegramUser, Update};
use super::{Endpoint, TelegramError, API_ROOT};
use crate::http::{HttpRequest, RestSession, SessionSettings, TransportFactory};
use crate::logic::{parse_list, RawModel};

/// Most updates a single getUpdates call returns
pub const MAX_UPDATES_LIMIT: usize = 100;

/// Bot API calls answer quickly; media is passed by URL
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TelegramClient {
    session: RestSession,
}

impl TelegramClient {
    pub fn new(
        bot_token: &str,
        verify_ssl: bool,
        transports: &dyn TransportFactory,
    ) -> Result<Self, TelegramError> {
        let transport = transports.open(&SessionSettings::new(verify_ssl).with_timeout(REQUEST_TIMEOUT))?;
        let base_url = format!("{}/bot{}", API_ROOT, bot_token.trim());
        Ok(Self { session: RestSession::new(&base_url, transport) })
    }

    fn request(&self, endpoint: Endpoint, request: HttpRequest) -> Result<Value, TelegramError> {
        let body = self.session.dispatch_json(request, endpoint.interpreter())?;

        // The Bot API may report a failure inside a 200 response
        if body.get("ok").and_then(Value::as_bool) == Some(false) {
            let message = body
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("Telegram reported a failure without a description");
            return Err(TelegramError::Api(message.to_string()));
        }

        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    /// An `ok` envelope means the message went out; its `result` is passed on as-is
    fn sent(&self, endpoint: Endpoint, request: HttpRequest) -> Result<Value, TelegramError> {
        let result = self.request(endpoint, request)?;
        match result.get("message_id").and_then(Value::as_i64) {
            Some(id) => log::info!("Telegram accepted message {}", id),
            None => log::warn!("Telegram {} result has no message ID", endpoint.method()),
        }
        Ok(result)
    }

    fn get(&self, endpoint: Endpoint) -> HttpRequest {
        HttpRequest::get(self.session.url(endpoint.method()))
    }

    pub fn test_connectivity(&self) -> Result<TelegramUser, TelegramError> {
        let result = self.request(Endpoint::GetMe, self.get(Endpoint::GetMe))?;
        Ok(TelegramUser::from_raw(result)?)
    }

    pub fn send_message(&self, chat_id: &str, text: &str) -> Result<Value, TelegramError> {
        let request = self
            .get(Endpoint::SendMessage)
            .query("chat_id", chat_id)
            .query("text", text);
        self.sent(Endpoint::SendMessage, request)
    }

    /// Send a document by URL
    pub fn send_document(&self, chat_id: &str, document_url: &str) -> Result<Value, TelegramError> {
        let request = self
            .get(Endpoint::SendDocument)
            .query("chat_id", chat_id)
            .query("document", document_url);
        self.sent(Endpoint::SendDocument, request)
    }

    /// Send a photo by URL
    pub fn send_photo(&self, chat_id: &str, photo_url: &str) -> Result<Value, TelegramError> {
        let request = self
            .get(Endpoint::SendPhoto)
            .query("chat_id", chat_id)
            .query("photo", photo_url);
        self.sent(Endpoint::SendPhoto, request)
    }

    pub fn send_location(
        &self,
        chat_id: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<Value, TelegramError> {
        let request = self
            .get(Endpoint::SendLocation)
            .query("chat_id", chat_id)
            .query("latitude", latitude)
            .query("longitude", longitude);
        self.sent(Endpoint::SendLocation, request)
    }

    pub fn send_poll(
        &self,
        chat_id: &str,
        question: &str,
        options: &[String],
        is_anonymous: bool,
        allows_multiple_answers: bool,
    ) -> Result<Value, TelegramError> {
        let request = self
            .get(Endpoint::SendPoll)
            .query("chat_id", chat_id)
            .query("question", question)
            .query("options", json!(options))
            .query("is_anonymous", is_anonymous)
            .query("allows_multiple_answers", allows_multiple_answers);
        self.sent(Endpoint::SendPoll, request)
    }

    pub fn get_chat(&self, chat_id: &str) -> Result<Chat, TelegramError> {
        let request = self.get(Endpoint::GetChat).query("chat_id", chat_id);
        Ok(Chat::from_raw(self.request(Endpoint::GetChat, request)?)?)
    }

    /// Returns whether Telegram accepted the permissions
    pub fn set_chat_permissions(
        &self,
        chat_id: &str,
        permissions: &ChatPermissions,
    ) -> Result<bool, TelegramError> {
        let request = HttpRequest::post(self.session.url(Endpoint::SetChatPermissions.method()))
            .json(json!({ "chat_id": chat_id, "permissions": permissions }));
        let result = self.request(Endpoint::SetChatPermissions, request)?;
        Ok(result.as_bool().unwrap_or(false))
    }

    /// Updates starting at `offset` (the next update id to read)
    pub fn get_updates(
        &self,
        offset: Option<i64>,
        limit: usize,
        allowed_updates: &[String],
    ) -> Result<Vec<Update>, TelegramError> {
        let mut request = self
            .get(Endpoint::GetUpdates)
            .query_opt("offset", offset)
            .query("limit", limit.clamp(1, MAX_UPDATES_LIMIT));
        if !allowed_updates.is_empty() {
            request = request.query("allowed_updates", json!(allowed_updates));
        }

        let result = self.request(Endpoint::GetUpdates, request)?;
        let items = result.as_array().cloned().unwrap_or_default();
        Ok(parse_list(items)?)
    }
}
