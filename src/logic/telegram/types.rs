//! Telegram Bot API objects

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::platform::{CsvRow, Tabular};

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub is_bot: bool,
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(TelegramUser, "user");

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default, deserialize_with = "crate::logic::null_default")]
    pub chat_type: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub invite_link: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(Chat, "chat");

impl Chat {
    /// Title for groups and channels, the user name for private chats
    pub fn display_name(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.username.clone())
            .or_else(|| self.first_name.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

impl Tabular for Chat {
    fn to_csv(&self) -> CsvRow {
        CsvRow::new()
            .col("ID", self.id)
            .col("Type", &self.chat_type)
            .opt("Title", self.title.as_deref())
            .opt("Username", self.username.as_deref())
            .opt("Description", self.description.as_deref())
            .opt("Invite Link", self.invite_link.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    /// Unix seconds
    #[serde(default, deserialize_with = "crate::logic::null_default")]
    pub date: i64,
    #[serde(default)]
    pub chat: Option<Chat>,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(Message, "message");

impl Message {
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.date, 0).single()
    }

    /// Text or the caption of a media message
    pub fn content(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }
}

impl Tabular for Message {
    fn to_csv(&self) -> CsvRow {
        CsvRow::new()
            .col("Message ID", self.message_id)
            .opt("Chat", self.chat.as_ref().map(Chat::display_name))
            .opt("From", self.from.as_ref().and_then(|user| user.username.clone()))
            .opt("Date", self.sent_at().map(|time| time.to_rfc3339()))
            .opt("Text", self.content())
    }
}

/// One incoming update; only message-like kinds are modelled
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub edited_message: Option<Message>,
    #[serde(default)]
    pub channel_post: Option<Message>,
    #[serde(default)]
    pub edited_channel_post: Option<Message>,
    #[serde(skip)]
    pub raw: Value,
}

crate::raw_model!(Update, "update");

impl Update {
    /// Name of the update kind as used by `allowed_updates`
    pub fn kind(&self) -> &str {
        self.raw
            .as_object()
            .and_then(|object| object.keys().find(|key| key.as_str() != "update_id"))
            .map(String::as_str)
            .unwrap_or("unknown")
    }

    pub fn any_message(&self) -> Option<&Message> {
        self.message
            .as_ref()
            .or(self.channel_post.as_ref())
            .or(self.edited_message.as_ref())
            .or(self.edited_channel_post.as_ref())
    }
}

impl Tabular for Update {
    fn to_csv(&self) -> CsvRow {
        let row = CsvRow::new().col("Update ID", self.update_id).col("Type", self.kind());
        match self.any_message() {
            Some(message) => row
                .col("Message ID", message.message_id)
                .opt("Chat", message.chat.as_ref().map(Chat::display_name))
                .opt("Date", message.sent_at().map(|time| time.to_rfc3339()))
                .opt("Text", message.content()),
            None => row,
        }
    }
}

/// Default member permissions of a group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChatPermissions {
    pub can_send_messages: bool,
    pub can_send_polls: bool,
    pub can_send_other_messages: bool,
    pub can_add_web_page_previews: bool,
    pub can_change_info: bool,
    pub can_invite_users: bool,
    pub can_pin_messages: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::RawModel;
    use serde_json::json;

    #[test]
    fn test_update_kind_and_message() {
        let update = Update::from_raw(json!({
            "update_id": 10,
            "channel_post": {
                "message_id": 5,
                "date": 1700000000,
                "chat": {"id": -100, "type": "channel", "title": "Alerts"},
                "text": "hello"
            }
        }))
        .unwrap();

        assert_eq!(update.kind(), "channel_post");
        let message = update.any_message().unwrap();
        assert_eq!(message.content(), Some("hello"));
        assert_eq!(message.chat.as_ref().map(Chat::display_name).as_deref(), Some("Alerts"));

        let row = update.to_csv();
        assert_eq!(row.get("Type"), Some("channel_post"));
        assert_eq!(row.get("Chat"), Some("Alerts"));
    }

    #[test]
    fn test_message_without_id_is_rejected() {
        assert!(Message::from_raw(json!({"date": 1})).is_err());
    }
}
