//! The subset of Telegram's `Update` object the bot reacts to.
//!
//! Unknown fields are ignored so newer Bot API payloads keep parsing.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    /// `private`, `group`, `supergroup` or `channel`.
    #[serde(rename = "type")]
    pub kind: String,
}

impl Chat {
    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// A press on an inline keyboard button.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_start_message_and_ignores_extra_fields() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "date": 1700000000,
                "from": {"id": 42, "is_bot": false, "first_name": "John", "language_code": "en"},
                "chat": {"id": 42, "type": "private", "first_name": "John"},
                "text": "/start 9a8b7c6d-5e4f-4a3b-9c1d-0e1f2a3b4c5d"
            }
        }))
        .unwrap();

        let message = update.message.unwrap();
        assert!(message.chat.is_private());
        assert_eq!(message.from.unwrap().first_name, "John");
        assert!(update.callback_query.is_none());
    }

    #[test]
    fn test_parses_callback_query() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 11,
            "callback_query": {
                "id": "cb-1",
                "from": {"id": 42, "is_bot": false, "first_name": "John", "username": "jdoe"},
                "message": {"message_id": 7, "chat": {"id": 42, "type": "private"}},
                "chat_instance": "x",
                "data": "ack:dispatch-1"
            }
        }))
        .unwrap();

        let query = update.callback_query.unwrap();
        assert_eq!(query.data.as_deref(), Some("ack:dispatch-1"));
        assert_eq!(query.message.unwrap().chat.id, 42);
    }
}
