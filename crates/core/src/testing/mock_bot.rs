//! Mock Telegram bot for testing conversational flows.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::channel::{ChannelError, TelegramBot};

/// A message the bot was asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentText {
    pub chat_id: String,
    pub text: String,
}

/// An answered button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackAnswer {
    pub callback_query_id: String,
    pub text: String,
}

/// Records every reply instead of calling Telegram.
///
/// Reports the username `FleetilloBot` unless built with
/// [`MockTelegramBot::unconfigured`].
#[derive(Debug)]
pub struct MockTelegramBot {
    username: Option<String>,
    fail_sends: AtomicBool,
    texts: RwLock<Vec<SentText>>,
    answers: RwLock<Vec<CallbackAnswer>>,
}

impl Default for MockTelegramBot {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTelegramBot {
    pub fn new() -> Self {
        Self {
            username: Some("FleetilloBot".to_string()),
            fail_sends: AtomicBool::new(false),
            texts: RwLock::new(Vec::new()),
            answers: RwLock::new(Vec::new()),
        }
    }

    /// A bot with no known username, as when no token is configured.
    pub fn unconfigured() -> Self {
        Self {
            username: None,
            ..Self::new()
        }
    }

    /// Make every send and callback answer fail.
    pub fn set_failing(&self, failing: bool) {
        self.fail_sends.store(failing, Ordering::SeqCst);
    }

    pub async fn sent_texts(&self) -> Vec<SentText> {
        self.texts.read().await.clone()
    }

    pub async fn callback_answers(&self) -> Vec<CallbackAnswer> {
        self.answers.read().await.clone()
    }

    fn check(&self) -> Result<(), ChannelError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ChannelError::Transport("Connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TelegramBot for MockTelegramBot {
    async fn bot_username(&self) -> Option<String> {
        self.username.clone()
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        self.texts.write().await.push(SentText {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
        });
        self.check()
    }

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: &str,
    ) -> Result<(), ChannelError> {
        self.answers.write().await.push(CallbackAnswer {
            callback_query_id: callback_query_id.to_string(),
            text: text.to_string(),
        });
        self.check()
    }
}
