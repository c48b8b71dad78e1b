//! Channel adapter contract.

use async_trait::async_trait;
use thiserror::Error;

use super::{ChannelResult, ChannelType, DispatchContext, HealthStatus};
use crate::entities::Driver;

/// An adapter failing outright instead of reporting a failed result.
///
/// The `Display` text is stored verbatim as the channel's error message, so
/// variants render their payload without any prefix.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The provider could not be reached.
    #[error("{0}")]
    Transport(String),

    /// The provider answered with something we could not interpret.
    #[error("{0}")]
    Provider(String),
}

/// The request URL is stripped first: Telegram embeds the bot token in it
/// and this text ends up in stored rows and health output.
impl From<reqwest::Error> for ChannelError {
    fn from(e: reqwest::Error) -> Self {
        ChannelError::Transport(e.without_url().to_string())
    }
}

/// One implementation per channel type.
#[async_trait]
pub trait ChannelAdapter: Send + Sync + 'static {
    fn channel_type(&self) -> ChannelType;

    /// Whether the driver has the contact details this channel needs.
    /// Pure check, no I/O.
    fn can_send(&self, driver: &Driver) -> bool;

    /// Deliver the dispatch. May take arbitrarily long.
    async fn send(&self, context: &DispatchContext) -> Result<ChannelResult, ChannelError>;

    /// Readiness check, never called on the dispatch path.
    async fn health_check(&self) -> HealthStatus;
}

/// Conversational side of the Telegram bot: replies to drivers and answers
/// inline button presses.
#[async_trait]
pub trait TelegramBot: Send + Sync + 'static {
    /// Username for `t.me` links, or `None` when the bot is not configured
    /// or cannot be reached.
    async fn bot_username(&self) -> Option<String>;

    /// Send a Markdown message to a chat.
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), ChannelError>;

    /// Stop the loading indicator on a pressed button and show `text`.
    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: &str,
    ) -> Result<(), ChannelError>;
}
