//! Telegram bot conversations: drivers linking their chat through a
//! registration link, and acknowledging dispatches from the inline button.

mod messages;
mod service;
mod update;

pub use service::{BotService, RegistrationError, RegistrationLink, UpdateOutcome};
pub use update::{CallbackQuery, Chat, Message, Update, User};
