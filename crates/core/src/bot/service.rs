//! Reacting to bot updates and issuing registration links.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use qrcode::render::svg;
use qrcode::QrCode;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::messages;
use super::update::{CallbackQuery, Message, Update};
use crate::channel::{ChannelType, TelegramBot};
use crate::dispatch::{DispatchStore, DispatchStoreError};
use crate::entities::{EntityError, EntityStore};
use crate::metrics;

const ACK_PREFIX: &str = "ack:";

/// What the bot did with one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// `/start` with no driver id; instructions were sent.
    StartHelp,
    InvalidRegistrationLink,
    DriverNotFound { driver_id: String },
    AlreadyRegistered { driver_id: String },
    Registered { driver_id: String, chat_id: String },
    RegistrationFailed { driver_id: String },
    Acknowledged { dispatch_id: String },
    /// The button was pressed but no delivered Telegram attempt matched.
    NotAcknowledged { dispatch_id: String },
    /// Not something the bot responds to.
    Ignored,
}

impl UpdateOutcome {
    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateOutcome::StartHelp => "start_help",
            UpdateOutcome::InvalidRegistrationLink => "invalid_link",
            UpdateOutcome::DriverNotFound { .. } => "driver_not_found",
            UpdateOutcome::AlreadyRegistered { .. } => "already_registered",
            UpdateOutcome::Registered { .. } => "registered",
            UpdateOutcome::RegistrationFailed { .. } => "registration_failed",
            UpdateOutcome::Acknowledged { .. } => "acknowledged",
            UpdateOutcome::NotAcknowledged { .. } => "not_acknowledged",
            UpdateOutcome::Ignored => "ignored",
        }
    }
}

/// Deep link a driver opens to register their chat with the bot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationLink {
    pub driver_id: String,
    pub driver_name: String,
    pub registration_link: String,
    /// The link as an SVG QR code data URI.
    pub qr_code_url: String,
    pub already_registered: bool,
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Invalid driver ID format")]
    InvalidDriverId,

    #[error("Driver not found")]
    DriverNotFound,

    #[error("Telegram bot is not configured")]
    NotConfigured,

    #[error("Failed to generate QR code: {0}")]
    QrCode(String),

    #[error(transparent)]
    Entity(#[from] EntityError),
}

/// Handles driver conversations with the dispatch bot.
pub struct BotService {
    bot: Arc<dyn TelegramBot>,
    entities: Arc<dyn EntityStore>,
    dispatches: Arc<dyn DispatchStore>,
}

/// Hyphenated UUID of any version, as registration links carry.
fn is_driver_id(value: &str) -> bool {
    value.len() == 36 && uuid::Uuid::parse_str(value).is_ok()
}

fn qr_data_uri(link: &str) -> Result<String, RegistrationError> {
    let code = QrCode::new(link.as_bytes()).map_err(|e| RegistrationError::QrCode(e.to_string()))?;
    let image = code
        .render::<svg::Color>()
        .min_dimensions(300, 300)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();
    Ok(format!("data:image/svg+xml;base64,{}", STANDARD.encode(image)))
}

impl BotService {
    pub fn new(
        bot: Arc<dyn TelegramBot>,
        entities: Arc<dyn EntityStore>,
        dispatches: Arc<dyn DispatchStore>,
    ) -> Self {
        Self {
            bot,
            entities,
            dispatches,
        }
    }

    /// React to one webhook update. Never fails: problems are logged and,
    /// where a driver is waiting, answered in the chat.
    pub async fn handle_update(&self, update: &Update) -> UpdateOutcome {
        let outcome = self.dispatch_update(update).await;
        metrics::BOT_UPDATES
            .with_label_values(&[outcome.as_str()])
            .inc();
        outcome
    }

    async fn dispatch_update(&self, update: &Update) -> UpdateOutcome {
        if let Some(ref query) = update.callback_query {
            return self.handle_callback(query).await;
        }

        match update.message {
            Some(ref message) if message.chat.is_private() => match message.text.as_deref() {
                Some(text) => self.handle_text(message, text).await,
                None => UpdateOutcome::Ignored,
            },
            _ => {
                debug!(update_id = update.update_id, "Ignoring non-private or empty update");
                UpdateOutcome::Ignored
            }
        }
    }

    async fn handle_text(&self, message: &Message, text: &str) -> UpdateOutcome {
        let mut parts = text.split_whitespace();
        let command = parts.next().unwrap_or_default();
        if command != "/start" && !command.starts_with("/start@") {
            return UpdateOutcome::Ignored;
        }

        let chat_id = message.chat.id.to_string();
        let username = message.from.as_ref().and_then(|u| u.username.as_deref());

        let Some(driver_id) = parts.next() else {
            self.reply(&chat_id, messages::START_HELP).await;
            return UpdateOutcome::StartHelp;
        };

        if !is_driver_id(driver_id) {
            warn!(chat_id = %chat_id, "Registration attempted with malformed driver id");
            self.reply(&chat_id, messages::INVALID_LINK).await;
            return UpdateOutcome::InvalidRegistrationLink;
        }

        let driver = match self.entities.get_driver(driver_id) {
            Ok(Some(driver)) => driver,
            Ok(None) => {
                warn!(chat_id = %chat_id, driver_id, "Registration for unknown driver");
                self.reply(&chat_id, messages::DRIVER_NOT_FOUND).await;
                return UpdateOutcome::DriverNotFound {
                    driver_id: driver_id.to_string(),
                };
            }
            Err(e) => {
                error!(chat_id = %chat_id, driver_id, "Driver lookup failed during registration: {}", e);
                self.reply(&chat_id, messages::REGISTRATION_FAILED).await;
                return UpdateOutcome::RegistrationFailed {
                    driver_id: driver_id.to_string(),
                };
            }
        };

        if driver.telegram_chat() == Some(chat_id.as_str()) {
            self.reply(&chat_id, &messages::already_registered(&driver.first_name))
                .await;
            return UpdateOutcome::AlreadyRegistered {
                driver_id: driver.id,
            };
        }

        match self.entities.link_telegram_chat(&driver.id, &chat_id) {
            Ok(true) => {
                info!(
                    driver_id = %driver.id,
                    chat_id = %chat_id,
                    telegram_username = ?username,
                    driver_name = %driver.full_name(),
                    "Driver Telegram registration successful"
                );
                self.reply(&chat_id, &messages::welcome(&driver.first_name))
                    .await;
                UpdateOutcome::Registered {
                    driver_id: driver.id,
                    chat_id,
                }
            }
            Ok(false) => {
                warn!(driver_id = %driver.id, chat_id = %chat_id, "Driver disappeared before linking");
                self.reply(&chat_id, messages::REGISTRATION_FAILED).await;
                UpdateOutcome::RegistrationFailed {
                    driver_id: driver.id,
                }
            }
            Err(e) => {
                error!(driver_id = %driver.id, chat_id = %chat_id, "Failed to link Telegram chat: {}", e);
                self.reply(&chat_id, messages::REGISTRATION_FAILED).await;
                UpdateOutcome::RegistrationFailed {
                    driver_id: driver.id,
                }
            }
        }
    }

    async fn handle_callback(&self, query: &CallbackQuery) -> UpdateOutcome {
        let Some(dispatch_id) = query
            .data
            .as_deref()
            .and_then(|data| data.strip_prefix(ACK_PREFIX))
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            debug!(callback_id = %query.id, data = ?query.data, "Ignoring unknown callback");
            return UpdateOutcome::Ignored;
        };

        let chat_id = query.message.as_ref().map(|m| m.chat.id);
        let outcome = match self
            .dispatches
            .acknowledge_channel(dispatch_id, ChannelType::Telegram)
        {
            Ok(Some(_)) => {
                info!(
                    dispatch_id,
                    chat_id = ?chat_id,
                    username = ?query.from.username,
                    "Dispatch acknowledged via Telegram"
                );
                UpdateOutcome::Acknowledged {
                    dispatch_id: dispatch_id.to_string(),
                }
            }
            Ok(None) | Err(DispatchStoreError::DispatchNotFound(_)) => {
                warn!(dispatch_id, chat_id = ?chat_id, "Acknowledgement without a delivered Telegram attempt");
                UpdateOutcome::NotAcknowledged {
                    dispatch_id: dispatch_id.to_string(),
                }
            }
            Err(e) => {
                error!(dispatch_id, "Failed to record acknowledgement: {}", e);
                UpdateOutcome::NotAcknowledged {
                    dispatch_id: dispatch_id.to_string(),
                }
            }
        };

        let text = match outcome {
            UpdateOutcome::Acknowledged { .. } => messages::ACKNOWLEDGED,
            _ => messages::NOT_ACKNOWLEDGED,
        };
        if let Err(e) = self.bot.answer_callback_query(&query.id, text).await {
            warn!(callback_id = %query.id, "Failed to answer callback query: {}", e);
        }
        outcome
    }

    async fn reply(&self, chat_id: &str, text: &str) {
        if let Err(e) = self.bot.send_text(chat_id, text).await {
            warn!(chat_id, "Failed to send bot reply: {}", e);
        }
    }

    /// Registration link and QR code for a driver.
    pub async fn registration_link(
        &self,
        driver_id: &str,
    ) -> Result<RegistrationLink, RegistrationError> {
        if !is_driver_id(driver_id) {
            return Err(RegistrationError::InvalidDriverId);
        }

        let driver = self
            .entities
            .get_driver(driver_id)?
            .ok_or(RegistrationError::DriverNotFound)?;

        let username = self
            .bot
            .bot_username()
            .await
            .ok_or(RegistrationError::NotConfigured)?;

        let registration_link = format!("https://t.me/{}?start={}", username, driver.id);
        let qr_code_url = qr_data_uri(&registration_link)?;

        let link = RegistrationLink {
            driver_name: driver.full_name(),
            already_registered: driver.telegram_chat().is_some(),
            driver_id: driver.id,
            registration_link,
            qr_code_url,
        };
        info!(
            driver_id = %link.driver_id,
            driver_name = %link.driver_name,
            already_registered = link.already_registered,
            "Generated Telegram registration link"
        );
        Ok(link)
    }
}
