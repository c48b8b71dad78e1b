//! Telegram Bot API adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::{
    ChannelAdapter, ChannelError, ChannelResult, ChannelType, DispatchContext, HealthStatus,
    TelegramBot,
};
use crate::config::TelegramConfig;
use crate::entities::Driver;

const NOT_CONFIGURED: &str = "Telegram bot token is not configured";
const NO_CHAT_ID: &str = "Driver does not have telegram_chat_id configured";

/// Delivers dispatches as Telegram messages with an acknowledge button, and
/// talks back to drivers on behalf of the bot.
pub struct TelegramAdapter {
    client: Client,
    api_base: String,
    bot_token: Option<String>,
    /// Configured username, or the one `getMe` reported.
    bot_username: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    first_name: String,
    username: Option<String>,
}

impl TelegramAdapter {
    /// Build the adapter. Without a config the adapter still registers but
    /// reports every send as failed and its health as not configured.
    pub fn new(config: Option<&TelegramConfig>) -> Result<Self, ChannelError> {
        let timeout_secs = config.map(|c| c.timeout_secs).unwrap_or(30);
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs as u64))
            .build()?;

        Ok(Self {
            client,
            api_base: config
                .map(|c| c.api_base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://api.telegram.org".to_string()),
            bot_token: config
                .map(|c| c.bot_token.trim().to_string())
                .filter(|t| !t.is_empty()),
            bot_username: RwLock::new(
                config
                    .and_then(|c| c.bot_username.as_deref())
                    .map(|u| u.trim().trim_start_matches('@').to_string())
                    .filter(|u| !u.is_empty()),
            ),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some()
    }

    fn method_url(&self, token: &str, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, token, method)
    }

    /// POST a Bot API method and unwrap its envelope.
    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T, ChannelError> {
        let token = self
            .bot_token
            .as_deref()
            .ok_or_else(|| ChannelError::Provider(NOT_CONFIGURED.to_string()))?;

        let response = self
            .client
            .post(self.method_url(token, method))
            .json(body)
            .send()
            .await?;

        let data: TelegramResponse<T> = response.json().await.map_err(|e| {
            ChannelError::Provider(format!(
                "Invalid Telegram API response: {}",
                e.without_url()
            ))
        })?;

        match (data.ok, data.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(ChannelError::Provider(
                data.description
                    .unwrap_or_else(|| "Unknown Telegram API error".to_string()),
            )),
        }
    }

    async fn get_me(&self, token: &str) -> Result<BotUser, String> {
        let response = self
            .client
            .get(self.method_url(token, "getMe"))
            .send()
            .await
            .map_err(|e| format!("Health check failed: {}", e.without_url()))?;

        match response.json::<TelegramResponse<BotUser>>().await {
            Ok(TelegramResponse {
                ok: true,
                result: Some(bot),
                ..
            }) => Ok(bot),
            Ok(data) => Err(data
                .description
                .unwrap_or_else(|| "Failed to verify bot connectivity".to_string())),
            Err(e) => Err(format!("Health check failed: {}", e.without_url())),
        }
    }
}

#[async_trait]
impl ChannelAdapter for TelegramAdapter {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Telegram
    }

    fn can_send(&self, driver: &Driver) -> bool {
        driver.telegram_chat().is_some()
    }

    async fn send(&self, context: &DispatchContext) -> Result<ChannelResult, ChannelError> {
        let Some(chat_id) = context.driver.telegram_chat() else {
            warn!(dispatch_id = %context.dispatch_id, driver_id = %context.driver.id, "{}", NO_CHAT_ID);
            return Ok(ChannelResult::failed(NO_CHAT_ID));
        };

        let Some(ref token) = self.bot_token else {
            error!(dispatch_id = %context.dispatch_id, "{}", NOT_CONFIGURED);
            return Ok(ChannelResult::failed(NOT_CONFIGURED));
        };

        let body = json!({
            "chat_id": chat_id,
            "text": context.message,
            "parse_mode": "Markdown",
            "reply_markup": {
                "inline_keyboard": [[{
                    "text": "✅ Acknowledge Receipt",
                    "callback_data": format!("ack:{}", context.dispatch_id),
                }]]
            }
        });

        let response = self
            .client
            .post(self.method_url(token, "sendMessage"))
            .json(&body)
            .send()
            .await?;

        let data: TelegramResponse<SentMessage> = response.json().await.map_err(|e| {
            ChannelError::Provider(format!(
                "Invalid Telegram API response: {}",
                e.without_url()
            ))
        })?;

        match (data.ok, data.result) {
            (true, Some(message)) => {
                info!(
                    dispatch_id = %context.dispatch_id,
                    driver_id = %context.driver.id,
                    message_id = message.message_id,
                    "Telegram message sent"
                );
                Ok(ChannelResult::delivered(Some(message.message_id.to_string())))
            }
            _ => {
                let description = data
                    .description
                    .unwrap_or_else(|| "Unknown Telegram API error".to_string());
                warn!(
                    dispatch_id = %context.dispatch_id,
                    error_code = ?data.error_code,
                    "Telegram API returned error: {}",
                    description
                );
                Ok(ChannelResult::failed(description))
            }
        }
    }

    async fn health_check(&self) -> HealthStatus {
        let Some(ref token) = self.bot_token else {
            return HealthStatus::unhealthy(NOT_CONFIGURED);
        };

        match self.get_me(token).await {
            Ok(bot) => HealthStatus::healthy(format!(
                "Bot connected: @{}",
                bot.username.unwrap_or(bot.first_name)
            )),
            Err(message) => HealthStatus::unhealthy(message),
        }
    }
}

#[async_trait]
impl TelegramBot for TelegramAdapter {
    async fn bot_username(&self) -> Option<String> {
        if let Some(username) = self.bot_username.read().await.clone() {
            return Some(username);
        }

        let token = self.bot_token.as_deref()?;
        match self.get_me(token).await {
            Ok(BotUser {
                username: Some(username),
                ..
            }) => {
                debug!(username = %username, "Resolved bot username");
                *self.bot_username.write().await = Some(username.clone());
                Some(username)
            }
            Ok(_) => {
                warn!("Bot has no username; registration links are unavailable");
                None
            }
            Err(e) => {
                warn!("Could not resolve bot username: {}", e);
                None
            }
        }
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        self.call::<SentMessage>("sendMessage", &body).await.map(|_| ())
    }

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: &str,
    ) -> Result<(), ChannelError> {
        let body = json!({
            "callback_query_id": callback_query_id,
            "text": text,
        });
        self.call::<bool>("answerCallbackQuery", &body).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> TelegramAdapter {
        TelegramAdapter::new(Some(&TelegramConfig {
            bot_token: "123:abc".to_string(),
            api_base: server.uri(),
            timeout_secs: 5,
            bot_username: None,
            webhook_secret: None,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_posts_message_with_ack_button() {
        let server = MockServer::start().await;
        let context = fixtures::dispatch_context("dispatch-1");

        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "12345",
                "parse_mode": "Markdown",
                "reply_markup": {
                    "inline_keyboard": [[{"callback_data": "ack:dispatch-1"}]]
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {"message_id": 42, "chat": {"id": 12345, "type": "private"}, "date": 0}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = adapter(&server).send(&context).await.unwrap();

        assert_eq!(result, ChannelResult::delivered(Some("42".to_string())));
    }

    #[tokio::test]
    async fn test_send_reports_api_error_description() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let result = adapter(&server)
            .send(&fixtures::dispatch_context("dispatch-1"))
            .await
            .unwrap();

        assert_eq!(result, ChannelResult::failed("Bad Request: chat not found"));
    }

    #[tokio::test]
    async fn test_send_without_token_fails_without_request() {
        let adapter = TelegramAdapter::new(None).unwrap();

        let result = adapter
            .send(&fixtures::dispatch_context("dispatch-1"))
            .await
            .unwrap();

        assert_eq!(result, ChannelResult::failed(NOT_CONFIGURED));
        assert!(!adapter.is_configured());
    }

    #[tokio::test]
    async fn test_unreachable_api_is_an_error() {
        let adapter = TelegramAdapter::new(Some(&TelegramConfig {
            bot_token: "123:abc".to_string(),
            api_base: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
            bot_username: None,
            webhook_secret: None,
        }))
        .unwrap();

        let result = adapter.send(&fixtures::dispatch_context("dispatch-1")).await;

        assert!(matches!(result, Err(ChannelError::Transport(_))));
    }

    #[tokio::test]
    async fn test_bot_token_never_reaches_error_text() {
        let adapter = TelegramAdapter::new(Some(&TelegramConfig {
            bot_token: "999:SECRETTOKEN".to_string(),
            api_base: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
            bot_username: None,
            webhook_secret: None,
        }))
        .unwrap();

        let err = adapter
            .send(&fixtures::dispatch_context("dispatch-1"))
            .await
            .unwrap_err();
        assert!(!err.to_string().contains("SECRETTOKEN"), "{}", err);

        let health = adapter.health_check().await;
        assert!(!health.healthy);
        assert!(!health.message.contains("SECRETTOKEN"), "{}", health.message);

        let err = adapter.send_text("777", "hello").await.unwrap_err();
        assert!(!err.to_string().contains("SECRETTOKEN"), "{}", err);
    }

    #[test]
    fn test_can_send_requires_chat_id() {
        let adapter = TelegramAdapter::new(None).unwrap();
        let mut driver = fixtures::driver(fixtures::DRIVER_ID);
        assert!(adapter.can_send(&driver));

        driver.telegram_chat_id = Some(" ".to_string());
        assert!(!adapter.can_send(&driver));
    }

    #[tokio::test]
    async fn test_health_check_reports_bot_username() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/bot123:abc/getMe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {"id": 1, "is_bot": true, "first_name": "Dispatch", "username": "fleet_dispatch_bot"}
            })))
            .mount(&server)
            .await;

        let health = adapter(&server).health_check().await;

        assert_eq!(health, HealthStatus::healthy("Bot connected: @fleet_dispatch_bot"));
    }

    #[tokio::test]
    async fn test_health_check_not_configured() {
        let health = TelegramAdapter::new(None).unwrap().health_check().await;
        assert_eq!(health, HealthStatus::unhealthy(NOT_CONFIGURED));
    }

    #[tokio::test]
    async fn test_bot_username_prefers_config() {
        let adapter = TelegramAdapter::new(Some(&TelegramConfig {
            bot_token: "123:abc".to_string(),
            api_base: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
            bot_username: Some("@FleetilloBot".to_string()),
            webhook_secret: None,
        }))
        .unwrap();

        assert_eq!(adapter.bot_username().await.as_deref(), Some("FleetilloBot"));
    }

    #[tokio::test]
    async fn test_bot_username_resolved_once_via_get_me() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/bot123:abc/getMe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {"id": 1, "is_bot": true, "first_name": "Dispatch", "username": "fleet_dispatch_bot"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(&server);

        assert_eq!(adapter.bot_username().await.as_deref(), Some("fleet_dispatch_bot"));
        assert_eq!(adapter.bot_username().await.as_deref(), Some("fleet_dispatch_bot"));
    }

    #[tokio::test]
    async fn test_bot_username_unknown_without_token() {
        assert!(TelegramAdapter::new(None).unwrap().bot_username().await.is_none());
    }

    #[tokio::test]
    async fn test_send_text_posts_markdown_without_keyboard() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "777",
                "text": "hello",
                "parse_mode": "Markdown"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {"message_id": 5}
            })))
            .expect(1)
            .mount(&server)
            .await;

        adapter(&server).send_text("777", "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_answer_callback_query_reports_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/answerCallbackQuery"))
            .and(body_partial_json(serde_json::json!({"callback_query_id": "cb-1"})))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: query is too old"
            })))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .answer_callback_query("cb-1", "done")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Bad Request: query is too old");
    }

    #[tokio::test]
    async fn test_send_text_without_token_is_an_error() {
        let err = TelegramAdapter::new(None)
            .unwrap()
            .send_text("777", "hello")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), NOT_CONFIGURED);
    }
}
