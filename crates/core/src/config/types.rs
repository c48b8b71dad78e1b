use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::orchestrator::OrchestratorConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub email: Option<EmailConfig>,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    3001
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Accepted client keys (required when method = "api_key")
    #[serde(default)]
    pub api_keys: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::ApiKey => "api_key",
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("dispatch.db")
}

/// Telegram Bot API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Bot API base URL (default: https://api.telegram.org)
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
    /// HTTP request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Username for `t.me` registration links; looked up with `getMe` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_username: Option<String>,
    /// Expected `X-Telegram-Bot-Api-Secret-Token` on webhook calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
}

impl TelegramConfig {
    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_timeout() -> u32 {
    30
}

/// Transactional email provider
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmailProvider {
    Sendgrid,
    Resend,
}

impl EmailProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailProvider::Sendgrid => "sendgrid",
            EmailProvider::Resend => "resend",
        }
    }

    pub fn default_api_base(&self) -> &'static str {
        match self {
            EmailProvider::Sendgrid => "https://api.sendgrid.com",
            EmailProvider::Resend => "https://api.resend.com",
        }
    }
}

/// Email channel configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    #[serde(default = "default_email_provider")]
    pub provider: EmailProvider,
    pub api_key: String,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// Override the provider's API base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl EmailConfig {
    pub fn api_base(&self) -> &str {
        self.api_base
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_base())
    }
}

fn default_email_provider() -> EmailProvider {
    EmailProvider::Sendgrid
}

fn default_from_address() -> String {
    "dispatch@fleetillo.com".to_string()
}

fn default_from_name() -> String {
    "Fleetillo Dispatch".to_string()
}

/// Per-client request limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Authenticated API routes, per client IP
    #[serde(default = "default_general_per_minute")]
    pub general_per_minute: u32,
    /// Dispatch routes, per API key (or client IP without one)
    #[serde(default = "default_dispatch_per_minute")]
    pub dispatch_per_minute: u32,
    /// Telegram webhook, across all callers
    #[serde(default = "default_webhook_per_second")]
    pub webhook_per_second: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            general_per_minute: default_general_per_minute(),
            dispatch_per_minute: default_dispatch_per_minute(),
            webhook_per_second: default_webhook_per_second(),
        }
    }
}

impl RateLimitConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_general_per_minute() -> u32 {
    100
}

fn default_dispatch_per_minute() -> u32 {
    50
}

fn default_webhook_per_second() -> u32 {
    10
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub orchestrator: OrchestratorConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<SanitizedTelegramConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<SanitizedEmailConfig>,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_keys_configured: usize,
}

/// Sanitized Telegram config (bot token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTelegramConfig {
    pub api_base: String,
    pub bot_token_configured: bool,
    pub timeout_secs: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_username: Option<String>,
    pub webhook_secret_configured: bool,
}

/// Sanitized email config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEmailConfig {
    pub provider: String,
    pub api_key_configured: bool,
    pub from_address: String,
    pub from_name: String,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: config.auth.method.as_str().to_string(),
                api_keys_configured: config
                    .auth
                    .api_keys
                    .iter()
                    .filter(|k| !k.trim().is_empty())
                    .count(),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            orchestrator: config.orchestrator.clone(),
            telegram: config.telegram.as_ref().map(|t| SanitizedTelegramConfig {
                api_base: t.api_base.clone(),
                bot_token_configured: !t.bot_token.trim().is_empty(),
                timeout_secs: t.timeout_secs,
                bot_username: t.bot_username.clone(),
                webhook_secret_configured: t.webhook_secret().is_some(),
            }),
            email: config.email.as_ref().map(|e| SanitizedEmailConfig {
                provider: e.provider.as_str().to_string(),
                api_key_configured: !e.api_key.trim().is_empty(),
                from_address: e.from_address.clone(),
                from_name: e.from_name.clone(),
                timeout_secs: e.timeout_secs,
            }),
            rate_limit: config.rate_limit.clone(),
        }
    }
}
