use std::sync::Arc;

use dispatch_core::{Authenticator, BotService, Config, DispatchOrchestrator, SanitizedConfig};

use crate::api::rate_limit::RateLimits;

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    orchestrator: Arc<DispatchOrchestrator>,
    bot: Option<Arc<BotService>>,
    rate_limits: Option<RateLimits>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        orchestrator: Arc<DispatchOrchestrator>,
    ) -> Self {
        let rate_limits = RateLimits::from_config(&config.rate_limit);
        Self {
            config,
            authenticator,
            orchestrator,
            bot: None,
            rate_limits,
        }
    }

    /// Serve the Telegram webhook and registration links through `bot`.
    pub fn with_bot(mut self, bot: Arc<BotService>) -> Self {
        self.bot = Some(bot);
        self
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn orchestrator(&self) -> &DispatchOrchestrator {
        &self.orchestrator
    }

    pub fn bot(&self) -> Option<&BotService> {
        self.bot.as_deref()
    }

    /// `None` when rate limiting is disabled.
    pub fn rate_limits(&self) -> Option<&RateLimits> {
        self.rate_limits.as_ref()
    }

    /// Expected `X-Telegram-Bot-Api-Secret-Token`, if one is configured.
    pub fn telegram_webhook_secret(&self) -> Option<&str> {
        self.config
            .telegram
            .as_ref()
            .and_then(|telegram| telegram.webhook_secret())
    }
}
