//! Email adapter over SendGrid or Resend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use super::{ChannelAdapter, ChannelError, ChannelResult, ChannelType, DispatchContext, HealthStatus};
use crate::config::{EmailConfig, EmailProvider};
use crate::entities::Driver;
use crate::template::email_subject;

const NOT_CONFIGURED: &str = "Email provider is not configured";
const NO_ADDRESS: &str = "Driver does not have email address configured";

/// Delivers dispatches as HTML email.
pub struct EmailAdapter {
    client: Client,
    config: Option<EmailConfig>,
}

#[derive(Debug, Deserialize)]
struct SendGridErrors {
    #[serde(default)]
    errors: Vec<SendGridError>,
}

#[derive(Debug, Deserialize)]
struct SendGridError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    id: Option<String>,
    message: Option<String>,
}

impl EmailAdapter {
    /// Build the adapter. A missing config or blank API key leaves the adapter
    /// registered but unable to send.
    pub fn new(config: Option<&EmailConfig>) -> Result<Self, ChannelError> {
        let timeout_secs = config.map(|c| c.timeout_secs).unwrap_or(30);
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs as u64))
            .build()?;

        Ok(Self {
            client,
            config: config.filter(|c| !c.api_key.trim().is_empty()).cloned(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    async fn send_via_sendgrid(
        &self,
        config: &EmailConfig,
        to: &str,
        subject: &str,
        html: &str,
    ) -> Result<ChannelResult, ChannelError> {
        let body = json!({
            "personalizations": [{"to": [{"email": to}]}],
            "from": {"email": config.from_address, "name": config.from_name},
            "subject": subject,
            "content": [{"type": "text/html", "value": html}],
        });

        let response = self
            .client
            .post(format!("{}/v3/mail/send", config.api_base()))
            .bearer_auth(config.api_key.trim())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::ACCEPTED || status == StatusCode::OK {
            let message_id = response
                .headers()
                .get("x-message-id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Ok(ChannelResult::delivered(message_id));
        }

        let fallback = format!("SendGrid API error: {}", status.as_u16());
        let messages: Vec<String> = match response.json::<SendGridErrors>().await {
            Ok(parsed) => parsed
                .errors
                .into_iter()
                .filter_map(|e| e.message)
                .filter(|m| !m.trim().is_empty())
                .collect(),
            Err(_) => Vec::new(),
        };
        let error = if messages.is_empty() {
            fallback
        } else {
            messages.join(", ")
        };
        Ok(ChannelResult::failed(error))
    }

    async fn send_via_resend(
        &self,
        config: &EmailConfig,
        to: &str,
        subject: &str,
        html: &str,
    ) -> Result<ChannelResult, ChannelError> {
        let body = json!({
            "from": format!("{} <{}>", config.from_name, config.from_address),
            "to": [to],
            "subject": subject,
            "html": html,
        });

        let response = self
            .client
            .post(format!("{}/emails", config.api_base()))
            .bearer_auth(config.api_key.trim())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let parsed = response.json::<ResendResponse>().await.ok();

        match parsed {
            Some(ResendResponse { id: Some(id), .. }) if status.is_success() => {
                Ok(ChannelResult::delivered(Some(id)))
            }
            other => Ok(ChannelResult::failed(
                other
                    .and_then(|r| r.message)
                    .unwrap_or_else(|| format!("Resend API error: {}", status.as_u16())),
            )),
        }
    }
}

#[async_trait]
impl ChannelAdapter for EmailAdapter {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Email
    }

    fn can_send(&self, driver: &Driver) -> bool {
        driver.email_address().is_some()
    }

    async fn send(&self, context: &DispatchContext) -> Result<ChannelResult, ChannelError> {
        let Some(to) = context.driver.email_address() else {
            warn!(dispatch_id = %context.dispatch_id, driver_id = %context.driver.id, "{}", NO_ADDRESS);
            return Ok(ChannelResult::failed(NO_ADDRESS));
        };

        let Some(ref config) = self.config else {
            error!(dispatch_id = %context.dispatch_id, "{}", NOT_CONFIGURED);
            return Ok(ChannelResult::failed(NOT_CONFIGURED));
        };

        let subject = email_subject(&context.route.name, &context.route.date);
        let result = match config.provider {
            EmailProvider::Sendgrid => {
                self.send_via_sendgrid(config, to, &subject, &context.message)
                    .await?
            }
            EmailProvider::Resend => {
                self.send_via_resend(config, to, &subject, &context.message)
                    .await?
            }
        };

        match result {
            ChannelResult::Delivered {
                ref provider_message_id,
            } => info!(
                dispatch_id = %context.dispatch_id,
                provider = config.provider.as_str(),
                message_id = ?provider_message_id,
                "Email sent"
            ),
            ChannelResult::Failed { ref error } => warn!(
                dispatch_id = %context.dispatch_id,
                provider = config.provider.as_str(),
                "Email provider returned error: {}",
                error
            ),
        }

        Ok(result)
    }

    async fn health_check(&self) -> HealthStatus {
        let Some(ref config) = self.config else {
            return HealthStatus::unhealthy(NOT_CONFIGURED);
        };

        let (url, connected) = match config.provider {
            EmailProvider::Sendgrid => (
                format!("{}/v3/user/profile", config.api_base()),
                "SendGrid API connected",
            ),
            EmailProvider::Resend => (
                format!("{}/domains", config.api_base()),
                "Resend API connected",
            ),
        };

        match self
            .client
            .get(url)
            .bearer_auth(config.api_key.trim())
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => HealthStatus::healthy(connected),
            Ok(response) if response.status() == StatusCode::UNAUTHORIZED => {
                HealthStatus::unhealthy("Invalid API key")
            }
            Ok(response) => {
                HealthStatus::unhealthy(format!("API error: {}", response.status().as_u16()))
            }
            Err(e) => HealthStatus::unhealthy(format!("Health check failed: {}", e.without_url())),
        }
    }
}
