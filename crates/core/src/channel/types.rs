use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entities::{Booking, Driver, Route, Vehicle};

/// A communication medium a dispatch can be delivered over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Telegram,
    Email,
    Sms,
    Push,
}

impl ChannelType {
    /// Every known channel, in declaration order.
    pub const ALL: [ChannelType; 4] = [
        ChannelType::Telegram,
        ChannelType::Email,
        ChannelType::Sms,
        ChannelType::Push,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Telegram => "telegram",
            ChannelType::Email => "email",
            ChannelType::Sms => "sms",
            ChannelType::Push => "push",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const DEFAULT_FAILURE: &str = "Unknown error occurred";

/// Outcome reported by an adapter for one send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChannelResult {
    Delivered {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_message_id: Option<String>,
    },
    Failed {
        error: String,
    },
}

impl ChannelResult {
    /// Successful send; an empty provider id is treated as absent.
    pub fn delivered(provider_message_id: Option<String>) -> Self {
        ChannelResult::Delivered {
            provider_message_id: provider_message_id.filter(|id| !id.trim().is_empty()),
        }
    }

    /// Failed send; a blank error is replaced so the stored message is never empty.
    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        ChannelResult::Failed {
            error: if error.trim().is_empty() {
                DEFAULT_FAILURE.to_string()
            } else {
                error
            },
        }
    }

    /// Re-apply the constructor rules to a value built directly from the variants.
    pub fn normalized(self) -> Self {
        match self {
            ChannelResult::Delivered {
                provider_message_id,
            } => Self::delivered(provider_message_id),
            ChannelResult::Failed { error } => Self::failed(error),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, ChannelResult::Delivered { .. })
    }
}

/// Adapter readiness, used for health reporting only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: String,
}

impl HealthStatus {
    pub fn healthy(message: impl Into<String>) -> Self {
        Self {
            healthy: true,
            message: message.into(),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: message.into(),
        }
    }
}

/// Everything an adapter needs to deliver one dispatch.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub dispatch_id: String,
    pub route: Route,
    pub driver: Driver,
    pub vehicle: Option<Vehicle>,
    pub bookings: Vec<Booking>,
    /// Message body already rendered for the adapter's channel.
    pub message: String,
}
