use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::ChannelType;

/// Free-form caller metadata attached to a dispatch.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Lifecycle of a dispatch.
///
/// ```text
/// pending -> sending -> delivered | partial | failed
/// pending -> failed                  (no channel to attempt)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Pending,
    Sending,
    Delivered,
    Partial,
    Failed,
}

impl DispatchStatus {
    pub const ALL: [DispatchStatus; 5] = [
        DispatchStatus::Pending,
        DispatchStatus::Sending,
        DispatchStatus::Delivered,
        DispatchStatus::Partial,
        DispatchStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStatus::Pending => "pending",
            DispatchStatus::Sending => "sending",
            DispatchStatus::Delivered => "delivered",
            DispatchStatus::Partial => "partial",
            DispatchStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DispatchStatus::Delivered | DispatchStatus::Partial | DispatchStatus::Failed
        )
    }

    /// Status only moves forward; terminal states accept nothing.
    pub fn can_transition_to(&self, next: DispatchStatus) -> bool {
        use DispatchStatus::*;
        matches!(
            (self, next),
            (Pending, Sending) | (Pending, Failed) | (Sending, Delivered) | (Sending, Partial) | (Sending, Failed)
        )
    }
}

/// Lifecycle of one channel attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelDispatchStatus {
    Pending,
    Sending,
    Delivered,
    Failed,
}

impl ChannelDispatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelDispatchStatus::Pending => "pending",
            ChannelDispatchStatus::Sending => "sending",
            ChannelDispatchStatus::Delivered => "delivered",
            ChannelDispatchStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ChannelDispatchStatus::Pending),
            "sending" => Some(ChannelDispatchStatus::Sending),
            "delivered" => Some(ChannelDispatchStatus::Delivered),
            "failed" => Some(ChannelDispatchStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChannelDispatchStatus::Delivered | ChannelDispatchStatus::Failed
        )
    }

    pub fn can_transition_to(&self, next: ChannelDispatchStatus) -> bool {
        use ChannelDispatchStatus::*;
        matches!(
            (self, next),
            (Pending, Sending) | (Pending, Delivered) | (Pending, Failed) | (Sending, Delivered) | (Sending, Failed)
        )
    }
}

/// One request to notify a driver about a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispatch {
    pub id: String,
    pub route_id: String,
    pub driver_id: String,
    pub status: DispatchStatus,
    /// Fixed once the dispatch is created.
    pub requested_channels: Vec<ChannelType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One delivery attempt over one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDispatch {
    pub id: String,
    pub dispatch_id: String,
    pub channel: ChannelType,
    pub status: ChannelDispatchStatus,
    /// Set only when delivered and the provider returned an id.
    pub provider_message_id: Option<String>,
    /// Set only when failed; never empty.
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    /// When the driver pressed the acknowledge button; delivered rows only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A dispatch together with all of its channel attempts, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchWithChannels {
    #[serde(flatten)]
    pub dispatch: Dispatch,
    pub channel_dispatches: Vec<ChannelDispatch>,
}

/// Request to persist a new dispatch.
#[derive(Debug, Clone)]
pub struct NewDispatch {
    pub route_id: String,
    pub driver_id: String,
    pub requested_channels: Vec<ChannelType>,
    pub metadata: Option<Metadata>,
}

/// Status change for a channel attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDispatchUpdate {
    pub status: ChannelDispatchStatus,
    pub provider_message_id: Option<String>,
    pub error_message: Option<String>,
}

impl ChannelDispatchUpdate {
    pub fn sending() -> Self {
        Self {
            status: ChannelDispatchStatus::Sending,
            provider_message_id: None,
            error_message: None,
        }
    }

    pub fn delivered(provider_message_id: Option<String>) -> Self {
        Self {
            status: ChannelDispatchStatus::Delivered,
            provider_message_id,
            error_message: None,
        }
    }

    pub fn failed(error_message: impl Into<String>) -> Self {
        Self {
            status: ChannelDispatchStatus::Failed,
            provider_message_id: None,
            error_message: Some(error_message.into()),
        }
    }
}

/// Filter for listing dispatches.
#[derive(Debug, Clone)]
pub struct DispatchFilter {
    pub status: Option<DispatchStatus>,
    pub driver_id: Option<String>,
    pub route_id: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for DispatchFilter {
    fn default() -> Self {
        Self {
            status: None,
            driver_id: None,
            route_id: None,
            limit: 100,
            offset: 0,
        }
    }
}

impl DispatchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: DispatchStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_driver_id(mut self, driver_id: impl Into<String>) -> Self {
        self.driver_id = Some(driver_id.into());
        self
    }

    pub fn with_route_id(mut self, route_id: impl Into<String>) -> Self {
        self.route_id = Some(route_id.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_status_only_moves_forward() {
        use DispatchStatus::*;

        assert!(Pending.can_transition_to(Sending));
        assert!(Pending.can_transition_to(Failed));
        assert!(Sending.can_transition_to(Partial));

        assert!(!Sending.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Delivered));
        assert!(!Pending.can_transition_to(Pending));
        for terminal in [Delivered, Partial, Failed] {
            assert!(terminal.is_terminal());
            for next in DispatchStatus::ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_channel_status_single_terminal_update() {
        use ChannelDispatchStatus::*;

        assert!(Pending.can_transition_to(Delivered));
        assert!(Sending.can_transition_to(Failed));
        assert!(!Delivered.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Delivered));
        assert!(!Sending.can_transition_to(Pending));
    }

    #[test]
    fn test_status_wire_names() {
        for status in DispatchStatus::ALL {
            assert_eq!(DispatchStatus::parse(status.as_str()), Some(status));
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::json!(status.as_str())
            );
        }
        assert_eq!(DispatchStatus::parse("done"), None);
    }

    #[test]
    fn test_dispatch_with_channels_is_flat() {
        let now = Utc::now();
        let detail = DispatchWithChannels {
            dispatch: Dispatch {
                id: "d1".to_string(),
                route_id: "r1".to_string(),
                driver_id: "dr1".to_string(),
                status: DispatchStatus::Pending,
                requested_channels: vec![ChannelType::Telegram],
                metadata: None,
                created_at: now,
                updated_at: now,
            },
            channel_dispatches: vec![],
        };

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["id"], "d1");
        assert_eq!(json["requested_channels"], serde_json::json!(["telegram"]));
        assert!(json["channel_dispatches"].as_array().unwrap().is_empty());
        assert!(json.get("metadata").is_none());
    }
}
