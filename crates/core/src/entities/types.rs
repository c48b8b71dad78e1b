//! Fleet entities read by the dispatch service.
//!
//! These records are owned by the fleet-operations backend; the dispatch
//! service only reads them to validate requests and to build messages.

use serde::{Deserialize, Serialize};

use crate::channel::ChannelType;

/// A planned route for a single day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub name: String,
    pub code: Option<String>,
    /// Route date (YYYY-MM-DD).
    pub date: String,
    pub planned_start_time: Option<String>,
    pub planned_end_time: Option<String>,
    pub total_stops: u32,
    pub total_distance_km: Option<f64>,
    pub total_duration_minutes: Option<u32>,
    pub vehicle_id: Option<String>,
    pub driver_id: Option<String>,
}

/// Whether a driver is currently accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Active,
    Inactive,
}

impl DriverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Active => "active",
            DriverStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(DriverStatus::Active),
            "inactive" => Some(DriverStatus::Inactive),
            _ => None,
        }
    }
}

/// A driver and their contact preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub preferred_channel: Option<ChannelType>,
    /// Whether another channel may be tried when the first one fails.
    pub fallback_enabled: bool,
    pub status: DriverStatus,
}

impl Driver {
    /// "First Last", trimmed when either half is missing.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Email address if present and non-blank.
    pub fn email_address(&self) -> Option<&str> {
        non_blank(self.email.as_deref())
    }

    /// Telegram chat id if present and non-blank.
    pub fn telegram_chat(&self) -> Option<&str> {
        non_blank(self.telegram_chat_id.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A vehicle assigned to a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub name: String,
    pub license_plate: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
}

/// A stop on a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub route_id: String,
    pub stop_number: u32,
    pub client_name: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub maps_url: Option<String>,
    pub scheduled_time: Option<String>,
    pub services: Option<String>,
    pub special_instructions: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> Driver {
        Driver {
            id: "d1".to_string(),
            first_name: "Ada".to_string(),
            last_name: "".to_string(),
            email: Some("   ".to_string()),
            telegram_chat_id: Some(" 12345 ".to_string()),
            preferred_channel: None,
            fallback_enabled: true,
            status: DriverStatus::Active,
        }
    }

    #[test]
    fn test_full_name_trims_missing_half() {
        assert_eq!(driver().full_name(), "Ada");
    }

    #[test]
    fn test_blank_contact_details_are_absent() {
        let d = driver();
        assert_eq!(d.email_address(), None);
        assert_eq!(d.telegram_chat(), Some("12345"));
    }

    #[test]
    fn test_driver_status_round_trip() {
        for status in [DriverStatus::Active, DriverStatus::Inactive] {
            assert_eq!(DriverStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DriverStatus::parse("retired"), None);
    }
}
