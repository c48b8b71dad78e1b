//! Entity lookup trait.

use thiserror::Error;

use super::{Booking, Driver, Route, Vehicle};

/// Error type for entity lookups.
#[derive(Debug, Error)]
pub enum EntityError {
    #[error("Database error: {0}")]
    Database(String),
}

/// Access to fleet entities.
///
/// Lookups return `Ok(None)` when the entity does not exist; `Err` is reserved
/// for the store itself being unavailable. The only write is linking a
/// driver's Telegram chat after they register with the bot.
pub trait EntityStore: Send + Sync {
    fn get_route(&self, id: &str) -> Result<Option<Route>, EntityError>;

    fn get_driver(&self, id: &str) -> Result<Option<Driver>, EntityError>;

    fn get_vehicle(&self, id: &str) -> Result<Option<Vehicle>, EntityError>;

    /// Bookings for a route, ordered by stop number.
    fn get_bookings_for_route(&self, route_id: &str) -> Result<Vec<Booking>, EntityError>;

    /// Point the driver's notifications at `chat_id`. Returns `false` when
    /// the driver does not exist.
    fn link_telegram_chat(&self, driver_id: &str, chat_id: &str) -> Result<bool, EntityError>;
}
