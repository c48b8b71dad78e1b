//! Fleet entities (routes, drivers, vehicles, bookings).

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteEntityStore;
pub use store::{EntityError, EntityStore};
pub use types::{Booking, Driver, DriverStatus, Route, Vehicle};
