//! Testing utilities and mock implementations.
//!
//! Provides a controllable channel adapter and fleet fixtures so the
//! orchestrator can be exercised end to end without real providers.
//!
//! # Example
//!
//! ```rust,ignore
//! use dispatch_core::testing::{fixtures, MockChannelAdapter};
//!
//! let entities = Arc::new(fixtures::seeded_entity_store());
//! let registry = AdapterRegistry::new()
//!     .with(Arc::new(MockChannelAdapter::new(ChannelType::Telegram)));
//! ```

mod failing_store;
mod mock_bot;
mod mock_channel;

pub use failing_store::{FailingDispatchStore, StoreFault};
pub use mock_bot::{CallbackAnswer, MockTelegramBot, SentText};
pub use mock_channel::{MockChannelAdapter, MockSendBehavior, RecordedSend};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::channel::DispatchContext;
    use crate::entities::{Booking, Driver, DriverStatus, Route, SqliteEntityStore, Vehicle};

    pub const ROUTE_ID: &str = "6f1c2a9e-3b4d-4e5f-8a7b-1c2d3e4f5a6b";
    pub const DRIVER_ID: &str = "9a8b7c6d-5e4f-4a3b-9c1d-0e1f2a3b4c5d";
    pub const VEHICLE_ID: &str = "2b3c4d5e-6f70-4182-a394-a5b6c7d8e9f0";
    /// A driver with no contact details at all.
    pub const UNREACHABLE_DRIVER_ID: &str = "0d1e2f3a-4b5c-4d6e-8f7a-8b9c0d1e2f3a";

    /// A route with every optional field populated.
    pub fn route(id: &str) -> Route {
        Route {
            id: id.to_string(),
            name: "Downtown Route A".to_string(),
            code: Some("DT-A".to_string()),
            date: "2024-01-15".to_string(),
            planned_start_time: Some("08:00".to_string()),
            planned_end_time: Some("16:30".to_string()),
            total_stops: 2,
            total_distance_km: Some(42.5),
            total_duration_minutes: Some(510),
            vehicle_id: Some(VEHICLE_ID.to_string()),
            driver_id: Some(DRIVER_ID.to_string()),
        }
    }

    /// An active driver reachable by telegram and email.
    pub fn driver(id: &str) -> Driver {
        Driver {
            id: id.to_string(),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            email: Some("john.doe@example.com".to_string()),
            telegram_chat_id: Some("12345".to_string()),
            preferred_channel: None,
            fallback_enabled: true,
            status: DriverStatus::Active,
        }
    }

    pub fn unreachable_driver(id: &str) -> Driver {
        Driver {
            email: None,
            telegram_chat_id: None,
            ..driver(id)
        }
    }

    pub fn vehicle(id: &str) -> Vehicle {
        Vehicle {
            id: id.to_string(),
            name: "Van 1".to_string(),
            license_plate: Some("ABC-123".to_string()),
            make: Some("Ford".to_string()),
            model: Some("Transit".to_string()),
        }
    }

    pub fn booking(id: &str, route_id: &str, stop_number: u32) -> Booking {
        Booking {
            id: id.to_string(),
            route_id: route_id.to_string(),
            stop_number,
            client_name: format!("Client {}", stop_number),
            address: format!("{} Main St", stop_number * 100),
            latitude: Some(40.7128),
            longitude: Some(-74.006),
            maps_url: None,
            scheduled_time: Some(format!("{:02}:00", 8 + stop_number)),
            services: Some("Pool cleaning".to_string()),
            special_instructions: None,
        }
    }

    /// Context as an adapter would receive it, with a placeholder message.
    pub fn dispatch_context(dispatch_id: &str) -> DispatchContext {
        DispatchContext {
            dispatch_id: dispatch_id.to_string(),
            route: route(ROUTE_ID),
            driver: driver(DRIVER_ID),
            vehicle: Some(vehicle(VEHICLE_ID)),
            bookings: vec![booking("booking-1", ROUTE_ID, 1), booking("booking-2", ROUTE_ID, 2)],
            message: "You have been assigned Downtown Route A".to_string(),
        }
    }

    /// In-memory entity store holding the fixture route, vehicle, bookings,
    /// the reachable driver and the unreachable one.
    pub fn seeded_entity_store() -> SqliteEntityStore {
        let store = SqliteEntityStore::in_memory().expect("in-memory entity store");
        store.upsert_route(&route(ROUTE_ID)).expect("seed route");
        store.upsert_driver(&driver(DRIVER_ID)).expect("seed driver");
        store
            .upsert_driver(&unreachable_driver(UNREACHABLE_DRIVER_ID))
            .expect("seed driver");
        store.upsert_vehicle(&vehicle(VEHICLE_ID)).expect("seed vehicle");
        for stop in 1..=2 {
            store
                .upsert_booking(&booking(&format!("booking-{}", stop), ROUTE_ID, stop))
                .expect("seed booking");
        }
        store
    }
}
