//! SQLite-backed entity store.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use super::{Booking, Driver, DriverStatus, EntityError, EntityStore, Route, Vehicle};
use crate::channel::ChannelType;

/// SQLite-backed entity store.
///
/// Apart from Telegram chat linking the dispatch service only reads
/// entities; the `upsert_*` helpers exist so deployments and tests can seed
/// the tables.
pub struct SqliteEntityStore {
    conn: Mutex<Connection>,
}

impl SqliteEntityStore {
    /// Open (or create) the entity database at `path`.
    pub fn new(path: &Path) -> Result<Self, EntityError> {
        let conn = Connection::open(path).map_err(|e| EntityError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory entity store.
    pub fn in_memory() -> Result<Self, EntityError> {
        let conn =
            Connection::open_in_memory().map_err(|e| EntityError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), EntityError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS routes (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                code TEXT,
                date TEXT NOT NULL,
                planned_start_time TEXT,
                planned_end_time TEXT,
                total_stops INTEGER NOT NULL DEFAULT 0,
                total_distance_km REAL,
                total_duration_minutes INTEGER,
                vehicle_id TEXT,
                driver_id TEXT
            );

            CREATE TABLE IF NOT EXISTS drivers (
                id TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT,
                telegram_chat_id TEXT,
                preferred_channel TEXT,
                fallback_enabled INTEGER NOT NULL DEFAULT 1,
                status TEXT NOT NULL DEFAULT 'active'
            );

            CREATE TABLE IF NOT EXISTS vehicles (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                license_plate TEXT,
                make TEXT,
                model TEXT
            );

            CREATE TABLE IF NOT EXISTS bookings (
                id TEXT PRIMARY KEY,
                route_id TEXT NOT NULL,
                stop_number INTEGER NOT NULL,
                client_name TEXT NOT NULL,
                address TEXT NOT NULL,
                latitude REAL,
                longitude REAL,
                maps_url TEXT,
                scheduled_time TEXT,
                services TEXT,
                special_instructions TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_bookings_route ON bookings(route_id, stop_number);
            "#,
        )
        .map_err(|e| EntityError::Database(e.to_string()))
    }

    pub fn upsert_route(&self, route: &Route) -> Result<(), EntityError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO routes (id, name, code, date, planned_start_time, planned_end_time, total_stops, total_distance_km, total_duration_minutes, vehicle_id, driver_id) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                route.id,
                route.name,
                route.code,
                route.date,
                route.planned_start_time,
                route.planned_end_time,
                route.total_stops,
                route.total_distance_km,
                route.total_duration_minutes,
                route.vehicle_id,
                route.driver_id,
            ],
        )
        .map_err(|e| EntityError::Database(e.to_string()))?;
        Ok(())
    }

    pub fn upsert_driver(&self, driver: &Driver) -> Result<(), EntityError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO drivers (id, first_name, last_name, email, telegram_chat_id, preferred_channel, fallback_enabled, status) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                driver.id,
                driver.first_name,
                driver.last_name,
                driver.email,
                driver.telegram_chat_id,
                driver.preferred_channel.map(|c| c.as_str()),
                driver.fallback_enabled,
                driver.status.as_str(),
            ],
        )
        .map_err(|e| EntityError::Database(e.to_string()))?;
        Ok(())
    }

    pub fn upsert_vehicle(&self, vehicle: &Vehicle) -> Result<(), EntityError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO vehicles (id, name, license_plate, make, model) VALUES (?, ?, ?, ?, ?)",
            params![
                vehicle.id,
                vehicle.name,
                vehicle.license_plate,
                vehicle.make,
                vehicle.model,
            ],
        )
        .map_err(|e| EntityError::Database(e.to_string()))?;
        Ok(())
    }

    pub fn upsert_booking(&self, booking: &Booking) -> Result<(), EntityError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO bookings (id, route_id, stop_number, client_name, address, latitude, longitude, maps_url, scheduled_time, services, special_instructions) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                booking.id,
                booking.route_id,
                booking.stop_number,
                booking.client_name,
                booking.address,
                booking.latitude,
                booking.longitude,
                booking.maps_url,
                booking.scheduled_time,
                booking.services,
                booking.special_instructions,
            ],
        )
        .map_err(|e| EntityError::Database(e.to_string()))?;
        Ok(())
    }

    fn row_to_route(row: &rusqlite::Row) -> rusqlite::Result<Route> {
        Ok(Route {
            id: row.get(0)?,
            name: row.get(1)?,
            code: row.get(2)?,
            date: row.get(3)?,
            planned_start_time: row.get(4)?,
            planned_end_time: row.get(5)?,
            total_stops: row.get(6)?,
            total_distance_km: row.get(7)?,
            total_duration_minutes: row.get(8)?,
            vehicle_id: row.get(9)?,
            driver_id: row.get(10)?,
        })
    }

    fn row_to_driver(row: &rusqlite::Row) -> rusqlite::Result<Driver> {
        let preferred: Option<String> = row.get(5)?;
        let status: String = row.get(7)?;

        Ok(Driver {
            id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            email: row.get(3)?,
            telegram_chat_id: row.get(4)?,
            // Unknown channel names are treated as "no preference"
            preferred_channel: preferred.as_deref().and_then(ChannelType::parse),
            fallback_enabled: row.get(6)?,
            status: DriverStatus::parse(&status).unwrap_or(DriverStatus::Active),
        })
    }

    fn row_to_vehicle(row: &rusqlite::Row) -> rusqlite::Result<Vehicle> {
        Ok(Vehicle {
            id: row.get(0)?,
            name: row.get(1)?,
            license_plate: row.get(2)?,
            make: row.get(3)?,
            model: row.get(4)?,
        })
    }

    fn row_to_booking(row: &rusqlite::Row) -> rusqlite::Result<Booking> {
        Ok(Booking {
            id: row.get(0)?,
            route_id: row.get(1)?,
            stop_number: row.get(2)?,
            client_name: row.get(3)?,
            address: row.get(4)?,
            latitude: row.get(5)?,
            longitude: row.get(6)?,
            maps_url: row.get(7)?,
            scheduled_time: row.get(8)?,
            services: row.get(9)?,
            special_instructions: row.get(10)?,
        })
    }
}

impl EntityStore for SqliteEntityStore {
    fn get_route(&self, id: &str) -> Result<Option<Route>, EntityError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, name, code, date, planned_start_time, planned_end_time, total_stops, total_distance_km, total_duration_minutes, vehicle_id, driver_id FROM routes WHERE id = ?",
            params![id],
            Self::row_to_route,
        )
        .optional()
        .map_err(|e| EntityError::Database(e.to_string()))
    }

    fn get_driver(&self, id: &str) -> Result<Option<Driver>, EntityError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, first_name, last_name, email, telegram_chat_id, preferred_channel, fallback_enabled, status FROM drivers WHERE id = ?",
            params![id],
            Self::row_to_driver,
        )
        .optional()
        .map_err(|e| EntityError::Database(e.to_string()))
    }

    fn get_vehicle(&self, id: &str) -> Result<Option<Vehicle>, EntityError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, name, license_plate, make, model FROM vehicles WHERE id = ?",
            params![id],
            Self::row_to_vehicle,
        )
        .optional()
        .map_err(|e| EntityError::Database(e.to_string()))
    }

    fn get_bookings_for_route(&self, route_id: &str) -> Result<Vec<Booking>, EntityError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, route_id, stop_number, client_name, address, latitude, longitude, maps_url, scheduled_time, services, special_instructions FROM bookings WHERE route_id = ? ORDER BY stop_number ASC",
            )
            .map_err(|e| EntityError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![route_id], Self::row_to_booking)
            .map_err(|e| EntityError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| EntityError::Database(e.to_string()))
    }

    fn link_telegram_chat(&self, driver_id: &str, chat_id: &str) -> Result<bool, EntityError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                "UPDATE drivers SET telegram_chat_id = ? WHERE id = ?",
                params![chat_id, driver_id],
            )
            .map_err(|e| EntityError::Database(e.to_string()))?;
        Ok(updated > 0)
    }
}
