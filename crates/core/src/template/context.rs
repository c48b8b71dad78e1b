use chrono::{DateTime, Utc};

use crate::entities::{Booking, Driver, Route, Vehicle};

/// Flattened view of a dispatch used by the message renderers.
///
/// Every optional entity field is resolved to a string here so the renderers
/// never have to deal with missing values.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateContext {
    pub route: RouteView,
    pub driver: DriverView,
    pub vehicle: Option<VehicleView>,
    pub bookings: Vec<BookingView>,
    pub route_maps_url: String,
    pub dispatched_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteView {
    pub name: String,
    pub code: String,
    pub date: String,
    pub planned_start_time: String,
    pub planned_end_time: String,
    pub total_stops: u32,
    pub total_distance_km: f64,
    pub total_duration_minutes: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriverView {
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleView {
    pub name: String,
    pub license_plate: String,
    pub make: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingView {
    pub stop_number: u32,
    pub client_name: String,
    pub address: String,
    pub scheduled_time: String,
    pub services: String,
    pub special_instructions: String,
    pub maps_url: String,
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

impl TemplateContext {
    pub fn build(
        route: &Route,
        driver: &Driver,
        vehicle: Option<&Vehicle>,
        bookings: &[Booking],
        app_base_url: &str,
        dispatched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            route: RouteView {
                name: route.name.clone(),
                code: text(&route.code),
                date: route.date.clone(),
                planned_start_time: text(&route.planned_start_time),
                planned_end_time: text(&route.planned_end_time),
                total_stops: route.total_stops,
                total_distance_km: route.total_distance_km.unwrap_or_default(),
                total_duration_minutes: route.total_duration_minutes.unwrap_or_default(),
            },
            driver: DriverView {
                first_name: driver.first_name.clone(),
                last_name: driver.last_name.clone(),
                full_name: driver.full_name(),
            },
            vehicle: vehicle.map(|v| VehicleView {
                name: v.name.clone(),
                license_plate: text(&v.license_plate),
                make: text(&v.make),
                model: text(&v.model),
            }),
            bookings: bookings
                .iter()
                .map(|b| BookingView {
                    stop_number: b.stop_number,
                    client_name: b.client_name.clone(),
                    address: b.address.clone(),
                    scheduled_time: text(&b.scheduled_time),
                    services: text(&b.services),
                    special_instructions: text(&b.special_instructions),
                    maps_url: text(&b.maps_url),
                })
                .collect(),
            route_maps_url: format!(
                "{}/routes.html?routeId={}",
                app_base_url.trim_end_matches('/'),
                route.id
            ),
            dispatched_at: dispatched_at.to_rfc3339(),
        }
    }
}
