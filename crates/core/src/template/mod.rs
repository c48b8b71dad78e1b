//! Dispatch message templates.

mod context;
mod render;

pub use context::{BookingView, DriverView, RouteView, TemplateContext, VehicleView};
pub use render::{email_subject, render_for_channel};
