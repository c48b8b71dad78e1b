//! Background delivery of one dispatch.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use tracing::{error, info, warn};

use super::aggregator::aggregate_status;
use super::selector::fallback_channel;
use super::OrchestratorConfig;
use crate::channel::{AdapterRegistry, ChannelResult, ChannelType, DispatchContext};
use crate::dispatch::{
    ChannelDispatchStatus, ChannelDispatchUpdate, Dispatch, DispatchStatus, DispatchStore,
};
use crate::entities::{Booking, Driver, EntityStore, Route, Vehicle};
use crate::metrics;
use crate::template::{render_for_channel, TemplateContext};

/// Everything a delivery needs, shared by all background tasks.
pub(super) struct DeliveryPipeline {
    pub(super) config: OrchestratorConfig,
    pub(super) store: Arc<dyn DispatchStore>,
    pub(super) entities: Arc<dyn EntityStore>,
    pub(super) registry: AdapterRegistry,
}

/// Inputs shared by every channel attempt of one dispatch.
struct Delivery {
    dispatch_id: String,
    route: Route,
    driver: Driver,
    vehicle: Option<Vehicle>,
    bookings: Vec<Booking>,
    template: TemplateContext,
}

impl DeliveryPipeline {
    /// Drive a freshly created dispatch to its terminal status.
    ///
    /// Never fails: channel problems become failed attempts and persistence
    /// problems are logged.
    pub(super) async fn run(
        self: Arc<Self>,
        dispatch: Dispatch,
        route: Route,
        driver: Driver,
        multi_channel: bool,
    ) {
        if dispatch.requested_channels.is_empty() {
            warn!(dispatch_id = %dispatch.id, driver_id = %driver.id, "No channel can reach driver");
            self.finish(&dispatch.id, DispatchStatus::Failed);
            return;
        }

        if let Err(e) = self
            .store
            .update_dispatch_status(&dispatch.id, DispatchStatus::Sending)
        {
            error!(dispatch_id = %dispatch.id, "Failed to mark dispatch as sending: {}", e);
            return;
        }

        let (vehicle, bookings) = self.load_context(&route);
        let template = TemplateContext::build(
            &route,
            &driver,
            vehicle.as_ref(),
            &bookings,
            &self.config.app_base_url,
            Utc::now(),
        );
        let delivery = Arc::new(Delivery {
            dispatch_id: dispatch.id.clone(),
            route,
            driver,
            vehicle,
            bookings,
            template,
        });

        let attempts: Vec<_> = dispatch
            .requested_channels
            .iter()
            .map(|&channel| {
                let pipeline = Arc::clone(&self);
                let delivery = Arc::clone(&delivery);
                tokio::spawn(async move { pipeline.attempt(&delivery, channel).await })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(attempts.len());
        for (channel, joined) in dispatch
            .requested_channels
            .iter()
            .zip(futures::future::join_all(attempts).await)
        {
            outcomes.push(joined.unwrap_or_else(|e| {
                error!(dispatch_id = %dispatch.id, channel = %channel, "Channel task aborted: {}", e);
                let reason = if e.is_panic() {
                    panic_message(e.into_panic().as_ref(), *channel)
                } else {
                    format!("{} delivery task was cancelled", channel)
                };
                self.close_abandoned_rows(&dispatch.id, *channel, &reason);
                ChannelDispatchStatus::Failed
            }));
        }

        if self.should_fall_back(multi_channel, &delivery.driver, &outcomes) {
            if let Some(channel) =
                fallback_channel(&delivery.driver, &self.registry, &dispatch.requested_channels)
            {
                info!(dispatch_id = %dispatch.id, channel = %channel, "Attempting fallback channel");
                metrics::FALLBACK_ATTEMPTS
                    .with_label_values(&[channel.as_str()])
                    .inc();
                outcomes.push(self.attempt(&delivery, channel).await);
            }
        }

        self.finish(&dispatch.id, aggregate_status(&outcomes));
    }

    fn should_fall_back(
        &self,
        multi_channel: bool,
        driver: &Driver,
        outcomes: &[ChannelDispatchStatus],
    ) -> bool {
        self.config.fallback_on_failure
            && !multi_channel
            && driver.fallback_enabled
            && outcomes.iter().all(|s| *s == ChannelDispatchStatus::Failed)
    }

    /// Vehicle and bookings only enrich the message; missing data is not fatal.
    fn load_context(&self, route: &Route) -> (Option<Vehicle>, Vec<Booking>) {
        let vehicle = match route.vehicle_id.as_deref() {
            Some(id) => self.entities.get_vehicle(id).unwrap_or_else(|e| {
                warn!(route_id = %route.id, vehicle_id = %id, "Failed to load vehicle: {}", e);
                None
            }),
            None => None,
        };

        let bookings = self
            .entities
            .get_bookings_for_route(&route.id)
            .unwrap_or_else(|e| {
                warn!(route_id = %route.id, "Failed to load bookings: {}", e);
                Vec::new()
            });

        (vehicle, bookings)
    }

    /// One channel attempt: create the row, send, record exactly one terminal update.
    async fn attempt(&self, delivery: &Delivery, channel: ChannelType) -> ChannelDispatchStatus {
        let dispatch_id = delivery.dispatch_id.as_str();

        let row = match self.store.create_channel_dispatch(dispatch_id, channel) {
            Ok(row) => row,
            Err(e) => {
                error!(dispatch_id, channel = %channel, "Failed to create channel dispatch: {}", e);
                metrics::CHANNEL_ATTEMPTS
                    .with_label_values(&[channel.as_str(), "error"])
                    .inc();
                return ChannelDispatchStatus::Failed;
            }
        };

        if let Err(e) = self
            .store
            .update_channel_dispatch(&row.id, ChannelDispatchUpdate::sending())
        {
            warn!(dispatch_id, channel = %channel, "Failed to mark channel dispatch as sending: {}", e);
        }

        let (result, outcome_label) = self.send(delivery, channel).await;

        let update = match result {
            ChannelResult::Delivered {
                provider_message_id,
            } => ChannelDispatchUpdate::delivered(provider_message_id),
            ChannelResult::Failed { error } => {
                warn!(dispatch_id, channel = %channel, "Channel delivery failed: {}", error);
                ChannelDispatchUpdate::failed(error)
            }
        };
        let status = update.status;

        metrics::CHANNEL_ATTEMPTS
            .with_label_values(&[channel.as_str(), outcome_label])
            .inc();

        match self.store.update_channel_dispatch(&row.id, update) {
            Ok(_) => status,
            Err(e) => {
                error!(dispatch_id, channel = %channel, "Failed to record channel outcome: {}", e);
                ChannelDispatchStatus::Failed
            }
        }
    }

    /// Invoke the adapter with timeout and panic containment.
    async fn send(&self, delivery: &Delivery, channel: ChannelType) -> (ChannelResult, &'static str) {
        let Some(adapter) = self.registry.get(channel) else {
            return (
                ChannelResult::failed(format!("No adapter registered for channel: {}", channel)),
                "error",
            );
        };

        let context = DispatchContext {
            dispatch_id: delivery.dispatch_id.clone(),
            route: delivery.route.clone(),
            driver: delivery.driver.clone(),
            vehicle: delivery.vehicle.clone(),
            bookings: delivery.bookings.clone(),
            message: render_for_channel(channel, &delivery.template),
        };

        let timeout_ms = self.config.send_timeout_ms;
        let started = Instant::now();
        let sent = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            AssertUnwindSafe(adapter.send(&context)).catch_unwind(),
        )
        .await;
        metrics::CHANNEL_SEND_DURATION
            .with_label_values(&[channel.as_str()])
            .observe(started.elapsed().as_secs_f64());

        match sent {
            Ok(Ok(Ok(result))) => {
                let result = result.normalized();
                let label = if result.is_delivered() { "delivered" } else { "failed" };
                (result, label)
            }
            Ok(Ok(Err(e))) => (ChannelResult::failed(e.to_string()), "error"),
            Ok(Err(panic)) => {
                error!(dispatch_id = %delivery.dispatch_id, channel = %channel, "Channel adapter panicked");
                (
                    ChannelResult::failed(panic_message(panic.as_ref(), channel)),
                    "panic",
                )
            }
            Err(_) => (
                ChannelResult::failed(format!(
                    "{} send timed out after {}ms",
                    channel, timeout_ms
                )),
                "timeout",
            ),
        }
    }

    /// A channel task that died mid-attempt may leave its row open. Close
    /// every non-terminal row of that channel as failed.
    fn close_abandoned_rows(&self, dispatch_id: &str, channel: ChannelType, reason: &str) {
        let rows = match self.store.get_dispatch_with_channels(dispatch_id) {
            Ok(Some(detail)) => detail.channel_dispatches,
            Ok(None) => return,
            Err(e) => {
                error!(dispatch_id, channel = %channel, "Failed to load abandoned channel rows: {}", e);
                return;
            }
        };

        for row in rows
            .into_iter()
            .filter(|row| row.channel == channel && !row.status.is_terminal())
        {
            if let Err(e) = self
                .store
                .update_channel_dispatch(&row.id, ChannelDispatchUpdate::failed(reason))
            {
                error!(dispatch_id, channel = %channel, "Failed to close abandoned channel row: {}", e);
            }
        }
    }

    fn finish(&self, dispatch_id: &str, status: DispatchStatus) {
        match self.store.update_dispatch_status(dispatch_id, status) {
            Ok(_) => {
                metrics::DISPATCHES_FINISHED
                    .with_label_values(&[status.as_str()])
                    .inc();
                info!(dispatch_id, status = status.as_str(), "Dispatch finished");
            }
            Err(e) => error!(dispatch_id, "Failed to record final dispatch status: {}", e),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send), channel: ChannelType) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        format!("{} adapter panicked", channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_extracts_payload() {
        let payload: Box<dyn Any + Send> = Box::new("adapter exploded");
        assert_eq!(panic_message(payload.as_ref(), ChannelType::Sms), "adapter exploded");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(payload.as_ref(), ChannelType::Sms), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref(), ChannelType::Sms), "sms adapter panicked");
    }
}
