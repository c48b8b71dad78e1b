//! Channel selection.
//!
//! Pure functions over the registry and the driver record. Nothing here
//! performs I/O; adapters are only asked `can_send`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error};

use super::DispatchRequest;
use crate::channel::{AdapterRegistry, ChannelAdapter, ChannelType};
use crate::entities::Driver;

/// Ask the adapter whether it can reach the driver. A panicking check
/// counts as "cannot".
fn is_capable(adapter: &Arc<dyn ChannelAdapter>, driver: &Driver) -> bool {
    match catch_unwind(AssertUnwindSafe(|| adapter.can_send(driver))) {
        Ok(capable) => capable,
        Err(_) => {
            error!(
                driver_id = %driver.id,
                channel = %adapter.channel_type(),
                "Channel capability check panicked, treating channel as unavailable"
            );
            false
        }
    }
}

/// Compute the committed channel list for a dispatch.
///
/// Candidates are the explicitly requested channels, or every registered one.
/// Only candidates whose adapter can reach the driver survive, kept in
/// registration order. Multi-channel requests commit to all survivors; others
/// commit to the driver's preferred channel if it survived, else the first
/// survivor. An empty result means there is nothing to attempt.
pub fn select_channels(
    request: &DispatchRequest,
    driver: &Driver,
    registry: &AdapterRegistry,
) -> Vec<ChannelType> {
    let survivors: Vec<ChannelType> = registry
        .iter()
        .filter(|adapter| {
            request
                .channels
                .as_ref()
                .map_or(true, |wanted| wanted.contains(&adapter.channel_type()))
        })
        .filter(|adapter| is_capable(adapter, driver))
        .map(|adapter| adapter.channel_type())
        .collect();

    if request.multi_channel {
        debug!(driver_id = %driver.id, channels = ?survivors, "Selected all capable channels");
        return survivors;
    }

    let chosen = driver
        .preferred_channel
        .filter(|preferred| survivors.contains(preferred))
        .or_else(|| survivors.first().copied());

    debug!(
        driver_id = %driver.id,
        preferred = ?driver.preferred_channel,
        channel = ?chosen,
        "Selected single channel"
    );

    chosen.into_iter().collect()
}

/// Next registered channel that can reach the driver and has not been tried.
pub fn fallback_channel(
    driver: &Driver,
    registry: &AdapterRegistry,
    attempted: &[ChannelType],
) -> Option<ChannelType> {
    registry
        .iter()
        .map(|adapter| (adapter.channel_type(), adapter))
        .find(|(channel, adapter)| !attempted.contains(channel) && is_capable(adapter, driver))
        .map(|(channel, _)| channel)
}
