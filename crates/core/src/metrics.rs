//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Dispatch lifecycle (accepted, finished by status, in flight)
//! - Channel attempts (outcome and send duration per channel)
//! - Batch items
//! - Telegram bot updates

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Dispatch Metrics
// =============================================================================

/// Dispatches accepted and persisted.
pub static DISPATCHES_CREATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dispatch_dispatches_created_total", "Total dispatches accepted"),
        &["mode"], // "single", "multi"
    )
    .unwrap()
});

/// Dispatches that reached a terminal status.
pub static DISPATCHES_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dispatch_dispatches_finished_total",
            "Total dispatches that reached a terminal status",
        ),
        &["status"], // "delivered", "partial", "failed"
    )
    .unwrap()
});

/// Background deliveries currently running.
pub static DELIVERIES_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "dispatch_deliveries_in_flight",
        "Dispatches whose background delivery has not finished",
    )
    .unwrap()
});

// =============================================================================
// Channel Metrics
// =============================================================================

/// Channel attempts by channel and outcome.
pub static CHANNEL_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dispatch_channel_attempts_total", "Total channel delivery attempts"),
        &["channel", "outcome"], // outcome: "delivered", "failed", "error", "panic", "timeout"
    )
    .unwrap()
});

/// Adapter send duration in seconds.
pub static CHANNEL_SEND_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "dispatch_channel_send_duration_seconds",
            "Duration of adapter send calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["channel"],
    )
    .unwrap()
});

/// Fallback attempts by channel tried.
pub static FALLBACK_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dispatch_fallback_attempts_total", "Total fallback channel attempts"),
        &["channel"],
    )
    .unwrap()
});

// =============================================================================
// Batch Metrics
// =============================================================================

/// Batch items by outcome.
pub static BATCH_ITEMS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dispatch_batch_items_total", "Total batch items processed"),
        &["result"], // "success", "failure"
    )
    .unwrap()
});

// =============================================================================
// Bot Metrics
// =============================================================================

/// Webhook updates by what the bot did with them.
pub static BOT_UPDATES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dispatch_bot_updates_total", "Total Telegram updates handled"),
        &["outcome"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(DISPATCHES_CREATED.clone()),
        Box::new(DISPATCHES_FINISHED.clone()),
        Box::new(DELIVERIES_IN_FLIGHT.clone()),
        Box::new(CHANNEL_ATTEMPTS.clone()),
        Box::new(CHANNEL_SEND_DURATION.clone()),
        Box::new(FALLBACK_ATTEMPTS.clone()),
        Box::new(BATCH_ITEMS.clone()),
        Box::new(BOT_UPDATES.clone()),
    ]
}
