//! Dispatch orchestration.
//!
//! Selects channels for a driver, persists the dispatch, and delivers it over
//! every committed channel concurrently in the background. Failures on one
//! channel never affect another.

mod aggregator;
mod config;
mod pipeline;
mod runner;
mod selector;
mod types;

pub use aggregator::aggregate_status;
pub use config::OrchestratorConfig;
pub use runner::DispatchOrchestrator;
pub use selector::{fallback_channel, select_channels};
pub use types::{
    BatchItemOutcome, BatchItemResult, BatchResult, BatchSummary, ChannelHealth, DispatchRequest,
    DispatchResult, EntityKind, OrchestratorError, OrchestratorHealth,
};
