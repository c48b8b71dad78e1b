//! Types for the dispatch orchestrator.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::channel::{ChannelType, HealthStatus};
use crate::dispatch::{DispatchStatus, Metadata};

/// Which fleet entity a lookup was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Route,
    Driver,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Route => f.write_str("Route"),
            EntityKind::Driver => f.write_str("Driver"),
        }
    }
}

/// Errors that can occur while accepting a dispatch.
///
/// Channel failures never appear here; they are recorded on the dispatch.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The referenced route or driver does not exist.
    #[error("{entity} not found: {id}")]
    EntityNotFound { entity: EntityKind, id: String },

    /// Dispatch store error.
    #[error("dispatch store error: {0}")]
    Store(#[from] crate::dispatch::DispatchStoreError),

    /// Entity store error.
    #[error("entity store error: {0}")]
    Entities(#[from] crate::entities::EntityError),
}

/// A request to notify a driver about a route.
///
/// Assumed structurally valid: the HTTP layer rejects malformed input first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub route_id: String,
    pub driver_id: String,
    /// Restrict the candidate channels. `None` means every registered channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<ChannelType>>,
    /// Send over every capable channel instead of the single best one.
    #[serde(default)]
    pub multi_channel: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl DispatchRequest {
    pub fn new(route_id: impl Into<String>, driver_id: impl Into<String>) -> Self {
        Self {
            route_id: route_id.into(),
            driver_id: driver_id.into(),
            ..Default::default()
        }
    }

    pub fn with_channels(mut self, channels: Vec<ChannelType>) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn with_multi_channel(mut self, multi_channel: bool) -> Self {
        self.multi_channel = multi_channel;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Immediate acknowledgement of an accepted dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub dispatch_id: String,
    /// Always `pending` at the moment of return.
    pub status: DispatchStatus,
    pub requested_channels: Vec<ChannelType>,
}

/// What happened to one batch item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchItemOutcome {
    Dispatched { dispatch_id: String },
    Failed { error: String },
}

/// Result for the batch item at `index`.
///
/// Serialized as `{index, success, dispatch_id}` or `{index, success, error}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItemResult {
    pub index: usize,
    pub outcome: BatchItemOutcome,
}

impl BatchItemResult {
    pub fn dispatched(index: usize, dispatch_id: impl Into<String>) -> Self {
        Self {
            index,
            outcome: BatchItemOutcome::Dispatched {
                dispatch_id: dispatch_id.into(),
            },
        }
    }

    pub fn failed(index: usize, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            index,
            outcome: BatchItemOutcome::Failed {
                error: if error.trim().is_empty() {
                    "Unknown error occurred".to_string()
                } else {
                    error
                },
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BatchItemOutcome::Dispatched { .. })
    }

    pub fn dispatch_id(&self) -> Option<&str> {
        match self.outcome {
            BatchItemOutcome::Dispatched { ref dispatch_id } => Some(dispatch_id),
            BatchItemOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self.outcome {
            BatchItemOutcome::Failed { ref error } => Some(error),
            BatchItemOutcome::Dispatched { .. } => None,
        }
    }
}

impl Serialize for BatchItemResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            index: usize,
            success: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            dispatch_id: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            error: Option<&'a str>,
        }

        Wire {
            index: self.index,
            success: self.is_success(),
            dispatch_id: self.dispatch_id(),
            error: self.error(),
        }
        .serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Outcome of a batch: one result per input item, ordered by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub results: Vec<BatchItemResult>,
    pub summary: BatchSummary,
}

impl BatchResult {
    pub fn from_results(mut results: Vec<BatchItemResult>) -> Self {
        results.sort_by_key(|r| r.index);
        let successful = results.iter().filter(|r| r.is_success()).count();
        let summary = BatchSummary {
            total: results.len(),
            successful,
            failed: results.len() - successful,
        };
        Self { results, summary }
    }
}

/// Health of one registered channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelHealth {
    pub channel: ChannelType,
    #[serde(flatten)]
    pub status: HealthStatus,
}

/// Readiness of the orchestrator's collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrchestratorHealth {
    pub store: HealthStatus,
    pub channels: Vec<ChannelHealth>,
}

impl OrchestratorHealth {
    pub fn channel(&self, channel: ChannelType) -> Option<&HealthStatus> {
        self.channels
            .iter()
            .find(|c| c.channel == channel)
            .map(|c| &c.status)
    }
}
