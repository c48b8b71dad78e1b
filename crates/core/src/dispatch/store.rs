//! Dispatch persistence contract.

use thiserror::Error;

use super::{
    ChannelDispatch, ChannelDispatchUpdate, Dispatch, DispatchFilter, DispatchStatus,
    DispatchWithChannels, NewDispatch,
};
use crate::channel::ChannelType;

#[derive(Debug, Error)]
pub enum DispatchStoreError {
    #[error("Dispatch not found: {0}")]
    DispatchNotFound(String),

    #[error("Channel dispatch not found: {0}")]
    ChannelDispatchNotFound(String),

    #[error("Invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    #[error("Database error: {0}")]
    Database(String),
}

/// Storage for dispatches and their channel attempts.
///
/// Implementations enforce the status state machines; callers never write a
/// status backwards or give a channel attempt a second terminal status.
pub trait DispatchStore: Send + Sync {
    /// Persist a new dispatch in `pending`.
    fn create_dispatch(&self, request: NewDispatch) -> Result<Dispatch, DispatchStoreError>;

    fn update_dispatch_status(
        &self,
        dispatch_id: &str,
        status: DispatchStatus,
    ) -> Result<Dispatch, DispatchStoreError>;

    /// Persist a new channel attempt in `pending`.
    fn create_channel_dispatch(
        &self,
        dispatch_id: &str,
        channel: ChannelType,
    ) -> Result<ChannelDispatch, DispatchStoreError>;

    fn update_channel_dispatch(
        &self,
        channel_dispatch_id: &str,
        update: ChannelDispatchUpdate,
    ) -> Result<ChannelDispatch, DispatchStoreError>;

    fn get_dispatch(&self, dispatch_id: &str) -> Result<Option<Dispatch>, DispatchStoreError>;

    fn get_dispatch_with_channels(
        &self,
        dispatch_id: &str,
    ) -> Result<Option<DispatchWithChannels>, DispatchStoreError>;

    /// Record the driver's acknowledgement on the delivered `channel` attempt.
    ///
    /// Returns `Ok(None)` when no attempt on that channel was delivered. A
    /// repeated acknowledgement keeps the first timestamp.
    fn acknowledge_channel(
        &self,
        dispatch_id: &str,
        channel: ChannelType,
    ) -> Result<Option<ChannelDispatch>, DispatchStoreError>;

    /// Newest first.
    fn list_dispatches(&self, filter: &DispatchFilter) -> Result<Vec<Dispatch>, DispatchStoreError>;

    fn count_dispatches(&self, filter: &DispatchFilter) -> Result<i64, DispatchStoreError>;

    /// Cheap readiness check.
    fn ping(&self) -> Result<(), DispatchStoreError>;
}
