//! Dispatch store wrapper that injects persistence faults.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::channel::ChannelType;
use crate::dispatch::{
    ChannelDispatch, ChannelDispatchStatus, ChannelDispatchUpdate, Dispatch, DispatchFilter, DispatchStatus,
    DispatchStore, DispatchStoreError, DispatchWithChannels, NewDispatch,
};

/// Which store operation should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFault {
    CreateDispatch,
    UpdateDispatchStatus,
    CreateChannelDispatch,
    UpdateChannelDispatch,
    /// Panic, rather than fail, when a channel row is marked as sending.
    PanicMarkingSending,
    Ping,
}

/// Delegates to an inner store, failing the operations switched on.
///
/// Reads other than `ping` always pass through so tests can inspect what
/// was committed before the fault.
pub struct FailingDispatchStore {
    inner: Arc<dyn DispatchStore>,
    create_dispatch: AtomicBool,
    update_dispatch_status: AtomicBool,
    create_channel_dispatch: AtomicBool,
    update_channel_dispatch: AtomicBool,
    panic_marking_sending: AtomicBool,
    ping: AtomicBool,
}

impl FailingDispatchStore {
    pub fn new(inner: Arc<dyn DispatchStore>) -> Self {
        Self {
            inner,
            create_dispatch: AtomicBool::new(false),
            update_dispatch_status: AtomicBool::new(false),
            create_channel_dispatch: AtomicBool::new(false),
            update_channel_dispatch: AtomicBool::new(false),
            panic_marking_sending: AtomicBool::new(false),
            ping: AtomicBool::new(false),
        }
    }

    pub fn fail(&self, fault: StoreFault) {
        self.flag(fault).store(true, Ordering::SeqCst);
    }

    pub fn recover(&self, fault: StoreFault) {
        self.flag(fault).store(false, Ordering::SeqCst);
    }

    fn flag(&self, fault: StoreFault) -> &AtomicBool {
        match fault {
            StoreFault::CreateDispatch => &self.create_dispatch,
            StoreFault::UpdateDispatchStatus => &self.update_dispatch_status,
            StoreFault::CreateChannelDispatch => &self.create_channel_dispatch,
            StoreFault::UpdateChannelDispatch => &self.update_channel_dispatch,
            StoreFault::PanicMarkingSending => &self.panic_marking_sending,
            StoreFault::Ping => &self.ping,
        }
    }

    fn check(&self, fault: StoreFault) -> Result<(), DispatchStoreError> {
        if self.flag(fault).load(Ordering::SeqCst) {
            return Err(DispatchStoreError::Database(format!(
                "injected {:?} failure",
                fault
            )));
        }
        Ok(())
    }
}

impl DispatchStore for FailingDispatchStore {
    fn create_dispatch(&self, request: NewDispatch) -> Result<Dispatch, DispatchStoreError> {
        self.check(StoreFault::CreateDispatch)?;
        self.inner.create_dispatch(request)
    }

    fn update_dispatch_status(
        &self,
        dispatch_id: &str,
        status: DispatchStatus,
    ) -> Result<Dispatch, DispatchStoreError> {
        self.check(StoreFault::UpdateDispatchStatus)?;
        self.inner.update_dispatch_status(dispatch_id, status)
    }

    fn create_channel_dispatch(
        &self,
        dispatch_id: &str,
        channel: ChannelType,
    ) -> Result<ChannelDispatch, DispatchStoreError> {
        self.check(StoreFault::CreateChannelDispatch)?;
        self.inner.create_channel_dispatch(dispatch_id, channel)
    }

    fn update_channel_dispatch(
        &self,
        channel_dispatch_id: &str,
        update: ChannelDispatchUpdate,
    ) -> Result<ChannelDispatch, DispatchStoreError> {
        self.check(StoreFault::UpdateChannelDispatch)?;
        if update.status == ChannelDispatchStatus::Sending
            && self.panic_marking_sending.load(Ordering::SeqCst)
        {
            panic!("injected panic marking {} as sending", channel_dispatch_id);
        }
        self.inner.update_channel_dispatch(channel_dispatch_id, update)
    }

    fn get_dispatch(&self, dispatch_id: &str) -> Result<Option<Dispatch>, DispatchStoreError> {
        self.inner.get_dispatch(dispatch_id)
    }

    fn get_dispatch_with_channels(
        &self,
        dispatch_id: &str,
    ) -> Result<Option<DispatchWithChannels>, DispatchStoreError> {
        self.inner.get_dispatch_with_channels(dispatch_id)
    }

    fn acknowledge_channel(
        &self,
        dispatch_id: &str,
        channel: ChannelType,
    ) -> Result<Option<ChannelDispatch>, DispatchStoreError> {
        self.check(StoreFault::UpdateChannelDispatch)?;
        self.inner.acknowledge_channel(dispatch_id, channel)
    }

    fn list_dispatches(&self, filter: &DispatchFilter) -> Result<Vec<Dispatch>, DispatchStoreError> {
        self.inner.list_dispatches(filter)
    }

    fn count_dispatches(&self, filter: &DispatchFilter) -> Result<i64, DispatchStoreError> {
        self.inner.count_dispatches(filter)
    }

    fn ping(&self) -> Result<(), DispatchStoreError> {
        self.check(StoreFault::Ping)?;
        self.inner.ping()
    }
}
