//! Mock channel adapter for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::channel::{
    ChannelAdapter, ChannelError, ChannelResult, ChannelType, DispatchContext, HealthStatus,
};
use crate::entities::Driver;

/// A recorded send for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSend {
    pub dispatch_id: String,
    pub driver_id: String,
    /// The rendered message the adapter received.
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// What the mock does when asked to send.
#[derive(Debug, Clone)]
pub enum MockSendBehavior {
    /// Report delivery with this provider message id.
    Deliver(Option<String>),
    /// Report a failed result with this error.
    Fail(String),
    /// Return `ChannelError::Transport` with this text.
    Error(String),
    /// Panic with this message.
    Panic(String),
}

/// Mock implementation of the ChannelAdapter trait.
///
/// Delivers successfully by default. Like the real adapters, telegram and
/// email mocks only reach drivers with a chat id or address. Behaviour,
/// delay, reachability and health can be configured up front or changed
/// while a test runs.
///
/// # Example
///
/// ```rust,ignore
/// let telegram = Arc::new(MockChannelAdapter::new(ChannelType::Telegram)
///     .with_behavior(MockSendBehavior::Error("Connection refused".into())));
///
/// // ... dispatch ...
///
/// assert_eq!(telegram.recorded_sends().await.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockChannelAdapter {
    channel: ChannelType,
    can_send: AtomicBool,
    panic_on_can_send: AtomicBool,
    behavior: Arc<RwLock<MockSendBehavior>>,
    delay: Arc<RwLock<Option<Duration>>>,
    health: Arc<RwLock<HealthStatus>>,
    sends: Arc<RwLock<Vec<RecordedSend>>>,
}

impl MockChannelAdapter {
    pub fn new(channel: ChannelType) -> Self {
        Self {
            channel,
            can_send: AtomicBool::new(true),
            panic_on_can_send: AtomicBool::new(false),
            behavior: Arc::new(RwLock::new(MockSendBehavior::Deliver(Some(format!(
                "{}-msg",
                channel
            ))))),
            delay: Arc::new(RwLock::new(None)),
            health: Arc::new(RwLock::new(HealthStatus::healthy(format!(
                "{} mock ready",
                channel
            )))),
            sends: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_can_send(self, can_send: bool) -> Self {
        self.can_send.store(can_send, Ordering::SeqCst);
        self
    }

    /// Make every capability check panic.
    pub fn with_panicking_can_send(self) -> Self {
        self.panic_on_can_send.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_behavior(mut self, behavior: MockSendBehavior) -> Self {
        self.behavior = Arc::new(RwLock::new(behavior));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Arc::new(RwLock::new(Some(delay)));
        self
    }

    pub fn with_health(mut self, health: HealthStatus) -> Self {
        self.health = Arc::new(RwLock::new(health));
        self
    }

    pub fn set_can_send(&self, can_send: bool) {
        self.can_send.store(can_send, Ordering::SeqCst);
    }

    pub async fn set_behavior(&self, behavior: MockSendBehavior) {
        *self.behavior.write().await = behavior;
    }

    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write().await = delay;
    }

    pub async fn set_health(&self, health: HealthStatus) {
        *self.health.write().await = health;
    }

    /// All sends so far, in call order.
    pub async fn recorded_sends(&self) -> Vec<RecordedSend> {
        self.sends.read().await.clone()
    }

    pub async fn send_count(&self) -> usize {
        self.sends.read().await.len()
    }
}

#[async_trait]
impl ChannelAdapter for MockChannelAdapter {
    fn channel_type(&self) -> ChannelType {
        self.channel
    }

    fn can_send(&self, driver: &Driver) -> bool {
        if self.panic_on_can_send.load(Ordering::SeqCst) {
            panic!("{} capability check exploded for {}", self.channel, driver.id);
        }
        let reachable = match self.channel {
            ChannelType::Telegram => driver.telegram_chat().is_some(),
            ChannelType::Email => driver.email_address().is_some(),
            ChannelType::Sms | ChannelType::Push => true,
        };
        reachable && self.can_send.load(Ordering::SeqCst)
    }

    async fn send(&self, context: &DispatchContext) -> Result<ChannelResult, ChannelError> {
        self.sends.write().await.push(RecordedSend {
            dispatch_id: context.dispatch_id.clone(),
            driver_id: context.driver.id.clone(),
            message: context.message.clone(),
            timestamp: Utc::now(),
        });

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let behavior = self.behavior.read().await.clone();
        match behavior {
            MockSendBehavior::Deliver(id) => Ok(ChannelResult::delivered(id)),
            MockSendBehavior::Fail(error) => Ok(ChannelResult::failed(error)),
            MockSendBehavior::Error(error) => Err(ChannelError::Transport(error)),
            MockSendBehavior::Panic(message) => panic!("{}", message),
        }
    }

    async fn health_check(&self) -> HealthStatus {
        self.health.read().await.clone()
    }
}
