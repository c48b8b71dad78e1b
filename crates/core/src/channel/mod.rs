//! Delivery channels: the adapter contract, the registry and the concrete
//! Telegram and email adapters.

mod email;
mod registry;
mod telegram;
mod traits;
mod types;

pub use email::EmailAdapter;
pub use registry::AdapterRegistry;
pub use telegram::TelegramAdapter;
pub use traits::{ChannelAdapter, ChannelError, TelegramBot};
pub use types::{ChannelResult, ChannelType, DispatchContext, HealthStatus};
