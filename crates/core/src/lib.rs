pub mod auth;
pub mod bot;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod entities;
pub mod metrics;
pub mod orchestrator;
pub mod template;
pub mod testing;

pub use auth::{
    constant_time_eq, create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest,
    Authenticator, Identity, NoneAuthenticator,
};
pub use bot::{BotService, RegistrationError, RegistrationLink, Update, UpdateOutcome};
pub use channel::{
    AdapterRegistry, ChannelAdapter, ChannelError, ChannelResult, ChannelType, DispatchContext,
    EmailAdapter, HealthStatus, TelegramAdapter, TelegramBot,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthConfig, AuthMethod, Config,
    ConfigError, RateLimitConfig, SanitizedConfig,
};
pub use dispatch::{
    ChannelDispatch, ChannelDispatchStatus, Dispatch, DispatchFilter, DispatchStatus,
    DispatchStore, DispatchStoreError, DispatchWithChannels, SqliteDispatchStore,
};
pub use entities::{
    Booking, Driver, DriverStatus, EntityError, EntityStore, Route, SqliteEntityStore, Vehicle,
};
pub use orchestrator::{
    BatchItemResult, BatchResult, BatchSummary, DispatchOrchestrator, DispatchRequest,
    DispatchResult, OrchestratorConfig, OrchestratorError, OrchestratorHealth,
};
