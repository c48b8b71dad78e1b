use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dispatch_core::{
    create_authenticator, load_config, validate_config, AdapterRegistry, Authenticator,
    BotService, DispatchOrchestrator, DispatchStore, EmailAdapter, EntityStore,
    SqliteDispatchStore, SqliteEntityStore, TelegramAdapter,
};
use dispatch_server::{create_router, AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    let json = std::env::var("DISPATCH_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn run() -> Result<()> {
    init_logging();

    let config_path = std::env::var("DISPATCH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Auth method: {}", config.auth.method.as_str());
    info!("Database path: {:?}", config.database.path);

    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    let dispatch_store: Arc<dyn DispatchStore> = Arc::new(
        SqliteDispatchStore::new(&config.database.path)
            .context("Failed to create dispatch store")?,
    );
    let entity_store: Arc<dyn EntityStore> = Arc::new(
        SqliteEntityStore::new(&config.database.path).context("Failed to create entity store")?,
    );
    info!("Stores initialized");

    // Registration order is the channel tie-break order.
    let telegram = Arc::new(
        TelegramAdapter::new(config.telegram.as_ref())
            .context("Failed to create Telegram adapter")?,
    );
    if !telegram.is_configured() {
        warn!("Telegram is not configured; telegram deliveries will fail");
    }
    let email =
        EmailAdapter::new(config.email.as_ref()).context("Failed to create email adapter")?;
    if !email.is_configured() {
        warn!("Email is not configured; email deliveries will fail");
    }
    let registry = AdapterRegistry::new()
        .with(telegram.clone())
        .with(Arc::new(email));
    info!("Registered channels: {:?}", registry.channel_types());

    let bot = Arc::new(BotService::new(
        telegram,
        Arc::clone(&entity_store),
        Arc::clone(&dispatch_store),
    ));
    if config
        .telegram
        .as_ref()
        .and_then(|t| t.webhook_secret())
        .is_none()
    {
        warn!("No Telegram webhook secret configured; webhook calls are not authenticated");
    }

    let orchestrator = Arc::new(DispatchOrchestrator::new(
        config.orchestrator.clone(),
        dispatch_store,
        entity_store,
        registry,
    ));

    if config.rate_limit.enabled {
        info!(
            general_per_minute = config.rate_limit.general_per_minute,
            dispatch_per_minute = config.rate_limit.dispatch_per_minute,
            webhook_per_second = config.rate_limit.webhook_per_second,
            "Rate limiting enabled"
        );
    } else {
        warn!("Rate limiting disabled");
    }

    let state = Arc::new(
        AppState::new(config.clone(), authenticator, Arc::clone(&orchestrator)).with_bot(bot),
    );
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!(
        in_flight = orchestrator.in_flight(),
        "Server stopped, draining deliveries"
    );
    orchestrator.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
