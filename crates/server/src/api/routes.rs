use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::middleware::{auth_middleware, metrics_middleware, request_id_middleware};
use super::rate_limit::{dispatch_rate_limit, general_rate_limit, webhook_rate_limit};
use super::telegram::webhook_secret_middleware;
use super::{dispatch, handlers, telegram};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Public routes
    let public_routes = Router::new().route("/health", get(handlers::health));

    // Telegram calls in with its own secret instead of an API key
    let webhook_routes = Router::new()
        .route("/telegram/webhook", post(telegram::webhook))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            webhook_rate_limit,
        ))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            webhook_secret_middleware,
        ));

    let dispatch_routes = Router::new()
        .route(
            "/dispatch",
            post(dispatch::create_dispatch).get(dispatch::list_dispatches),
        )
        .route("/dispatch/batch", post(dispatch::dispatch_batch))
        .route("/dispatch/{id}", get(dispatch::get_dispatch))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            dispatch_rate_limit,
        ));

    // API key protected routes
    let protected_routes = Router::new()
        .route("/config", get(handlers::get_config))
        .route(
            "/telegram/registration/{driver_id}",
            get(telegram::registration_link),
        )
        .merge(dispatch_routes)
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            general_rate_limit,
        ));

    let api_routes = public_routes
        .merge(webhook_routes)
        .merge(protected_routes)
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
