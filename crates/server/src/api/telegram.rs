//! Telegram webhook and driver registration links.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use dispatch_core::{constant_time_eq, RegistrationError, RegistrationLink, Update};

use super::error::ApiError;
use super::middleware::RequestId;
use crate::metrics::AUTH_FAILURES_TOTAL;
use crate::state::AppState;

pub const WEBHOOK_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Receive one update from Telegram.
///
/// Always answers 200 `{"ok": true}` so Telegram does not redeliver updates
/// the bot cannot use.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    body: Bytes,
) -> Json<Value> {
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(request_id = %request_id.0, "Discarding unparseable Telegram update: {}", e);
            return Json(json!({ "ok": true }));
        }
    };

    match state.bot() {
        Some(bot) => {
            let outcome = bot.handle_update(&update).await;
            info!(
                request_id = %request_id.0,
                update_id = update.update_id,
                outcome = outcome.as_str(),
                "Processed Telegram update"
            );
        }
        None => {
            debug!(
                request_id = %request_id.0,
                update_id = update.update_id,
                "Telegram bot not configured, ignoring update"
            );
        }
    }

    Json(json!({ "ok": true }))
}

/// Deep link and QR code a driver scans to connect their Telegram chat.
pub async fn registration_link(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    Path(driver_id): Path<String>,
) -> Result<Json<RegistrationLink>, ApiError> {
    let bot = state.bot().ok_or_else(|| {
        ApiError::from_registration(RegistrationError::NotConfigured, &request_id)
    })?;

    let link = bot
        .registration_link(&driver_id)
        .await
        .map_err(|e| {
            warn!(request_id = %request_id.0, driver_id = %driver_id, "Registration link refused: {}", e);
            ApiError::from_registration(e, &request_id)
        })?;
    Ok(Json(link))
}

/// Checks `X-Telegram-Bot-Api-Secret-Token` when a webhook secret is configured.
pub async fn webhook_secret_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.telegram_webhook_secret() else {
        return next.run(request).await;
    };

    let request_id = request
        .extensions()
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(|| RequestId(uuid::Uuid::new_v4().to_string()));

    let provided = request
        .headers()
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
            next.run(request).await
        }
        Some(_) => {
            AUTH_FAILURES_TOTAL
                .with_label_values(&["invalid_webhook_secret"])
                .inc();
            warn!(request_id = %request_id.0, "Telegram webhook with invalid secret token");
            ApiError::unauthorized("Invalid webhook authentication token")
                .with_request_id(&request_id)
                .into_response()
        }
        None => {
            AUTH_FAILURES_TOTAL
                .with_label_values(&["missing_webhook_secret"])
                .inc();
            warn!(request_id = %request_id.0, "Telegram webhook without secret token");
            ApiError::unauthorized("Missing webhook authentication token")
                .with_request_id(&request_id)
                .into_response()
        }
    }
}
