use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use dispatch_core::{ChannelType, HealthStatus, SanitizedConfig};

use super::middleware::RequestId;
use crate::metrics::encode_metrics;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn healthy() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            error: None,
        }
    }

    /// A check that failed only because the component is not configured
    /// degrades the service rather than taking it down.
    fn from_check(report: Option<&HealthStatus>, channel: ChannelType) -> Self {
        match report {
            Some(status) if status.healthy => Self::healthy(),
            Some(status) => {
                let degraded = status.message.to_lowercase().contains("not configured");
                Self {
                    status: if degraded {
                        ComponentStatus::Degraded
                    } else {
                        ComponentStatus::Unhealthy
                    },
                    error: Some(status.message.clone()),
                }
            }
            None => Self {
                status: ComponentStatus::Degraded,
                error: Some(format!("{} adapter is not registered", channel)),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthComponents {
    pub database: ComponentHealth,
    pub telegram: ComponentHealth,
    pub email: ComponentHealth,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub timestamp: String,
    pub components: HealthComponents,
}

/// Worst component status wins.
fn overall_status(components: &HealthComponents) -> ComponentStatus {
    let all = [
        components.database.status,
        components.telegram.status,
        components.email.status,
    ];
    if all.contains(&ComponentStatus::Unhealthy) {
        ComponentStatus::Unhealthy
    } else if all.contains(&ComponentStatus::Degraded) {
        ComponentStatus::Degraded
    } else {
        ComponentStatus::Healthy
    }
}

/// GET /health
///
/// 200 when healthy or degraded, 503 when any component is unhealthy.
pub async fn health(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
) -> (StatusCode, Json<HealthResponse>) {
    debug!(request_id = %request_id.0, "Processing health check");
    let report = state.orchestrator().health().await;

    let database = if report.store.healthy {
        ComponentHealth::healthy()
    } else {
        ComponentHealth {
            status: ComponentStatus::Unhealthy,
            error: Some(report.store.message.clone()),
        }
    };

    let components = HealthComponents {
        database,
        telegram: ComponentHealth::from_check(
            report.channel(ChannelType::Telegram),
            ChannelType::Telegram,
        ),
        email: ComponentHealth::from_check(report.channel(ChannelType::Email), ChannelType::Email),
    };
    let status = overall_status(&components);

    info!(
        request_id = %request_id.0,
        status = ?status,
        database = ?components.database.status,
        telegram = ?components.telegram.status,
        email = ?components.email.status,
        "Health check completed"
    );

    let http_status = if status == ComponentStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        http_status,
        Json(HealthResponse {
            status,
            timestamp: Utc::now().to_rfc3339(),
            components,
        }),
    )
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// GET /metrics (Prometheus text format)
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
