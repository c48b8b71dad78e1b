//! Shared JSON error envelope for API responses.
//!
//! Every error body has the shape
//! `{"error": {"code", "message", "details"?}, "requestId"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use dispatch_core::{orchestrator::EntityKind, OrchestratorError, RegistrationError};

use super::middleware::RequestId;

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Value>,
    request_id: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
            request_id: String::new(),
        }
    }

    /// 400 with every field error listed; the message is the first one.
    pub fn validation(errors: Vec<FieldError>) -> Self {
        let message = errors
            .first()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "Validation failed".to_string());
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
            .with_details(json!({ "errors": errors }))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_request_id(mut self, request_id: &RequestId) -> Self {
        self.request_id = request_id.0.clone();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Map an orchestrator failure for the request identified by `request_id`.
    pub fn from_orchestrator(err: OrchestratorError, request_id: &RequestId) -> Self {
        let api_error = match err {
            OrchestratorError::EntityNotFound { entity, ref id } => {
                let entity_type = match entity {
                    EntityKind::Route => "route",
                    EntityKind::Driver => "driver",
                };
                ApiError::not_found(err.to_string()).with_details(json!({
                    "entityType": entity_type,
                    "entityId": id,
                }))
            }
            other => {
                error!(request_id = %request_id.0, "Dispatch operation failed: {}", other);
                ApiError::internal("An unexpected error occurred")
            }
        };
        api_error.with_request_id(request_id)
    }

    /// Map a registration link failure for the request identified by `request_id`.
    pub fn from_registration(err: RegistrationError, request_id: &RequestId) -> Self {
        let api_error = match err {
            RegistrationError::InvalidDriverId => {
                ApiError::new(StatusCode::BAD_REQUEST, "INVALID_DRIVER_ID", err.to_string())
            }
            RegistrationError::DriverNotFound => {
                ApiError::new(StatusCode::NOT_FOUND, "DRIVER_NOT_FOUND", err.to_string())
            }
            RegistrationError::NotConfigured => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "TELEGRAM_NOT_CONFIGURED",
                err.to_string(),
            ),
            RegistrationError::QrCode(ref reason) => {
                error!(request_id = %request_id.0, "QR code generation failed: {}", reason);
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "QR_CODE_ERROR",
                    "Failed to generate QR code",
                )
            }
            RegistrationError::Entity(e) => {
                error!(request_id = %request_id.0, "Registration lookup failed: {}", e);
                ApiError::internal("An unexpected error occurred")
            }
        };
        api_error.with_request_id(request_id)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut error = json!({
            "code": self.code,
            "message": self.message,
        });
        if let Some(details) = self.details {
            error["details"] = details;
        }

        (
            self.status,
            Json(json!({
                "error": error,
                "requestId": self.request_id,
            })),
        )
            .into_response()
    }
}
