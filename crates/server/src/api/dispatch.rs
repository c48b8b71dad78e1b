//! Dispatch API handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use dispatch_core::{
    BatchItemResult, BatchResult, Dispatch, DispatchResult, DispatchWithChannels,
};

use super::error::ApiError;
use super::middleware::{AuthUser, RequestId};
use super::validation::{
    is_valid_uuid, parse_body, validate_batch_request, validate_dispatch_request,
    validate_list_query,
};
use crate::metrics::VALIDATION_FAILURES_TOTAL;
use crate::state::AppState;

/// Response for listing dispatches
#[derive(Debug, Serialize)]
pub struct ListDispatchesResponse {
    pub dispatches: Vec<Dispatch>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

fn rejected(endpoint: &str, errors: Vec<super::error::FieldError>, request_id: &RequestId) -> ApiError {
    VALIDATION_FAILURES_TOTAL.with_label_values(&[endpoint]).inc();
    warn!(request_id = %request_id.0, endpoint, errors = ?errors, "Request validation failed");
    ApiError::validation(errors).with_request_id(request_id)
}

/// POST /dispatch
///
/// Accepts the dispatch and answers 202 before any channel is contacted.
pub async fn create_dispatch(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    AuthUser(user): AuthUser,
    body: Bytes,
) -> Result<(StatusCode, Json<DispatchResult>), ApiError> {
    let request = parse_body(&body)
        .and_then(|value| validate_dispatch_request(&value))
        .map_err(|errors| rejected("dispatch", errors, &request_id))?;

    let result = state
        .orchestrator()
        .dispatch(request)
        .await
        .map_err(|e| ApiError::from_orchestrator(e, &request_id))?;

    info!(
        request_id = %request_id.0,
        requested_by = %user,
        dispatch_id = %result.dispatch_id,
        channels = ?result.requested_channels,
        "Dispatch created"
    );

    Ok((StatusCode::ACCEPTED, Json(result)))
}

/// POST /dispatch/batch
///
/// Items that fail validation are reported as failed results at their index;
/// the remaining items are handed to the orchestrator.
pub async fn dispatch_batch(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    body: Bytes,
) -> Result<(StatusCode, Json<BatchResult>), ApiError> {
    let items = parse_body(&body)
        .and_then(|value| validate_batch_request(&value))
        .map_err(|errors| rejected("dispatch_batch", errors, &request_id))?;

    debug!(request_id = %request_id.0, items = items.len(), "Processing batch dispatch");

    let mut results = Vec::with_capacity(items.len());
    let mut accepted_indexes = Vec::new();
    let mut requests = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        match item {
            Ok(request) => {
                accepted_indexes.push(index);
                requests.push(request);
            }
            Err(errors) => {
                let message = errors
                    .first()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "Validation failed".to_string());
                results.push(BatchItemResult::failed(index, message));
            }
        }
    }

    let dispatched = state.orchestrator().dispatch_batch(requests).await;
    results.extend(dispatched.results.into_iter().map(|mut item| {
        item.index = accepted_indexes[item.index];
        item
    }));

    let result = BatchResult::from_results(results);
    info!(
        request_id = %request_id.0,
        total = result.summary.total,
        successful = result.summary.successful,
        failed = result.summary.failed,
        "Batch dispatch processed"
    );

    Ok((StatusCode::ACCEPTED, Json(result)))
}

/// GET /dispatch/{id}
pub async fn get_dispatch(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    Path(id): Path<String>,
) -> Result<Json<DispatchWithChannels>, ApiError> {
    if !is_valid_uuid(&id) {
        VALIDATION_FAILURES_TOTAL
            .with_label_values(&["get_dispatch"])
            .inc();
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "dispatch_id must be a valid UUID",
        )
        .with_details(json!({ "field": "id", "value": id }))
        .with_request_id(&request_id));
    }

    match state
        .orchestrator()
        .get_dispatch(&id)
        .map_err(|e| ApiError::from_orchestrator(e, &request_id))?
    {
        Some(dispatch) => Ok(Json(dispatch)),
        None => Err(ApiError::not_found(format!("Dispatch not found: {}", id))
            .with_details(json!({ "dispatchId": id }))
            .with_request_id(&request_id)),
    }
}

/// GET /dispatch
pub async fn list_dispatches(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListDispatchesResponse>, ApiError> {
    let filter =
        validate_list_query(&params).map_err(|errors| rejected("list_dispatches", errors, &request_id))?;

    let orchestrator = state.orchestrator();
    let dispatches = orchestrator
        .list_dispatches(&filter)
        .map_err(|e| ApiError::from_orchestrator(e, &request_id))?;
    let total = orchestrator
        .count_dispatches(&filter)
        .map_err(|e| ApiError::from_orchestrator(e, &request_id))?;

    Ok(Json(ListDispatchesResponse {
        dispatches,
        total,
        limit: filter.limit,
        offset: filter.offset,
    }))
}
