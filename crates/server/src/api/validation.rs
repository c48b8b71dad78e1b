//! Request validation.
//!
//! Bodies are checked as raw JSON so that every problem can be reported with
//! its field name before anything reaches the orchestrator.

use std::collections::HashMap;

use serde_json::{Map, Value};
use uuid::{Uuid, Variant};

use dispatch_core::{ChannelType, DispatchFilter, DispatchRequest, DispatchStatus};

use super::error::FieldError;

pub const MAX_BATCH_SIZE: usize = 100;
pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 100;

/// Hyphenated RFC 4122 UUID of version 1 to 5, in either case.
pub fn is_valid_uuid(value: &str) -> bool {
    if value.len() != 36 {
        return false;
    }
    match Uuid::parse_str(value) {
        Ok(id) => (1..=5).contains(&id.get_version_num()) && id.get_variant() == Variant::RFC4122,
        Err(_) => false,
    }
}

/// Parse a request body, reporting malformed JSON as a field error.
pub fn parse_body(bytes: &[u8]) -> Result<Value, Vec<FieldError>> {
    serde_json::from_slice(bytes)
        .map_err(|_| vec![FieldError::new("body", "Request body must be valid JSON")])
}

fn required_uuid(data: &Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) -> String {
    match data.get(field) {
        None | Some(Value::Null) => {
            errors.push(FieldError::new(field, format!("{} is required", field)));
        }
        Some(Value::String(s)) if s.is_empty() => {
            errors.push(FieldError::new(field, format!("{} is required", field)));
        }
        Some(Value::String(s)) if !is_valid_uuid(s) => {
            errors.push(FieldError::new(field, format!("{} must be a valid UUID", field)));
        }
        Some(Value::String(s)) => return s.clone(),
        Some(_) => {
            errors.push(FieldError::new(field, format!("{} must be a string", field)));
        }
    }
    String::new()
}

/// Validate one dispatch body and convert it into a request.
pub fn validate_dispatch_request(body: &Value) -> Result<DispatchRequest, Vec<FieldError>> {
    let Some(data) = body.as_object() else {
        return Err(vec![FieldError::new(
            "body",
            "Request body must be a JSON object",
        )]);
    };

    let mut errors = Vec::new();
    let route_id = required_uuid(data, "route_id", &mut errors);
    let driver_id = required_uuid(data, "driver_id", &mut errors);

    let channels = match data.get("channels") {
        None => None,
        Some(Value::Array(items)) => {
            let mut channels = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item.as_str().and_then(ChannelType::parse) {
                    Some(channel) => channels.push(channel),
                    None => errors.push(FieldError::new(
                        format!("channels[{}]", i),
                        format!(
                            "Invalid channel type: {}. Must be one of: telegram, email, sms, push",
                            display_value(item)
                        ),
                    )),
                }
            }
            Some(channels)
        }
        Some(_) => {
            errors.push(FieldError::new("channels", "channels must be an array"));
            None
        }
    };

    let multi_channel = match data.get("multi_channel") {
        None => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            errors.push(FieldError::new("multi_channel", "multi_channel must be a boolean"));
            false
        }
    };

    let metadata = match data.get("metadata") {
        None => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(_) => {
            errors.push(FieldError::new("metadata", "metadata must be an object"));
            None
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(DispatchRequest {
        route_id,
        driver_id,
        channels,
        multi_channel,
        metadata,
    })
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One batch entry after validation.
pub type BatchItem = Result<DispatchRequest, Vec<FieldError>>;

/// Validate a batch body.
///
/// Structural problems with the `dispatches` array reject the whole batch.
/// Problems with individual items are returned per item so the rest of the
/// batch can still be processed.
pub fn validate_batch_request(body: &Value) -> Result<Vec<BatchItem>, Vec<FieldError>> {
    let Some(data) = body.as_object() else {
        return Err(vec![FieldError::new(
            "body",
            "Request body must be a JSON object",
        )]);
    };

    let items = match data.get("dispatches") {
        None | Some(Value::Null) => {
            return Err(vec![FieldError::new("dispatches", "dispatches array is required")])
        }
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(vec![FieldError::new("dispatches", "dispatches must be an array")])
        }
    };

    if items.is_empty() {
        return Err(vec![FieldError::new(
            "dispatches",
            "dispatches array cannot be empty",
        )]);
    }
    if items.len() > MAX_BATCH_SIZE {
        return Err(vec![FieldError::new(
            "dispatches",
            format!("Batch size exceeds maximum of {} items", MAX_BATCH_SIZE),
        )]);
    }

    Ok(items.iter().map(validate_dispatch_request).collect())
}

/// Validate list query parameters into a store filter.
pub fn validate_list_query(params: &HashMap<String, String>) -> Result<DispatchFilter, Vec<FieldError>> {
    let mut errors = Vec::new();
    let mut filter = DispatchFilter::new().with_limit(DEFAULT_LIST_LIMIT);

    if let Some(status) = params.get("status") {
        match DispatchStatus::parse(status) {
            Some(status) => filter = filter.with_status(status),
            None => errors.push(FieldError::new(
                "status",
                "status must be one of: pending, sending, delivered, partial, failed",
            )),
        }
    }

    for field in ["driver_id", "route_id"] {
        if let Some(id) = params.get(field) {
            if !is_valid_uuid(id) {
                errors.push(FieldError::new(field, format!("{} must be a valid UUID", field)));
            } else if field == "driver_id" {
                filter = filter.with_driver_id(id.as_str());
            } else {
                filter = filter.with_route_id(id.as_str());
            }
        }
    }

    if let Some(limit) = params.get("limit") {
        match limit.parse::<i64>() {
            Ok(limit) if (1..=MAX_LIST_LIMIT).contains(&limit) => filter = filter.with_limit(limit),
            _ => errors.push(FieldError::new(
                "limit",
                format!("limit must be an integer between 1 and {}", MAX_LIST_LIMIT),
            )),
        }
    }

    if let Some(offset) = params.get("offset") {
        match offset.parse::<i64>() {
            Ok(offset) if offset >= 0 => filter = filter.with_offset(offset),
            _ => errors.push(FieldError::new("offset", "offset must be a non-negative integer")),
        }
    }

    if errors.is_empty() {
        Ok(filter)
    } else {
        Err(errors)
    }
}
