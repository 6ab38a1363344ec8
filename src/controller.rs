use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::permission::PermissionDenied;
use crate::event::model::EventType;

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    #[schema(example = "Comment not found")]
    pub error: String,

    /// Error code
    #[schema(example = "NOT_FOUND")]
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (status, Json(ErrorResponse::new(error, code)))
}

pub fn forbidden(denied: PermissionDenied) -> ApiError {
    api_error(StatusCode::FORBIDDEN, denied.to_string(), "FORBIDDEN")
}

/// Parses the `{event_type}` path segment.
pub fn parse_event_type(value: &str) -> Result<EventType, ApiError> {
    EventType::from_str_value(value).ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Unknown event type: {}", value),
            "VALIDATION_ERROR",
        )
    })
}
