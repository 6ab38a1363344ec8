use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
};
use std::sync::Arc;
use tracing::error;

use crate::auth::middleware::CurrentMember;
use crate::auth::permission::{require_permission, Action, PermissionCheck};
use crate::controller::{api_error, forbidden, parse_event_type, ApiError};
use crate::event::model::{EventError, EventTriggerRequest};
use crate::event::service::EventNotifier;
use crate::notification::model::Notification;

fn event_error_to_response(err: EventError) -> ApiError {
    match err {
        EventError::ValidationError(msg) => {
            api_error(StatusCode::BAD_REQUEST, msg, "VALIDATION_ERROR")
        }
        EventError::NotFound(id) => api_error(
            StatusCode::NOT_FOUND,
            format!("Event not found: {}", id),
            "EVENT_NOT_FOUND",
        ),
        EventError::PersistenceError(e) => {
            error!("Event persistence error: {}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Persistence error",
                "PERSISTENCE_ERROR",
            )
        }
    }
}

/// Notify members about an event
///
/// Sends update, payment, results or reminder notifications to the listed members.
/// Individual delivery failures are logged and left out of the response.
#[utoipa::path(
    post,
    path = "/api/events/{event_type}/{event_id}/notifications",
    tag = "events",
    params(
        ("event_type" = String, Path, description = "tournament or league"),
        ("event_id" = String, Path, description = "The ID of the event")
    ),
    request_body = EventTriggerRequest,
    responses(
        (status = 201, description = "Notifications created", body = [Notification]),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Missing member identity", body = ErrorResponse),
        (status = 403, description = "Not an organizer", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse)
    ),
    security(
        ("member_id" = [])
    )
)]
pub async fn trigger_event_notifications(
    Path((event_type, event_id)): Path<(String, String)>,
    member: CurrentMember,
    Extension(notifier): Extension<Arc<EventNotifier>>,
    Extension(permissions): Extension<Arc<dyn PermissionCheck>>,
    Json(request): Json<EventTriggerRequest>,
) -> Result<(StatusCode, Json<Vec<Notification>>), ApiError> {
    require_permission(
        permissions.as_ref(),
        &member.member_id,
        Action::SendEventNotifications,
    )
    .map_err(forbidden)?;

    let event_type = parse_event_type(&event_type)?;

    let created = notifier
        .dispatch(event_type, &event_id, request)
        .await
        .map_err(event_error_to_response)?;

    Ok((StatusCode::CREATED, Json(created)))
}
