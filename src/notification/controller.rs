use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tracing::{error, info};

use crate::auth::middleware::CurrentMember;
use crate::controller::{api_error, ApiError};
use crate::notification::aggregate::{
    filter_notifications, group_by_date, labelled_groups, should_show_badge, summarize,
    NotificationGroup,
};
use crate::notification::model::{
    DateRange, MarkAllReadResponse, Notification, NotificationError, NotificationFilter,
    NotificationListParams, NotificationPriority, NotificationType, ReadStatus, SummaryResponse,
};
use crate::notification::service::NotificationService;

// Helper function to convert NotificationError to HTTP response
fn notification_error_to_response(err: NotificationError) -> ApiError {
    match err {
        NotificationError::NotFound(id) => api_error(
            StatusCode::NOT_FOUND,
            format!("Notification not found: {}", id),
            "NOT_FOUND",
        ),
        NotificationError::ValidationError(msg) => {
            api_error(StatusCode::BAD_REQUEST, msg, "VALIDATION_ERROR")
        }
        NotificationError::PersistenceError(e) => {
            error!("Notification persistence error: {}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Persistence error",
                "PERSISTENCE_ERROR",
            )
        }
    }
}

fn invalid(message: String) -> ApiError {
    notification_error_to_response(NotificationError::ValidationError(message))
}

/// Turns query-string criteria into a display filter.
pub(crate) fn parse_filter(params: NotificationListParams) -> Result<NotificationFilter, ApiError> {
    let read_status = match params.read_status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some("unread") => Some(ReadStatus::Unread),
        Some("read") => Some(ReadStatus::Read),
        Some(other) => return Err(invalid(format!("Unknown read_status: {}", other))),
    };

    let types = match params.types.as_deref() {
        None => Vec::new(),
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| {
                NotificationType::from_str_value(value)
                    .ok_or_else(|| invalid(format!("Unknown notification type: {}", value)))
            })
            .collect::<Result<Vec<_>, _>>()?,
    };

    let priority = match params.priority.as_deref() {
        None => None,
        Some(value) => Some(
            NotificationPriority::from_str_value(value)
                .ok_or_else(|| invalid(format!("Unknown priority: {}", value)))?,
        ),
    };

    let millis = |value: Option<i64>, name: &str| -> Result<_, ApiError> {
        value
            .map(|ms| {
                Utc.timestamp_millis_opt(ms)
                    .single()
                    .ok_or_else(|| invalid(format!("Invalid {} timestamp", name)))
            })
            .transpose()
    };
    let from = millis(params.from, "from")?;
    let to = millis(params.to, "to")?;
    let date_range = (from.is_some() || to.is_some()).then_some(DateRange { from, to });

    Ok(NotificationFilter {
        read_status,
        types,
        event_id: params.event_id.filter(|id| !id.is_empty()),
        date_range,
        priority,
    })
}

async fn filtered_for(
    service: &NotificationService,
    member: &CurrentMember,
    params: NotificationListParams,
) -> Result<Vec<Notification>, ApiError> {
    let filter = parse_filter(params)?;
    let notifications = service
        .list_for_recipient(&member.member_id, None)
        .await
        .map_err(notification_error_to_response)?;
    Ok(filter_notifications(&notifications, &filter))
}

/// Loads a notification, treating other members' notifications as missing.
async fn owned_notification(
    service: &NotificationService,
    member: &CurrentMember,
    id: &str,
) -> Result<Notification, ApiError> {
    let notification = service
        .get_notification(id)
        .await
        .map_err(notification_error_to_response)?;
    if notification.recipient_id != member.member_id {
        return Err(notification_error_to_response(NotificationError::NotFound(
            id.to_string(),
        )));
    }
    Ok(notification)
}

/// List the caller's notifications
///
/// Newest first. Every filter is optional; present filters are combined with AND.
#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "notifications",
    params(NotificationListParams),
    responses(
        (status = 200, description = "Notifications retrieved", body = [Notification]),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
        (status = 401, description = "Missing member identity", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(
        ("member_id" = [])
    )
)]
pub async fn list_notifications(
    member: CurrentMember,
    Query(params): Query<NotificationListParams>,
    Extension(notification_service): Extension<Arc<NotificationService>>,
) -> Result<(StatusCode, Json<Vec<Notification>>), ApiError> {
    let notifications = filtered_for(&notification_service, &member, params).await?;
    Ok((StatusCode::OK, Json(notifications)))
}

/// List the caller's notifications grouped by day
///
/// Groups are "Today", "Yesterday", "This Week" and "Earlier"; empty groups are left out.
#[utoipa::path(
    get,
    path = "/api/notifications/grouped",
    tag = "notifications",
    params(NotificationListParams),
    responses(
        (status = 200, description = "Grouped notifications", body = [NotificationGroup]),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
        (status = 401, description = "Missing member identity", body = ErrorResponse)
    ),
    security(
        ("member_id" = [])
    )
)]
pub async fn grouped_notifications(
    member: CurrentMember,
    Query(params): Query<NotificationListParams>,
    Extension(notification_service): Extension<Arc<NotificationService>>,
) -> Result<(StatusCode, Json<Vec<NotificationGroup>>), ApiError> {
    let notifications = filtered_for(&notification_service, &member, params).await?;
    let groups = labelled_groups(group_by_date(&notifications));
    Ok((StatusCode::OK, Json(groups)))
}

/// Summarize the caller's notifications
#[utoipa::path(
    get,
    path = "/api/notifications/summary",
    tag = "notifications",
    responses(
        (status = 200, description = "Summary counts", body = SummaryResponse),
        (status = 401, description = "Missing member identity", body = ErrorResponse)
    ),
    security(
        ("member_id" = [])
    )
)]
pub async fn notification_summary(
    member: CurrentMember,
    Extension(notification_service): Extension<Arc<NotificationService>>,
) -> Result<(StatusCode, Json<SummaryResponse>), ApiError> {
    let notifications = notification_service
        .list_for_recipient(&member.member_id, None)
        .await
        .map_err(notification_error_to_response)?;

    let response = SummaryResponse {
        badge_count: notifications.iter().filter(|n| should_show_badge(n)).count(),
        summary: summarize(&notifications),
    };
    Ok((StatusCode::OK, Json(response)))
}

/// Mark a notification as read
///
/// Idempotent: the read time of the first call is kept.
#[utoipa::path(
    post,
    path = "/api/notifications/{id}/read",
    tag = "notifications",
    params(
        ("id" = String, Path, description = "The ID of the notification")
    ),
    responses(
        (status = 200, description = "Notification marked read", body = Notification),
        (status = 404, description = "Notification not found", body = ErrorResponse)
    ),
    security(
        ("member_id" = [])
    )
)]
pub async fn mark_notification_read(
    Path(notification_id): Path<String>,
    member: CurrentMember,
    Extension(notification_service): Extension<Arc<NotificationService>>,
) -> Result<(StatusCode, Json<Notification>), ApiError> {
    owned_notification(&notification_service, &member, &notification_id).await?;

    let notification = notification_service
        .mark_as_read(&notification_id)
        .await
        .map_err(notification_error_to_response)?;
    Ok((StatusCode::OK, Json(notification)))
}

/// Mark all of the caller's notifications as read
#[utoipa::path(
    post,
    path = "/api/notifications/read-all",
    tag = "notifications",
    responses(
        (status = 200, description = "Number of notifications marked read", body = MarkAllReadResponse),
        (status = 401, description = "Missing member identity", body = ErrorResponse)
    ),
    security(
        ("member_id" = [])
    )
)]
pub async fn mark_all_notifications_read(
    member: CurrentMember,
    Extension(notification_service): Extension<Arc<NotificationService>>,
) -> Result<(StatusCode, Json<MarkAllReadResponse>), ApiError> {
    let updated = notification_service
        .mark_all_as_read(&member.member_id)
        .await
        .map_err(notification_error_to_response)?;

    info!("Member {} marked {} notifications read", member.member_id, updated);
    Ok((StatusCode::OK, Json(MarkAllReadResponse { updated })))
}

/// Delete a notification
#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    tag = "notifications",
    params(
        ("id" = String, Path, description = "The ID of the notification")
    ),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 404, description = "Notification not found", body = ErrorResponse)
    ),
    security(
        ("member_id" = [])
    )
)]
pub async fn delete_notification(
    Path(notification_id): Path<String>,
    member: CurrentMember,
    Extension(notification_service): Extension<Arc<NotificationService>>,
) -> impl IntoResponse {
    if let Err(rejection) =
        owned_notification(&notification_service, &member, &notification_id).await
    {
        return rejection.into_response();
    }

    match notification_service
        .delete_notification(&notification_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => notification_error_to_response(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> NotificationListParams {
        NotificationListParams::default()
    }

    #[test]
    fn test_parse_filter_defaults_to_everything() {
        let filter = parse_filter(params()).unwrap();
        assert_eq!(filter, NotificationFilter::default());
    }

    #[test]
    fn test_parse_filter_reads_all_criteria() {
        let filter = parse_filter(NotificationListParams {
            read_status: Some("unread".to_string()),
            types: Some("mention, comment_reply".to_string()),
            priority: Some("HIGH".to_string()),
            event_id: Some("e1".to_string()),
            from: Some(1_700_000_000_000),
            to: None,
        })
        .unwrap();

        assert_eq!(filter.read_status, Some(ReadStatus::Unread));
        assert_eq!(
            filter.types,
            vec![NotificationType::Mention, NotificationType::CommentReply]
        );
        assert_eq!(filter.priority, Some(NotificationPriority::High));
        assert_eq!(filter.event_id.as_deref(), Some("e1"));
        assert!(filter.date_range.unwrap().from.is_some());
    }

    #[test]
    fn test_parse_filter_rejects_unknown_values() {
        for bad in [
            NotificationListParams {
                read_status: Some("maybe".to_string()),
                ..params()
            },
            NotificationListParams {
                types: Some("mention,bogus".to_string()),
                ..params()
            },
            NotificationListParams {
                priority: Some("critical".to_string()),
                ..params()
            },
        ] {
            let (status, _) = parse_filter(bad).unwrap_err();
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }
}
