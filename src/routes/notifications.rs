use axum::{
    extract::Extension,
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::auth::middleware::member_middleware;
use crate::notification::controller::{
    delete_notification, grouped_notifications, list_notifications,
    mark_all_notifications_read, mark_notification_read, notification_summary,
};
use crate::notification::service::NotificationService;

/// Create a router for notification routes. Every route acts on the caller's own
/// notifications.
pub fn routes(notification_service: Arc<NotificationService>) -> Router {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/grouped", get(grouped_notifications))
        .route("/api/notifications/summary", get(notification_summary))
        .route("/api/notifications/read-all", post(mark_all_notifications_read))
        .route("/api/notifications/:id/read", post(mark_notification_read))
        .route("/api/notifications/:id", delete(delete_notification))
        .route_layer(middleware::from_fn(member_middleware))
        .layer(Extension(notification_service))
}
