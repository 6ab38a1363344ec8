use axum::{extract::Extension, middleware, routing::post, Router};
use std::sync::Arc;

use crate::auth::middleware::member_middleware;
use crate::auth::permission::PermissionCheck;
use crate::event::controller::trigger_event_notifications;
use crate::event::service::EventNotifier;

/// Create a router for organizer-triggered event notifications
pub fn routes(notifier: Arc<EventNotifier>, permissions: Arc<dyn PermissionCheck>) -> Router {
    Router::new()
        .route(
            "/api/events/:event_type/:event_id/notifications",
            post(trigger_event_notifications).route_layer(middleware::from_fn(member_middleware)),
        )
        .layer(Extension(notifier))
        .layer(Extension(permissions))
}
