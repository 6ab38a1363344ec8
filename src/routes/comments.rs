use axum::{
    extract::Extension,
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

use crate::auth::middleware::member_middleware;
use crate::auth::permission::PermissionCheck;
use crate::comment::controller::{
    create_comment, delete_comment, get_event_comments, hide_comment, update_comment,
};
use crate::comment::service::CommentService;
use crate::event::service::EventStore;
use crate::member::service::MemberDirectory;

/// Create a router for comment routes
pub fn routes(
    comment_service: Arc<CommentService>,
    events: EventStore,
    members: Arc<dyn MemberDirectory>,
    permissions: Arc<dyn PermissionCheck>,
) -> Router {
    Router::new()
        // Reading a thread needs no identity; moderators see hidden content
        .route(
            "/api/events/:event_type/:event_id/comments",
            get(get_event_comments),
        )
        .route(
            "/api/events/:event_type/:event_id/comments",
            post(create_comment).route_layer(middleware::from_fn(member_middleware)),
        )
        .route(
            "/api/comments/:id",
            patch(update_comment)
                .delete(delete_comment)
                .route_layer(middleware::from_fn(member_middleware)),
        )
        .route(
            "/api/comments/:id/hide",
            post(hide_comment).route_layer(middleware::from_fn(member_middleware)),
        )
        .layer(Extension(comment_service))
        .layer(Extension(events))
        .layer(Extension(members))
        .layer(Extension(permissions))
}
