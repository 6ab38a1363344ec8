use axum::{routing::get, Router};

use crate::websocket::notifications::notifications_ws;
use crate::websocket::threads::thread_ws;
use crate::websocket::SocketState;

/// Create a router for the live snapshot sockets
pub fn routes(state: SocketState) -> Router {
    Router::new()
        .route("/api/notifications/ws", get(notifications_ws))
        .route("/api/events/:event_type/:event_id/comments/ws", get(thread_ws))
        .with_state(state)
}
