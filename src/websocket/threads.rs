use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    response::IntoResponse,
};
use futures::StreamExt;
use serde::Deserialize;
use tracing::{error, info};

use super::{pump_snapshots, reject_socket, SocketState};
use crate::auth::middleware::CurrentMember;
use crate::auth::permission::Action;
use crate::comment::model::{Comment, ThreadResponse};
use crate::comment::thread::{build_thread, visible_comments};
use crate::event::model::EventType;

/// Query parameters for the comment thread socket
#[derive(Debug, Default, Deserialize)]
pub struct ThreadSocketParams {
    division_id: Option<String>,
}

/// Same shape as the thread listing endpoint.
pub fn thread_snapshot(comments: Vec<Comment>, viewer_is_moderator: bool) -> ThreadResponse {
    ThreadResponse {
        total_count: comments.len(),
        thread: build_thread(&comments, viewer_is_moderator),
        comments: visible_comments(&comments, viewer_is_moderator),
    }
}

/// Streams an event's comment thread on every change.
pub async fn thread_ws(
    ws: WebSocketUpgrade,
    Path((event_type, event_id)): Path<(String, String)>,
    viewer: Option<CurrentMember>,
    Query(params): Query<ThreadSocketParams>,
    State(state): State<SocketState>,
) -> impl IntoResponse {
    let Some(event_type) = EventType::from_str_value(&event_type) else {
        return reject_socket(ws, format!("Unknown event type: {}", event_type));
    };

    let subscription = match state
        .comments
        .subscribe_thread(event_type, &event_id, params.division_id.as_deref())
        .await
    {
        Ok(subscription) => subscription,
        Err(e) => {
            error!("Failed to subscribe to thread {}: {}", event_id, e);
            return reject_socket(ws, "Comments are unavailable".to_string());
        }
    };

    // Hidden content is only unmasked for a moderator identified by header.
    let viewer_is_moderator = viewer.map_or(false, |viewer| {
        state
            .permissions
            .has_permission(&viewer.member_id, Action::ModerateComments)
    });

    info!(
        "Client connected to {} {} thread WebSocket",
        event_type.as_str(),
        event_id
    );
    let snapshots = subscription
        .into_stream()
        .map(move |comments| thread_snapshot(comments, viewer_is_moderator));
    ws.on_upgrade(move |socket| async move {
        pump_snapshots(
            socket,
            snapshots,
            format!("{} {} thread", event_type.as_str(), event_id),
        )
        .await;
    })
}
