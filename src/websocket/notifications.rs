use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    response::IntoResponse,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::{pump_snapshots, reject_socket, SocketState};
use crate::auth::middleware::CurrentMember;
use crate::notification::model::Notification;

/// Query parameters for the notification socket
#[derive(Debug, Default, Deserialize)]
pub struct NotificationSocketParams {
    /// Optional; must name the caller when present.
    member_id: Option<String>,
}

/// What the client receives after every change to its notifications.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSnapshot {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

impl NotificationSnapshot {
    pub fn new(notifications: Vec<Notification>) -> Self {
        let unread_count = notifications.iter().filter(|n| !n.is_read).count();
        Self {
            notifications,
            unread_count,
        }
    }
}

/// Streams the caller's notifications, newest first, on every change.
pub async fn notifications_ws(
    ws: WebSocketUpgrade,
    member: Option<CurrentMember>,
    Query(params): Query<NotificationSocketParams>,
    State(state): State<SocketState>,
) -> impl IntoResponse {
    let Some(CurrentMember { member_id }) = member else {
        return reject_socket(ws, "Member identity is required".to_string());
    };
    if let Some(requested) = params.member_id.filter(|id| !id.trim().is_empty()) {
        if requested.trim() != member_id {
            warn!(
                "Member {} tried to watch notifications of {}",
                member_id, requested
            );
            return reject_socket(
                ws,
                "Not allowed to watch another member's notifications".to_string(),
            );
        }
    }

    let subscription = match state.notifications.subscribe(&member_id).await {
        Ok(subscription) => subscription,
        Err(e) => {
            error!("Failed to subscribe to notifications for {}: {}", member_id, e);
            return reject_socket(ws, "Notifications are unavailable".to_string());
        }
    };

    info!("Member {} connected to notifications WebSocket", member_id);
    let snapshots = subscription.into_stream().map(NotificationSnapshot::new);
    ws.on_upgrade(move |socket| async move {
        pump_snapshots(socket, snapshots, format!("member {}", member_id)).await;
    })
}
