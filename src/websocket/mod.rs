//! Live snapshot feeds over WebSocket.
//!
//! Each socket owns one store subscription. Every change the subscription sees is
//! sent to the client as a complete JSON snapshot, never as a diff.

pub mod notifications;
pub mod threads;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, Stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::mpsc, time};
use tracing::{debug, error, info};

use crate::auth::permission::PermissionCheck;
use crate::comment::service::CommentService;
use crate::notification::service::NotificationService;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Application state for the socket routes
#[derive(Clone)]
pub struct SocketState {
    pub notifications: Arc<NotificationService>,
    pub comments: Arc<CommentService>,
    pub permissions: Arc<dyn PermissionCheck>,
}

/// Sends a single error frame and closes the socket.
async fn handle_invalid_socket(mut socket: WebSocket, error_message: String) {
    let frame = serde_json::json!({ "error": error_message }).to_string();
    if let Err(e) = socket.send(Message::Text(frame)).await {
        error!("Error sending error message on WS: {}", e);
    }

    let _ = socket.close().await;
}

/// Upgrades only to report why the connection is refused.
fn reject_socket(ws: WebSocketUpgrade, error_message: String) -> Response {
    ws.on_upgrade(move |socket| async move {
        handle_invalid_socket(socket, error_message).await;
    })
}

/// Forwards every snapshot to the client until either side goes away.
async fn pump_snapshots<S, T>(socket: WebSocket, snapshots: S, label: String)
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + 'static,
{
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(100);

    let tx_snapshots = tx.clone();
    let snapshot_label = label.clone();
    let snapshot_task = tokio::spawn(async move {
        let mut snapshots = Box::pin(snapshots);
        while let Some(snapshot) = snapshots.next().await {
            let payload = match serde_json::to_string(&snapshot) {
                Ok(payload) => payload,
                Err(e) => {
                    error!("Failed to encode {} snapshot: {}", snapshot_label, e);
                    continue;
                }
            };
            if tx_snapshots.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
        debug!("Snapshot stream ended for {}", snapshot_label);
    });

    let forward_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                error!("Error forwarding message to WebSocket: {}", e);
                break;
            }
        }
    });

    let tx_heartbeat = tx.clone();
    let heartbeat_task = tokio::spawn(async move {
        let mut interval = time::interval(HEARTBEAT_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = tx_heartbeat.send(Message::Ping(vec![])).await {
                error!("Error sending heartbeat: {}", e);
                break;
            }
        }
    });
    drop(tx);

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                info!("WebSocket closed by client");
                break;
            }
            Ok(Message::Pong(_)) => {
                debug!("Received pong from client");
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    // Aborting the snapshot task drops the subscription and stops its listener.
    snapshot_task.abort();
    forward_task.abort();
    heartbeat_task.abort();

    info!("WebSocket connection closed for {}", label);
}
