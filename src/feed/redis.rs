use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{ChangeEvent, FeedError};

/// Pub/sub channel carrying change events between nodes.
pub const CHANGES_CHANNEL: &str = "pickleball:changes";

/// Redis side of the change feed.
#[derive(Clone)]
pub struct RedisRelay {
    client: Client,
    publisher: ConnectionManager,
}

impl RedisRelay {
    pub async fn connect(client: Client) -> Result<Self, FeedError> {
        let publisher = ConnectionManager::new(client.clone()).await?;
        info!("Connected change feed to Redis");
        Ok(Self { client, publisher })
    }

    pub async fn publish(&self, event: &ChangeEvent) -> Result<(), FeedError> {
        let payload = serde_json::to_string(event)?;
        let mut connection = self.publisher.clone();
        connection
            .publish::<_, _, ()>(CHANGES_CHANNEL, payload)
            .await?;
        Ok(())
    }

    /// Re-broadcasts events from other nodes until the pub/sub stream ends.
    pub async fn forward_remote(
        &self,
        sender: broadcast::Sender<ChangeEvent>,
        origin: Uuid,
    ) -> Result<(), FeedError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(CHANGES_CHANNEL).await?;
        info!("Subscribed to Redis channel: {}", CHANGES_CHANNEL);

        let mut messages = pubsub.on_message();
        while let Some(msg) = messages.next().await {
            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    error!("Failed to get message payload: {}", e);
                    continue;
                }
            };

            let event: ChangeEvent = match serde_json::from_str(&payload) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Ignoring malformed change event: {}", e);
                    continue;
                }
            };

            if event.origin == origin {
                continue;
            }

            let _ = sender.send(event);
        }

        warn!("Redis change feed stream ended");
        Ok(())
    }
}
