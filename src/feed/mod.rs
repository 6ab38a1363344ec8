//! Change notifications that drive live store subscriptions.
//!
//! Writes publish a [`ChangeEvent`] naming the touched collection. Events fan out
//! in-process over a broadcast channel; with Redis configured they are also relayed
//! to (and received from) other nodes.

pub mod redis;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, warn};
use uuid::Uuid;

use crate::store::Collection;

const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub collection: Collection,
    /// Node that performed the write.
    pub origin: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Redis error: {0}")]
    RedisError(#[from] ::redis::RedisError),

    #[error("Invalid change event: {0}")]
    DecodeError(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
    origin: Uuid,
    relay: Option<redis::RedisRelay>,
}

impl ChangeFeed {
    /// Single-node feed.
    pub fn local() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            sender,
            origin: Uuid::new_v4(),
            relay: None,
        }
    }

    /// Feed relaying events through Redis pub/sub.
    pub async fn with_redis(client: ::redis::Client) -> Result<Self, FeedError> {
        let relay = redis::RedisRelay::connect(client).await?;
        Ok(Self {
            relay: Some(relay),
            ..Self::local()
        })
    }

    pub fn listen(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Announces a write. Never fails the write itself.
    pub async fn publish(&self, collection: Collection) {
        let event = ChangeEvent {
            collection,
            origin: self.origin,
        };

        // No receivers just means nobody is subscribed right now.
        let _ = self.sender.send(event.clone());

        if let Some(relay) = &self.relay {
            if let Err(e) = relay.publish(&event).await {
                warn!("Failed to relay {} change event: {}", collection, e);
            }
        }
    }

    /// Starts forwarding events published by other nodes. `None` without Redis.
    pub fn spawn_bridge(&self) -> Option<JoinHandle<()>> {
        let relay = self.relay.clone()?;
        let sender = self.sender.clone();
        let origin = self.origin;

        Some(tokio::spawn(async move {
            if let Err(e) = relay.forward_remote(sender, origin).await {
                error!("Change feed bridge stopped: {}", e);
            }
        }))
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_listeners() {
        let feed = ChangeFeed::local();
        let mut first = feed.listen();
        let mut second = feed.listen();

        feed.publish(Collection::Notifications).await;

        let event = first.recv().await.unwrap();
        assert_eq!(event.collection, Collection::Notifications);
        assert_eq!(event.origin, feed.origin);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_publish_without_listeners_is_silent() {
        let feed = ChangeFeed::local();
        feed.publish(Collection::Comments).await;
        assert!(feed.spawn_bridge().is_none());
    }

    #[test]
    fn test_change_event_wire_format() {
        let event = ChangeEvent {
            collection: Collection::Comments,
            origin: Uuid::parse_str("123e4567-e89b-12d3-a456-426614174000").unwrap(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"collection":"comments","origin":"123e4567-e89b-12d3-a456-426614174000"}"#
        );
    }
}
