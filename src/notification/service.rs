use chrono::{DateTime, Utc};
use serde_json::{json, Map};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::notification::model::{
    Notification, NotificationDraft, NotificationError, NotificationQuery,
};
use crate::store::{
    from_record, now_millis, to_record, BatchUpdate, Collection, DocumentRef, DocumentStore, Query,
    Record, StoreError, TypedSubscription,
};

/// Notification store and read-state manager.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn DocumentStore>,
}

fn decode_all(records: Vec<Record>) -> Vec<Notification> {
    records
        .into_iter()
        .filter_map(|record| match from_record::<Notification>(record) {
            Ok(notification) => Some(notification),
            Err(e) => {
                warn!("Skipping malformed notification document: {}", e);
                None
            }
        })
        .collect()
}

fn is_read(record: &Record) -> bool {
    record
        .get("isRead")
        .and_then(|value| value.as_bool())
        .unwrap_or(false)
}

fn read_patch(at: DateTime<Utc>) -> Map<String, serde_json::Value> {
    let mut patch = Map::new();
    patch.insert("isRead".to_string(), json!(true));
    patch.insert("readAt".to_string(), json!(at.timestamp_millis()));
    patch
}

impl NotificationService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Persists a single draft.
    pub async fn create_notification(
        &self,
        draft: NotificationDraft,
    ) -> Result<Notification, NotificationError> {
        if draft.recipient_id.trim().is_empty() {
            return Err(NotificationError::ValidationError(
                "Notification recipient is required".to_string(),
            ));
        }

        let notification = draft.into_notification(Uuid::new_v4().to_string());
        self.store
            .create(Collection::Notifications, to_record(&notification)?)
            .await?;

        info!(
            "Created {} notification {} for recipient {}",
            notification.notification_type.as_str(),
            notification.id,
            notification.recipient_id
        );
        Ok(notification)
    }

    /// Persists every draft it can. Failures are logged and skipped, never returned.
    pub async fn create_best_effort(&self, drafts: Vec<NotificationDraft>) -> Vec<Notification> {
        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let recipient = draft.recipient_id.clone();
            let kind = draft.notification_type;
            match self.create_notification(draft).await {
                Ok(notification) => created.push(notification),
                Err(e) => error!(
                    "Failed to create {} notification for {}: {}",
                    kind.as_str(),
                    recipient,
                    e
                ),
            }
        }
        created
    }

    pub async fn get_notification(&self, id: &str) -> Result<Notification, NotificationError> {
        let record = self
            .store
            .read(Collection::Notifications, id)
            .await?
            .ok_or_else(|| NotificationError::NotFound(id.to_string()))?;
        Ok(from_record(record)?)
    }

    /// Marks one notification read. Already-read notifications are returned unchanged,
    /// so `readAt` keeps the time of the first read.
    pub async fn mark_as_read(&self, id: &str) -> Result<Notification, NotificationError> {
        let mut notification = self.get_notification(id).await?;
        if notification.is_read {
            return Ok(notification);
        }

        let now = now_millis();
        self.store
            .update(Collection::Notifications, id, read_patch(now))
            .await
            .map_err(|e| NotificationError::from_store(e, id))?;

        notification.is_read = true;
        notification.read_at = Some(now);
        Ok(notification)
    }

    /// Marks every currently unread notification of `recipient_id` read in one batch.
    /// Notifications created after the snapshot stay unread. Ones read or deleted since
    /// the snapshot are skipped, so `readAt` is never rewritten. Returns how many changed.
    pub async fn mark_all_as_read(&self, recipient_id: &str) -> Result<usize, NotificationError> {
        let unread = self
            .store
            .get_all(
                Collection::Notifications,
                &NotificationQuery::for_recipient(recipient_id)
                    .unread()
                    .into_query(),
            )
            .await?;

        let mut pending = Vec::with_capacity(unread.len());
        for id in unread
            .iter()
            .filter_map(|record| record.get("id").and_then(|id| id.as_str()))
        {
            match self.store.read(Collection::Notifications, id).await? {
                Some(current) if !is_read(&current) => pending.push(id.to_string()),
                _ => debug!("Notification {} changed since snapshot, skipping", id),
            }
        }

        if pending.is_empty() {
            return Ok(0);
        }

        let now = now_millis();
        let updates: Vec<BatchUpdate> = pending
            .iter()
            .map(|id| BatchUpdate {
                collection: Collection::Notifications,
                id: id.clone(),
                data: read_patch(now),
            })
            .collect();

        let count = match self.store.batch_update(updates).await {
            Ok(()) => pending.len(),
            Err(StoreError::NotFound { id, .. }) => {
                warn!(
                    "Notification {} vanished during read-all, updating one by one",
                    id
                );
                self.mark_each_read(&pending, now).await?
            }
            Err(e) => return Err(e.into()),
        };

        info!("Marked {} notifications read for {}", count, recipient_id);
        Ok(count)
    }

    async fn mark_each_read(
        &self,
        ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<usize, NotificationError> {
        let mut count = 0;
        for id in ids {
            match self
                .store
                .update(Collection::Notifications, id, read_patch(now))
                .await
            {
                Ok(()) => count += 1,
                Err(StoreError::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(count)
    }

    /// Hard delete.
    pub async fn delete_notification(&self, id: &str) -> Result<(), NotificationError> {
        self.store
            .remove(Collection::Notifications, id)
            .await
            .map_err(|e| NotificationError::from_store(e, id))
    }

    /// Newest first.
    pub async fn list_for_recipient(
        &self,
        recipient_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Notification>, NotificationError> {
        let query = NotificationQuery {
            limit,
            ..NotificationQuery::for_recipient(recipient_id)
        };
        let records = self
            .store
            .get_all(Collection::Notifications, &query.into_query())
            .await?;
        Ok(decode_all(records))
    }

    pub async fn unread_count(&self, recipient_id: &str) -> Result<usize, NotificationError> {
        let records = self
            .store
            .get_all(
                Collection::Notifications,
                &NotificationQuery::for_recipient(recipient_id)
                    .unread()
                    .into_query(),
            )
            .await?;
        Ok(records.len())
    }

    /// Live view of a recipient's notifications, newest first.
    pub async fn subscribe(
        &self,
        recipient_id: &str,
    ) -> Result<TypedSubscription<Notification>, NotificationError> {
        let subscription = self
            .store
            .subscribe(
                Collection::Notifications,
                NotificationQuery::for_recipient(recipient_id).into_query(),
            )
            .await?;
        Ok(TypedSubscription::new(subscription))
    }

    /// Deletes every notification created before `cutoff`. Returns how many went.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let all = self
            .store
            .get_all(Collection::Notifications, &Query::new())
            .await?;

        let targets: Vec<DocumentRef> = decode_all(all)
            .into_iter()
            .filter(|notification| notification.created_at < cutoff)
            .map(|notification| DocumentRef {
                collection: Collection::Notifications,
                id: notification.id,
            })
            .collect();

        let count = targets.len();
        if count > 0 {
            self.store.batch_delete(targets).await?;
        }
        Ok(count)
    }
}
