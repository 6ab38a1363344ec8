use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::event::model::{
    EventError, EventRecord, EventRef, EventReminder, EventTriggerRequest, EventType,
    EventUpdate, PaymentDue, ResultsPosted, TriggerKind,
};
use crate::member::model::MemberId;
use crate::notification::factory::{
    event_reminder_notifications, event_update_notifications, payment_reminder_notifications,
    result_posted_notifications,
};
use crate::notification::model::{Notification, NotificationDraft, NotificationPriority};
use crate::notification::service::NotificationService;
use crate::store::{from_record, DocumentStore, StoreError};

/// Field on tournament and league documents counting their comments.
pub const COMMENT_COUNT_FIELD: &str = "commentCount";

/// Read access to tournaments and leagues plus their comment counters.
#[derive(Clone)]
pub struct EventStore {
    store: Arc<dyn DocumentStore>,
}

impl EventStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get(
        &self,
        event_type: EventType,
        event_id: &str,
    ) -> Result<Option<EventRef>, StoreError> {
        let Some(record) = self.store.read(event_type.collection(), event_id).await? else {
            return Ok(None);
        };

        let event: EventRecord = from_record(record)?;
        Ok(Some(match event.name {
            Some(name) if !name.trim().is_empty() => EventRef::new(event_id, event_type, name),
            _ => EventRef::unnamed(event_id, event_type),
        }))
    }

    /// Like [`EventStore::get`], substituting an unnamed reference on a miss or error.
    pub async fn get_or_unnamed(&self, event_type: EventType, event_id: &str) -> EventRef {
        match self.get(event_type, event_id).await {
            Ok(Some(event)) => event,
            Ok(None) => EventRef::unnamed(event_id, event_type),
            Err(e) => {
                warn!("Failed to load {} {}: {}", event_type.as_str(), event_id, e);
                EventRef::unnamed(event_id, event_type)
            }
        }
    }

    /// Atomically moves the event's comment count by `delta`.
    pub async fn adjust_comment_count(
        &self,
        event_type: EventType,
        event_id: &str,
        delta: i64,
    ) -> Result<i64, StoreError> {
        self.store
            .increment(event_type.collection(), event_id, COMMENT_COUNT_FIELD, delta)
            .await
    }
}

/// Event-side notification triggers. Notifications are persisted best-effort.
#[derive(Clone)]
pub struct EventNotifier {
    events: EventStore,
    notifications: Arc<NotificationService>,
}

impl EventNotifier {
    pub fn new(events: EventStore, notifications: Arc<NotificationService>) -> Self {
        Self {
            events,
            notifications,
        }
    }

    pub async fn notify_event_update(
        &self,
        event: &EventRef,
        update: &EventUpdate,
        recipients: &[MemberId],
        priority: Option<NotificationPriority>,
    ) -> Vec<Notification> {
        self.deliver(event_update_notifications(event, update, recipients), priority).await
    }

    pub async fn send_payment_reminders(
        &self,
        event: &EventRef,
        payment: &PaymentDue,
        recipients: &[MemberId],
        priority: Option<NotificationPriority>,
    ) -> Vec<Notification> {
        self.deliver(payment_reminder_notifications(event, payment, recipients), priority).await
    }

    pub async fn notify_results_posted(
        &self,
        event: &EventRef,
        results: &ResultsPosted,
        recipients: &[MemberId],
        priority: Option<NotificationPriority>,
    ) -> Vec<Notification> {
        self.deliver(result_posted_notifications(event, results, recipients), priority).await
    }

    pub async fn send_event_reminders(
        &self,
        event: &EventRef,
        reminder: &EventReminder,
        recipients: &[MemberId],
        priority: Option<NotificationPriority>,
    ) -> Vec<Notification> {
        self.deliver(event_reminder_notifications(event, reminder, recipients), priority).await
    }

    async fn deliver(
        &self,
        drafts: Vec<NotificationDraft>,
        priority: Option<NotificationPriority>,
    ) -> Vec<Notification> {
        let drafts = match priority {
            Some(priority) => drafts
                .into_iter()
                .map(|draft| draft.with_priority(priority))
                .collect(),
            None => drafts,
        };
        self.notifications.create_best_effort(drafts).await
    }

    /// Validates a trigger request and runs the matching fan-out.
    pub async fn dispatch(
        &self,
        event_type: EventType,
        event_id: &str,
        request: EventTriggerRequest,
    ) -> Result<Vec<Notification>, EventError> {
        if request.recipients.iter().all(|r| r.trim().is_empty()) {
            return Err(EventError::ValidationError(
                "At least one recipient is required".to_string(),
            ));
        }

        let event = self
            .events
            .get(event_type, event_id)
            .await?
            .ok_or_else(|| EventError::NotFound(event_id.to_string()))?;

        let created = match request.kind {
            TriggerKind::EventUpdate => {
                let summary = request
                    .summary
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| {
                        EventError::ValidationError("summary is required".to_string())
                    })?;
                self.notify_event_update(
                    &event,
                    &EventUpdate { summary },
                    &request.recipients,
                    request.priority,
                )
                .await
            }
            TriggerKind::PaymentReminder => {
                let amount_cents = request.amount_cents.ok_or_else(|| {
                    EventError::ValidationError("amountCents is required".to_string())
                })?;
                if amount_cents <= 0 {
                    return Err(EventError::ValidationError(
                        "amountCents must be positive".to_string(),
                    ));
                }
                let payment = PaymentDue {
                    amount_cents,
                    due_date: request.due_date,
                };
                self.send_payment_reminders(&event, &payment, &request.recipients, request.priority)
                    .await
            }
            TriggerKind::ResultPosted => {
                let results = ResultsPosted {
                    division_id: request.division_id,
                    summary: request.summary,
                };
                self.notify_results_posted(&event, &results, &request.recipients, request.priority)
                    .await
            }
            TriggerKind::EventReminder => {
                let starts_at = request
                    .starts_at
                    .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
                    .ok_or_else(|| {
                        EventError::ValidationError("startsAt is required".to_string())
                    })?;
                self.send_event_reminders(
                    &event,
                    &EventReminder { starts_at },
                    &request.recipients,
                    request.priority,
                )
                .await
            }
        };

        info!(
            "Sent {} {:?} notifications for {} {}",
            created.len(),
            request.kind,
            event_type.as_str(),
            event_id
        );
        Ok(created)
    }
}
