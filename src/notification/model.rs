use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::{IntoParams, ToSchema};

use crate::member::model::MemberId;
use crate::store::{Filter, Query, SortDirection, StoreError};

pub type NotificationId = String;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    CommentReply,
    Mention,
    EventUpdate,
    PaymentReminder,
    ResultPosted,
    EventReminder,
}

impl NotificationType {
    pub const ALL: [NotificationType; 6] = [
        NotificationType::CommentReply,
        NotificationType::Mention,
        NotificationType::EventUpdate,
        NotificationType::PaymentReminder,
        NotificationType::ResultPosted,
        NotificationType::EventReminder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::CommentReply => "comment_reply",
            NotificationType::Mention => "mention",
            NotificationType::EventUpdate => "event_update",
            NotificationType::PaymentReminder => "payment_reminder",
            NotificationType::ResultPosted => "result_posted",
            NotificationType::EventReminder => "event_reminder",
        }
    }

    pub fn from_str_value(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value.trim().to_lowercase())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl NotificationPriority {
    pub fn from_str_value(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// A stored notification. Owned by exactly one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[schema(example = "5f0c9a52-7d8e-4d0e-9a35-2f1f2c3c4b5a")]
    pub id: NotificationId,

    #[schema(example = "m1")]
    pub recipient_id: MemberId,

    #[serde(rename = "type")]
    pub notification_type: NotificationType,

    #[schema(example = "You were mentioned")]
    pub title: String,

    #[schema(example = "Bob Lee mentioned you in a comment on Spring Open")]
    pub message: String,

    pub preview: String,

    #[schema(example = "at-sign")]
    pub icon: String,

    pub priority: NotificationPriority,

    pub is_read: bool,

    /// Epoch milliseconds of the first read.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    #[schema(value_type = Option<i64>)]
    pub read_at: Option<DateTime<Utc>>,

    /// Cross-references to the triggering event, comment and actor.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Map<String, Value>,

    /// Epoch milliseconds.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schema(value_type = i64)]
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Event id recorded in `data`, if any.
    pub fn event_id(&self) -> Option<&str> {
        self.data.get("eventId").and_then(Value::as_str)
    }
}

/// An unsaved notification as produced by the factory.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationDraft {
    pub recipient_id: MemberId,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub preview: String,
    pub icon: String,
    pub priority: NotificationPriority,
    pub data: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl NotificationDraft {
    /// Replaces the priority derived from the type.
    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn into_notification(self, id: NotificationId) -> Notification {
        Notification {
            id,
            recipient_id: self.recipient_id,
            notification_type: self.notification_type,
            title: self.title,
            message: self.message,
            preview: self.preview,
            icon: self.icon,
            priority: self.priority,
            is_read: false,
            read_at: None,
            data: self.data,
            created_at: self.created_at,
        }
    }
}

/// Typed query options for the `notifications` collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationQuery {
    pub recipient_id: Option<MemberId>,
    pub is_read: Option<bool>,
    pub notification_type: Option<NotificationType>,
    pub limit: Option<usize>,
}

impl NotificationQuery {
    pub fn for_recipient(recipient_id: impl Into<MemberId>) -> Self {
        Self {
            recipient_id: Some(recipient_id.into()),
            ..Self::default()
        }
    }

    pub fn unread(mut self) -> Self {
        self.is_read = Some(false);
        self
    }

    /// Always newest first.
    pub fn into_query(self) -> Query {
        let mut query = Query::new().sort_by("createdAt", SortDirection::Descending);
        if let Some(recipient_id) = self.recipient_id {
            query.filters.push(Filter::eq("recipientId", recipient_id));
        }
        if let Some(is_read) = self.is_read {
            query.filters.push(Filter::eq("isRead", is_read));
        }
        if let Some(kind) = self.notification_type {
            query.filters.push(Filter::eq("type", kind.as_str()));
        }
        query.limit = self.limit;
        query
    }
}

/// Read-state criterion for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReadStatus {
    Unread,
    Read,
}

/// Inclusive creation-time window; open ends are unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| *at >= from) && self.to.map_or(true, |to| *at <= to)
    }
}

/// Display filter. Every criterion is optional; present criteria are AND-combined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationFilter {
    pub read_status: Option<ReadStatus>,
    /// Any of these types. Empty means no type restriction.
    pub types: Vec<NotificationType>,
    pub event_id: Option<String>,
    pub date_range: Option<DateRange>,
    pub priority: Option<NotificationPriority>,
}

/// Query string accepted by the notification list endpoint.
#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationListParams {
    /// `unread` or `read`; omitted means all.
    #[schema(example = "unread")]
    pub read_status: Option<String>,

    /// Comma separated notification types.
    #[serde(rename = "type")]
    #[param(rename = "type")]
    #[schema(example = "mention,comment_reply")]
    pub types: Option<String>,

    #[schema(example = "high")]
    pub priority: Option<String>,

    pub event_id: Option<String>,

    /// Lower bound on creation time, epoch milliseconds.
    pub from: Option<i64>,

    /// Upper bound on creation time, epoch milliseconds.
    pub to: Option<i64>,
}

/// Counts shown next to the notification list.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSummary {
    pub total: usize,
    pub unread: usize,
    #[schema(value_type = Object)]
    pub by_type: std::collections::BTreeMap<NotificationType, usize>,
    pub most_recent: Option<Notification>,
}

/// Summary counts plus how many notifications warrant a badge
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub summary: NotificationSummary,
    #[schema(example = "2")]
    pub badge_count: usize,
}

/// Result of marking every notification read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MarkAllReadResponse {
    #[schema(example = "3")]
    pub updated: usize,
}

/// Possible notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification not found: {0}")]
    NotFound(NotificationId),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(#[from] StoreError),
}

impl NotificationError {
    /// Converts a store miss on a known id into `NotFound`.
    pub(crate) fn from_store(err: StoreError, id: &str) -> Self {
        match err {
            StoreError::NotFound { .. } => NotificationError::NotFound(id.to_string()),
            other => NotificationError::PersistenceError(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_notification_type_string_round_trip() {
        for kind in NotificationType::ALL {
            assert_eq!(NotificationType::from_str_value(kind.as_str()), Some(kind));
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert_eq!(NotificationType::from_str_value("unknown"), None);
    }

    #[test]
    fn test_notification_serializes_timestamps_as_millis() {
        let created_at = Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap();
        let notification = Notification {
            id: "n1".to_string(),
            recipient_id: "m1".to_string(),
            notification_type: NotificationType::Mention,
            title: "t".to_string(),
            message: "m".to_string(),
            preview: "p".to_string(),
            icon: "at-sign".to_string(),
            priority: NotificationPriority::Medium,
            is_read: false,
            read_at: None,
            data: Map::new(),
            created_at,
        };

        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(value["type"], "mention");
        assert_eq!(value["createdAt"], created_at.timestamp_millis());
        assert!(value["readAt"].is_null());

        let back: Notification = serde_json::from_value(value).unwrap();
        assert_eq!(back, notification);
    }

    #[test]
    fn test_query_lowers_to_filters() {
        let query = NotificationQuery::for_recipient("m1").unread().into_query();
        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.filters[0], Filter::eq("recipientId", "m1"));
        assert_eq!(query.filters[1], Filter::eq("isRead", false));
        assert_eq!(
            query.sort.map(|s| s.direction),
            Some(SortDirection::Descending)
        );
    }
}
