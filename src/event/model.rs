use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::member::model::MemberId;
use crate::notification::model::NotificationPriority;
use crate::store::Collection;

/// Kind of event a comment thread or notification belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Tournament,
    League,
}

impl EventType {
    pub fn from_str_value(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "tournament" | "tournaments" => Some(EventType::Tournament),
            "league" | "leagues" => Some(EventType::League),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Tournament => "tournament",
            EventType::League => "league",
        }
    }

    /// Collection holding events of this kind.
    pub fn collection(&self) -> Collection {
        match self {
            EventType::Tournament => Collection::Tournaments,
            EventType::League => Collection::Leagues,
        }
    }
}

/// The slice of a tournament or league this subsystem needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRef {
    pub id: String,
    pub event_type: EventType,
    pub name: String,
}

impl EventRef {
    pub fn new(id: impl Into<String>, event_type: EventType, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            event_type,
            name: name.into(),
        }
    }

    /// Stand-in used when the event document cannot be loaded.
    pub fn unnamed(id: impl Into<String>, event_type: EventType) -> Self {
        let name = match event_type {
            EventType::Tournament => "a tournament",
            EventType::League => "a league",
        };
        Self::new(id, event_type, name)
    }
}

/// Event documents as stored; everything but the fields read here is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventRecord {
    #[serde(default)]
    pub name: Option<String>,
}

/// Details of an event change announced to participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventUpdate {
    pub summary: String,
}

/// Amount owed by unpaid participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDue {
    pub amount_cents: i64,
    pub due_date: Option<NaiveDate>,
}

/// Results published for an event, optionally for one division.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsPosted {
    pub division_id: Option<String>,
    pub summary: Option<String>,
}

/// Upcoming start of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventReminder {
    pub starts_at: DateTime<Utc>,
}

/// Which fan-out an event trigger request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    EventUpdate,
    PaymentReminder,
    ResultPosted,
    EventReminder,
}

/// Request to notify an explicit list of members about an event.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventTriggerRequest {
    pub kind: TriggerKind,

    /// Members to notify, already resolved by the caller (e.g. all unpaid participants).
    #[schema(example = json!(["m1", "m2"]))]
    pub recipients: Vec<MemberId>,

    #[serde(default)]
    #[schema(example = "Courts moved to the east complex")]
    pub summary: Option<String>,

    #[serde(default)]
    #[schema(example = 2500)]
    pub amount_cents: Option<i64>,

    #[serde(default)]
    #[schema(value_type = Option<String>, example = "2024-05-01")]
    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub division_id: Option<String>,

    /// Event start, epoch milliseconds.
    #[serde(default)]
    pub starts_at: Option<i64>,

    /// Replaces the priority derived from the notification type.
    #[serde(default)]
    pub priority: Option<NotificationPriority>,
}

/// Possible event trigger errors
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Event not found: {0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    PersistenceError(#[from] crate::store::StoreError),
}
