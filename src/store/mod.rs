//! Document persistence collaborator.
//!
//! Every collection holds JSON objects keyed by a string `id`. Backends implement
//! [`DocumentStore`]; the domain services only ever talk to the trait.

pub mod memory;
pub mod postgres;
pub mod query;
pub mod subscription;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub use query::{Filter, Query, Sort, SortDirection};
pub use subscription::{Subscription, TypedSubscription};

/// A stored document: a JSON object which always carries its `id`.
pub type Record = Map<String, Value>;

/// Field holding the document identifier inside every record.
pub const ID_FIELD: &str = "id";

/// Collections known to this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Comments,
    Notifications,
    Members,
    Tournaments,
    Leagues,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Comments => "comments",
            Collection::Notifications => "notifications",
            Collection::Members => "members",
            Collection::Tournaments => "tournaments",
            Collection::Leagues => "leagues",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a batch update: shallow-merge `data` into `collection/id`.
#[derive(Debug, Clone)]
pub struct BatchUpdate {
    pub collection: Collection,
    pub id: String,
    pub data: Record,
}

/// Address of a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub collection: Collection,
    pub id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: Collection, id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

impl StoreError {
    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            collection,
            id: id.into(),
        }
    }
}

/// Generic CRUD + live-query access to the document collections.
///
/// `update` is a shallow merge of the given fields. `increment` is atomic with respect
/// to other writers of the same document and never takes a counter below zero.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a record. A non-empty string `id` in the record is kept, otherwise one is
    /// generated. Returns the id.
    async fn create(&self, collection: Collection, record: Record) -> Result<String, StoreError>;

    async fn read(&self, collection: Collection, id: &str) -> Result<Option<Record>, StoreError>;

    async fn update(&self, collection: Collection, id: &str, patch: Record)
        -> Result<(), StoreError>;

    async fn remove(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    async fn get_all(&self, collection: Collection, query: &Query)
        -> Result<Vec<Record>, StoreError>;

    /// Live query. Every emission is the full matching set.
    async fn subscribe(&self, collection: Collection, query: Query)
        -> Result<Subscription, StoreError>;

    /// Applies all updates or none of them.
    async fn batch_update(&self, updates: Vec<BatchUpdate>) -> Result<(), StoreError>;

    async fn batch_delete(&self, targets: Vec<DocumentRef>) -> Result<(), StoreError>;

    /// Adds `delta` to a numeric field (missing counts as 0) and returns the new value.
    async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<i64, StoreError>;
}

/// Serializes a typed document into a store record.
pub fn to_record<T: Serialize>(value: &T) -> Result<Record, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

/// Deserializes a store record into a typed document.
pub fn from_record<T: serde::de::DeserializeOwned>(record: Record) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// Current time at the millisecond precision documents are stored with.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    Utc.timestamp_millis_opt(now.timestamp_millis())
        .single()
        .unwrap_or(now)
}

/// Returns the record's id, generating one when missing or empty.
pub(crate) fn ensure_id(record: &mut Record) -> String {
    match record.get(ID_FIELD).and_then(Value::as_str) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            let id = uuid::Uuid::new_v4().to_string();
            record.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            id
        }
    }
}
