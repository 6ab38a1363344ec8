use std::sync::Arc;
use tracing::warn;

use crate::comment::model::{Comment, CommentPatch};
use crate::event::model::EventType;
use crate::store::{
    from_record, to_record, Collection, DocumentStore, Filter, Query, SortDirection, StoreError,
    TypedSubscription,
};

/// Typed query options for the `comments` collection. Always oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentQuery {
    pub event_id: Option<String>,
    pub event_type: Option<EventType>,
    pub division_id: Option<String>,
}

impl CommentQuery {
    /// Every comment on an event, optionally narrowed to one division.
    pub fn thread(event_type: EventType, event_id: &str, division_id: Option<&str>) -> Self {
        Self {
            event_id: Some(event_id.to_string()),
            event_type: Some(event_type),
            division_id: division_id.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn into_query(self) -> Query {
        let mut query = Query::new().sort_by("createdAt", SortDirection::Ascending);
        if let Some(event_id) = self.event_id {
            query.filters.push(Filter::eq("eventId", event_id));
        }
        if let Some(event_type) = self.event_type {
            query.filters.push(Filter::eq("eventType", event_type.as_str()));
        }
        if let Some(division_id) = self.division_id {
            query.filters.push(Filter::eq("divisionId", division_id));
        }
        query
    }
}

/// CRUD and live queries over the `comments` collection.
#[derive(Clone)]
pub struct CommentStore {
    store: Arc<dyn DocumentStore>,
}

impl CommentStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Stores `comment` under its id, generating one if the id is empty.
    pub async fn create(&self, mut comment: Comment) -> Result<Comment, StoreError> {
        let id = self
            .store
            .create(Collection::Comments, to_record(&comment)?)
            .await?;
        comment.id = id;
        Ok(comment)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Comment>, StoreError> {
        match self.store.read(Collection::Comments, id).await? {
            Some(record) => Ok(Some(from_record(record)?)),
            None => Ok(None),
        }
    }

    pub async fn update(&self, id: &str, patch: &CommentPatch) -> Result<(), StoreError> {
        self.store
            .update(Collection::Comments, id, to_record(patch)?)
            .await
    }

    pub async fn list(&self, query: CommentQuery) -> Result<Vec<Comment>, StoreError> {
        let records = self
            .store
            .get_all(Collection::Comments, &query.into_query())
            .await?;

        Ok(records
            .into_iter()
            .filter_map(|record| match from_record::<Comment>(record) {
                Ok(comment) => Some(comment),
                Err(e) => {
                    warn!("Skipping malformed comment document: {}", e);
                    None
                }
            })
            .collect())
    }

    pub async fn subscribe(
        &self,
        query: CommentQuery,
    ) -> Result<TypedSubscription<Comment>, StoreError> {
        let subscription = self
            .store
            .subscribe(Collection::Comments, query.into_query())
            .await?;
        Ok(TypedSubscription::new(subscription))
    }

    /// Atomically moves `replyCount` by `delta`; returns the new count.
    pub async fn adjust_reply_count(&self, id: &str, delta: i64) -> Result<i64, StoreError> {
        self.store
            .increment(Collection::Comments, id, "replyCount", delta)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_query_filters() {
        let query = CommentQuery::thread(EventType::League, "e1", Some("d1")).into_query();

        assert_eq!(
            query.filters,
            vec![
                Filter::eq("eventId", "e1"),
                Filter::eq("eventType", "league"),
                Filter::eq("divisionId", "d1"),
            ]
        );
        assert_eq!(
            query.sort.map(|s| s.direction),
            Some(SortDirection::Ascending)
        );
    }

    #[test]
    fn test_thread_without_division_spans_all_divisions() {
        let query = CommentQuery::thread(EventType::Tournament, "e1", None).into_query();
        assert_eq!(
            query.filters,
            vec![Filter::eq("eventId", "e1"), Filter::eq("eventType", "tournament")]
        );
    }
}
