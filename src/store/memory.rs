use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{
    ensure_id, BatchUpdate, Collection, DocumentRef, DocumentStore, Query, Record, StoreError,
    Subscription, ID_FIELD,
};
use crate::feed::ChangeFeed;

struct Entry {
    seq: u64,
    record: Record,
}

#[derive(Default)]
struct Collections {
    next_seq: u64,
    documents: HashMap<Collection, HashMap<String, Entry>>,
}

/// In-process document store. Used when no database is configured and in tests.
///
/// Unsorted queries return documents in insertion order.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<Collections>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new(feed: ChangeFeed) -> Self {
        Self {
            state: Arc::new(RwLock::new(Collections::default())),
            feed,
        }
    }

    async fn snapshot(&self, collection: Collection, query: &Query) -> Vec<Record> {
        let state = self.state.read().await;
        let mut entries: Vec<&Entry> = state
            .documents
            .get(&collection)
            .map(|docs| docs.values().collect())
            .unwrap_or_default();
        entries.sort_by_key(|entry| entry.seq);

        query.apply(entries.into_iter().map(|entry| entry.record.clone()).collect())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(ChangeFeed::local())
    }
}

fn merge(record: &mut Record, patch: Record) {
    for (field, value) in patch {
        if field == ID_FIELD {
            continue;
        }
        record.insert(field, value);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(
        &self,
        collection: Collection,
        mut record: Record,
    ) -> Result<String, StoreError> {
        let id = ensure_id(&mut record);
        {
            let mut state = self.state.write().await;
            let seq = state.next_seq;
            state.next_seq += 1;
            state
                .documents
                .entry(collection)
                .or_default()
                .insert(id.clone(), Entry { seq, record });
        }

        self.feed.publish(collection).await;
        Ok(id)
    }

    async fn read(&self, collection: Collection, id: &str) -> Result<Option<Record>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .map(|entry| entry.record.clone()))
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Record,
    ) -> Result<(), StoreError> {
        {
            let mut state = self.state.write().await;
            let entry = state
                .documents
                .get_mut(&collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| StoreError::not_found(collection, id))?;
            merge(&mut entry.record, patch);
        }

        self.feed.publish(collection).await;
        Ok(())
    }

    async fn remove(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        {
            let mut state = self.state.write().await;
            state
                .documents
                .get_mut(&collection)
                .and_then(|docs| docs.remove(id))
                .ok_or_else(|| StoreError::not_found(collection, id))?;
        }

        self.feed.publish(collection).await;
        Ok(())
    }

    async fn get_all(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<Record>, StoreError> {
        Ok(self.snapshot(collection, query).await)
    }

    async fn subscribe(
        &self,
        collection: Collection,
        query: Query,
    ) -> Result<Subscription, StoreError> {
        let changes = self.feed.listen();
        let store = self.clone();

        Ok(Subscription::spawn(collection, changes, move || {
            let store = store.clone();
            let query = query.clone();
            async move { Ok(store.snapshot(collection, &query).await) }
        }))
    }

    async fn batch_update(&self, updates: Vec<BatchUpdate>) -> Result<(), StoreError> {
        let mut touched = HashSet::new();
        {
            let mut state = self.state.write().await;

            for update in &updates {
                let exists = state
                    .documents
                    .get(&update.collection)
                    .map(|docs| docs.contains_key(&update.id))
                    .unwrap_or(false);
                if !exists {
                    return Err(StoreError::not_found(update.collection, update.id.clone()));
                }
            }

            for update in updates {
                if let Some(entry) = state
                    .documents
                    .get_mut(&update.collection)
                    .and_then(|docs| docs.get_mut(&update.id))
                {
                    merge(&mut entry.record, update.data);
                    touched.insert(update.collection);
                }
            }
        }

        for collection in touched {
            self.feed.publish(collection).await;
        }
        Ok(())
    }

    async fn batch_delete(&self, targets: Vec<DocumentRef>) -> Result<(), StoreError> {
        let mut touched = HashSet::new();
        {
            let mut state = self.state.write().await;
            for target in targets {
                let removed = state
                    .documents
                    .get_mut(&target.collection)
                    .and_then(|docs| docs.remove(&target.id));
                if removed.is_some() {
                    touched.insert(target.collection);
                }
            }
        }

        for collection in touched {
            self.feed.publish(collection).await;
        }
        Ok(())
    }

    async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<i64, StoreError> {
        let value = {
            let mut state = self.state.write().await;
            let entry = state
                .documents
                .get_mut(&collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| StoreError::not_found(collection, id))?;

            let current = entry.record.get(field).and_then(Value::as_i64).unwrap_or(0);
            let next = (current + delta).max(0);
            entry.record.insert(field.to_string(), Value::from(next));
            next
        };

        self.feed.publish(collection).await;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SortDirection;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("test records must be objects"),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id_when_missing() {
        let store = MemoryStore::default();

        let generated = store
            .create(Collection::Comments, record(json!({"content": "hi"})))
            .await
            .unwrap();
        let kept = store
            .create(Collection::Members, record(json!({"id": "m1", "firstName": "Jane"})))
            .await
            .unwrap();

        assert!(!generated.is_empty());
        assert_eq!(kept, "m1");

        let stored = store
            .read(Collection::Comments, &generated)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["id"], json!(generated));
        assert_eq!(stored["content"], json!("hi"));
    }

    #[tokio::test]
    async fn test_update_merges_fields_and_keeps_id() {
        let store = MemoryStore::default();
        let id = store
            .create(
                Collection::Notifications,
                record(json!({"id": "n1", "isRead": false, "title": "t"})),
            )
            .await
            .unwrap();

        store
            .update(
                Collection::Notifications,
                &id,
                record(json!({"id": "other", "isRead": true})),
            )
            .await
            .unwrap();

        let stored = store
            .read(Collection::Notifications, "n1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["id"], json!("n1"));
        assert_eq!(stored["isRead"], json!(true));
        assert_eq!(stored["title"], json!("t"));
    }

    #[tokio::test]
    async fn test_missing_documents_report_not_found() {
        let store = MemoryStore::default();

        let update = store
            .update(Collection::Comments, "nope", Record::new())
            .await;
        assert!(matches!(update, Err(StoreError::NotFound { .. })));

        let remove = store.remove(Collection::Comments, "nope").await;
        assert!(matches!(remove, Err(StoreError::NotFound { .. })));

        let increment = store
            .increment(Collection::Comments, "nope", "replyCount", 1)
            .await;
        assert!(matches!(increment, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_increment_starts_at_zero_and_never_goes_negative() {
        let store = MemoryStore::default();
        store
            .create(Collection::Tournaments, record(json!({"id": "t1"})))
            .await
            .unwrap();

        assert_eq!(
            store
                .increment(Collection::Tournaments, "t1", "commentCount", 1)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .increment(Collection::Tournaments, "t1", "commentCount", -3)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_concurrent_increments_do_not_lose_updates() {
        let store = MemoryStore::default();
        store
            .create(Collection::Comments, record(json!({"id": "c1", "replyCount": 0})))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .increment(Collection::Comments, "c1", "replyCount", 1)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = store.read(Collection::Comments, "c1").await.unwrap().unwrap();
        assert_eq!(stored["replyCount"], json!(20));
    }

    #[tokio::test]
    async fn test_get_all_preserves_insertion_order_without_sort() {
        let store = MemoryStore::default();
        for id in ["b", "a", "c"] {
            store
                .create(Collection::Members, record(json!({"id": id})))
                .await
                .unwrap();
        }

        let ids: Vec<String> = store
            .get_all(Collection::Members, &Query::new())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_batch_update_is_all_or_nothing() {
        let store = MemoryStore::default();
        store
            .create(Collection::Notifications, record(json!({"id": "n1", "isRead": false})))
            .await
            .unwrap();

        let result = store
            .batch_update(vec![
                BatchUpdate {
                    collection: Collection::Notifications,
                    id: "n1".to_string(),
                    data: record(json!({"isRead": true})),
                },
                BatchUpdate {
                    collection: Collection::Notifications,
                    id: "missing".to_string(),
                    data: record(json!({"isRead": true})),
                },
            ])
            .await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        let stored = store
            .read(Collection::Notifications, "n1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["isRead"], json!(false));
    }

    #[tokio::test]
    async fn test_batch_delete_skips_missing_documents() {
        let store = MemoryStore::default();
        store
            .create(Collection::Notifications, record(json!({"id": "n1"})))
            .await
            .unwrap();

        store
            .batch_delete(vec![
                DocumentRef {
                    collection: Collection::Notifications,
                    id: "n1".to_string(),
                },
                DocumentRef {
                    collection: Collection::Notifications,
                    id: "gone".to_string(),
                },
            ])
            .await
            .unwrap();

        assert!(store
            .read(Collection::Notifications, "n1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_subscription_emits_full_snapshots() {
        let store = MemoryStore::default();
        store
            .create(
                Collection::Notifications,
                record(json!({"id": "n1", "recipientId": "m1", "createdAt": 1})),
            )
            .await
            .unwrap();

        let query = Query::new()
            .filter("recipientId", "m1")
            .sort_by("createdAt", SortDirection::Descending);
        let mut subscription = store
            .subscribe(Collection::Notifications, query)
            .await
            .unwrap();

        let initial = subscription.next().await.unwrap();
        assert_eq!(initial.len(), 1);

        store
            .create(
                Collection::Notifications,
                record(json!({"id": "other", "recipientId": "m2", "createdAt": 3})),
            )
            .await
            .unwrap();
        store
            .create(
                Collection::Notifications,
                record(json!({"id": "n2", "recipientId": "m1", "createdAt": 2})),
            )
            .await
            .unwrap();

        let next = timeout(Duration::from_secs(1), subscription.next())
            .await
            .unwrap()
            .unwrap();
        let ids: Vec<_> = next.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("n2"), json!("n1")]);
    }

    #[tokio::test]
    async fn test_unsubscribe_does_not_affect_writes() {
        let store = MemoryStore::default();
        let subscription = store
            .subscribe(Collection::Comments, Query::new())
            .await
            .unwrap();
        subscription.unsubscribe();

        let id = store
            .create(Collection::Comments, record(json!({"content": "after"})))
            .await
            .unwrap();
        assert!(store.read(Collection::Comments, &id).await.unwrap().is_some());
    }
}
