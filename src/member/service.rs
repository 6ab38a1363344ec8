use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::member::model::Member;
use crate::store::{from_record, Collection, DocumentStore, Query, SortDirection, StoreError};

/// Read-only provider of the member directory.
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn members(&self) -> Result<Vec<Member>, StoreError>;
}

/// Directory backed by the `members` collection.
#[derive(Clone)]
pub struct StoreMemberDirectory {
    store: Arc<dyn DocumentStore>,
}

impl StoreMemberDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MemberDirectory for StoreMemberDirectory {
    async fn members(&self) -> Result<Vec<Member>, StoreError> {
        let query = Query::new().sort_by("lastName", SortDirection::Ascending);
        let records = self.store.get_all(Collection::Members, &query).await?;

        Ok(records
            .into_iter()
            .filter_map(|record| match from_record::<Member>(record) {
                Ok(member) => Some(member),
                Err(e) => {
                    warn!("Skipping malformed member record: {}", e);
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::to_record;

    #[tokio::test]
    async fn test_directory_reads_members_sorted_by_last_name() {
        let store = Arc::new(MemoryStore::default());
        for member in [Member::new("m2", "Bob", "Lee"), Member::new("m1", "Jane", "Doe")] {
            store
                .create(Collection::Members, to_record(&member).unwrap())
                .await
                .unwrap();
        }
        let mut broken = serde_json::Map::new();
        broken.insert("id".to_string(), serde_json::json!("m3"));
        store.create(Collection::Members, broken).await.unwrap();

        let directory = StoreMemberDirectory::new(store);
        let members = directory.members().await.unwrap();

        let ids: Vec<_> = members.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        assert_eq!(members[0].full_name(), "Jane Doe");
    }
}
