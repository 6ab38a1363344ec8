use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::collections::HashSet;
use tracing::{error, info};

use super::{
    ensure_id, BatchUpdate, Collection, DocumentRef, DocumentStore, Query, Record, StoreError,
    Subscription, ID_FIELD,
};
use crate::feed::ChangeFeed;

/// Document store on a single Postgres JSONB table (see `db::init_db`).
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    feed: ChangeFeed,
}

fn into_record(value: Value) -> Result<Record, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

fn without_id(mut patch: Record) -> Record {
    patch.remove(ID_FIELD);
    patch
}

impl PgDocumentStore {
    pub fn new(pool: PgPool, feed: ChangeFeed) -> Self {
        Self { pool, feed }
    }

    async fn fetch(&self, collection: Collection, query: &Query) -> Result<Vec<Record>, StoreError> {
        let mut sql = String::from(
            "SELECT data FROM global.documents WHERE collection = $1 AND data @> $2",
        );

        match &query.sort {
            Some(sort) => sql.push_str(&format!(
                " ORDER BY data -> $3 {}, created_at ASC",
                sort.direction.as_sql()
            )),
            None => sql.push_str(" ORDER BY created_at ASC, id ASC"),
        }

        let limit_param = if query.sort.is_some() { "$4" } else { "$3" };
        if query.limit.is_some() {
            sql.push_str(&format!(" LIMIT {}", limit_param));
        }

        let mut statement = sqlx::query(&sql)
            .bind(collection.as_str())
            .bind(Json(query.filter_object()));

        if let Some(sort) = &query.sort {
            statement = statement.bind(sort.field.clone());
        }
        if let Some(limit) = query.limit {
            statement = statement.bind(limit as i64);
        }

        let rows = statement.fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|row| {
                let Json(data): Json<Value> = row.try_get("data")?;
                into_record(data)
            })
            .collect()
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn create(
        &self,
        collection: Collection,
        mut record: Record,
    ) -> Result<String, StoreError> {
        let id = ensure_id(&mut record);

        sqlx::query(
            r#"
            INSERT INTO global.documents (collection, id, data, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data
            "#,
        )
        .bind(collection.as_str())
        .bind(&id)
        .bind(Json(Value::Object(record)))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to insert {} document: {}", collection, e);
            StoreError::Database(e)
        })?;

        self.feed.publish(collection).await;
        Ok(id)
    }

    async fn read(&self, collection: Collection, id: &str) -> Result<Option<Record>, StoreError> {
        let row = sqlx::query("SELECT data FROM global.documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let Json(data): Json<Value> = row.try_get("data")?;
                Ok(Some(into_record(data)?))
            }
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Record,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE global.documents SET data = data || $3 WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(Json(Value::Object(without_id(patch))))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(collection, id));
        }

        self.feed.publish(collection).await;
        Ok(())
    }

    async fn remove(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM global.documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(collection, id));
        }

        self.feed.publish(collection).await;
        Ok(())
    }

    async fn get_all(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<Record>, StoreError> {
        self.fetch(collection, query).await
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
            async move { store.fetch(collection, &query).await }
        }))
    }

    async fn batch_update(&self, updates: Vec<BatchUpdate>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            StoreError::Database(e)
        })?;

        let mut touched = HashSet::new();
        for update in updates {
            let result = sqlx::query(
                "UPDATE global.documents SET data = data || $3 WHERE collection = $1 AND id = $2",
            )
            .bind(update.collection.as_str())
            .bind(&update.id)
            .bind(Json(Value::Object(without_id(update.data))))
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                // Dropping the transaction rolls it back.
                return Err(StoreError::not_found(update.collection, update.id));
            }
            touched.insert(update.collection);
        }

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            StoreError::Database(e)
        })?;

        for collection in touched {
            self.feed.publish(collection).await;
        }
        Ok(())
    }

    async fn batch_delete(&self, targets: Vec<DocumentRef>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut touched = HashSet::new();
        for target in targets {
            let result =
                sqlx::query("DELETE FROM global.documents WHERE collection = $1 AND id = $2")
                    .bind(target.collection.as_str())
                    .bind(&target.id)
                    .execute(&mut *tx)
                    .await?;
            if result.rows_affected() > 0 {
                touched.insert(target.collection);
            }
        }

        tx.commit().await?;

        info!("Batch deleted documents in {} collection(s)", touched.len());
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
        let row = sqlx::query(
            r#"
            UPDATE global.documents
            SET data = jsonb_set(
                data,
                ARRAY[$3::text],
                to_jsonb(GREATEST(COALESCE((data ->> $3)::bigint, 0) + $4, 0))
            )
            WHERE collection = $1 AND id = $2
            RETURNING (data ->> $3)::bigint AS value
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(field)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(collection, id))?;

        let value: i64 = row.try_get("value")?;

        self.feed.publish(collection).await;
        Ok(value)
    }
}
