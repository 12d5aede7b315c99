use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, IndexModel};
use tracing::{info, warn};

use super::{
    filter_document, insert_document, parse_id, set_document, StoreResult, TodoDocument, TodoStore,
    TODOS_COLLECTION,
};
use crate::db::Connector;
use crate::error::StoreError;
use crate::model::{NewTodo, PageRequest, Todo, TodoFilter, TodoPatch};

/// `TodoStore` backed by the `todos` collection of a MongoDB deployment.
#[derive(Debug, Clone)]
pub struct MongoTodoStore {
    connector: Arc<Connector>,
}

impl MongoTodoStore {
    pub fn new(connector: Arc<Connector>) -> Self {
        Self { connector }
    }

    async fn collection(&self) -> StoreResult<Collection<TodoDocument>> {
        Ok(self.connector.collection(TODOS_COLLECTION).await?)
    }
}

/// Skip and limit for one page of `total` matching documents, or `None` when
/// the page starts past the end. The driver encodes both as signed 64-bit.
fn find_window(page: PageRequest, total: u64) -> Option<(u64, i64)> {
    let skip = page.skip();
    if skip >= total {
        return None;
    }
    let limit = i64::try_from(page.page_size()).unwrap_or(i64::MAX);
    Some((skip, limit))
}

#[async_trait]
impl TodoStore for MongoTodoStore {
    async fn create(&self, todo: NewTodo) -> StoreResult<Todo> {
        let collection = self.collection().await?;
        let inserted = collection
            .clone_with_type::<Document>()
            .insert_one(insert_document(&todo))
            .await?;
        let oid = inserted.inserted_id.as_object_id().ok_or_else(|| {
            StoreError::Corrupt(format!("unexpected inserted id {}", inserted.inserted_id))
        })?;

        // Re-read so callers get the stored form rather than the insert echo.
        let stored = collection
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("inserted todo {oid} missing on re-read")))?;
        Ok(stored.into())
    }

    async fn list(&self, page: PageRequest, filter: TodoFilter) -> StoreResult<(Vec<Todo>, u64)> {
        let total = self.count(filter).await?;
        let Some((skip, limit)) = find_window(page, total) else {
            return Ok((Vec::new(), total));
        };
        let docs: Vec<TodoDocument> = self
            .collection()
            .await?
            .find(filter_document(filter))
            .sort(doc! { "_id": 1 })
            .skip(skip)
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok((docs.into_iter().map(Todo::from).collect(), total))
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Todo>> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        let found = self.collection().await?.find_one(doc! { "_id": oid }).await?;
        Ok(found.map(Todo::from))
    }

    async fn update(&self, id: &str, patch: &TodoPatch) -> StoreResult<Option<Todo>> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        // An empty `$set` is rejected by the server.
        if patch.is_empty() {
            return self.get_by_id(id).await;
        }
        let updated = self
            .collection()
            .await?
            .find_one_and_update(doc! { "_id": oid }, doc! { "$set": set_document(patch) })
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated.map(Todo::from))
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let Some(oid) = parse_id(id) else {
            return Ok(false);
        };
        let result = self.collection().await?.delete_one(doc! { "_id": oid }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn count(&self, filter: TodoFilter) -> StoreResult<u64> {
        Ok(self
            .collection()
            .await?
            .count_documents(filter_document(filter))
            .await?)
    }

    async fn ensure_indexes(&self) {
        let collection = match self.collection().await {
            Ok(collection) => collection,
            Err(err) => {
                warn!(error = %err, "skipping index creation");
                return;
            }
        };

        let indexes = [
            IndexModel::builder().keys(doc! { "created_at": 1 }).build(),
            IndexModel::builder().keys(doc! { "text": "text" }).build(),
        ];
        for index in indexes {
            let keys = index.keys.clone();
            if let Err(err) = collection.create_index(index).await {
                warn!(keys = %keys, error = %err, "failed to create index");
                return;
            }
        }
        info!("indexes created or verified");
    }

    async fn health_check(&self) -> bool {
        self.connector.health_check().await
    }
}
