use async_trait::async_trait;
use mongodb::bson::{self, oid::ObjectId};
use tokio::sync::RwLock;

use super::{parse_id, StoreResult, TodoDocument, TodoStore};
use crate::model::{NewTodo, PageRequest, Todo, TodoFilter, TodoPatch};

/// Process-local `TodoStore`. Documents are kept in insertion order and go
/// through the same document mapping as the MongoDB store, so timestamps are
/// truncated to milliseconds and ids are object ids.
#[derive(Debug, Default)]
pub struct MemoryTodoStore {
    docs: RwLock<Vec<TodoDocument>>,
}

impl MemoryTodoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TodoStore for MemoryTodoStore {
    async fn create(&self, todo: NewTodo) -> StoreResult<Todo> {
        let doc = TodoDocument {
            id: ObjectId::new(),
            text: todo.text,
            created_at: bson::DateTime::from_chrono(todo.created_at),
            completed: todo.completed,
        };
        self.docs.write().await.push(doc.clone());
        Ok(doc.into())
    }

    async fn list(&self, page: PageRequest, filter: TodoFilter) -> StoreResult<(Vec<Todo>, u64)> {
        let docs = self.docs.read().await;
        let matching = docs.iter().filter(|doc| filter.matches(doc.completed));
        let total = matching.clone().count() as u64;
        let skip = usize::try_from(page.skip()).unwrap_or(usize::MAX);
        let take = usize::try_from(page.page_size()).unwrap_or(usize::MAX);
        let todos = matching
            .skip(skip)
            .take(take)
            .cloned()
            .map(Todo::from)
            .collect();
        Ok((todos, total))
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Todo>> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        let docs = self.docs.read().await;
        Ok(docs.iter().find(|doc| doc.id == oid).cloned().map(Todo::from))
    }

    async fn update(&self, id: &str, patch: &TodoPatch) -> StoreResult<Option<Todo>> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        let mut docs = self.docs.write().await;
        let Some(doc) = docs.iter_mut().find(|doc| doc.id == oid) else {
            return Ok(None);
        };
        if let Some(text) = &patch.text {
            doc.text = text.clone();
        }
        if let Some(completed) = patch.completed {
            doc.completed = completed;
        }
        Ok(Some(doc.clone().into()))
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let Some(oid) = parse_id(id) else {
            return Ok(false);
        };
        let mut docs = self.docs.write().await;
        let before = docs.len();
        docs.retain(|doc| doc.id != oid);
        Ok(docs.len() < before)
    }

    async fn count(&self, filter: TodoFilter) -> StoreResult<u64> {
        let docs = self.docs.read().await;
        Ok(docs.iter().filter(|doc| filter.matches(doc.completed)).count() as u64)
    }

    async fn ensure_indexes(&self) {}

    async fn health_check(&self) -> bool {
        true
    }
}
