//! Record access layer.
//!
//! # Responsibility
//! - Map domain operations onto store queries (`TodoStore`).
//! - Own the translation between store-native documents and `Todo`.
//!
//! # Invariants
//! - The native `_id` key never leaves this module. Returned todos carry its
//!   hex form in `id`.
//! - A malformed `id` is treated as "no such todo", never as an error.
//! - Listing is ordered by ascending native key, which is insertion order.

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{self, doc, Document};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::model::{NewTodo, PageRequest, Todo, TodoFilter, TodoPatch};

mod memory;
mod mongo;

pub use memory::MemoryTodoStore;
pub use mongo::MongoTodoStore;

pub const TODOS_COLLECTION: &str = "todos";

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence contract for todos.
#[async_trait]
pub trait TodoStore: Send + Sync {
    /// Inserts a todo and returns its canonical stored form.
    async fn create(&self, todo: NewTodo) -> StoreResult<Todo>;

    /// Returns one page of matching todos and the total match count.
    async fn list(&self, page: PageRequest, filter: TodoFilter) -> StoreResult<(Vec<Todo>, u64)>;

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Todo>>;

    /// Applies `patch` with merge semantics. `None` when nothing matched.
    async fn update(&self, id: &str, patch: &TodoPatch) -> StoreResult<Option<Todo>>;

    /// Hard delete. Reports whether a todo was removed.
    async fn delete(&self, id: &str) -> StoreResult<bool>;

    async fn count(&self, filter: TodoFilter) -> StoreResult<u64>;

    /// Best effort; failures are logged.
    async fn ensure_indexes(&self);

    async fn health_check(&self) -> bool;
}

/// A todo as stored in the `todos` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TodoDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub text: String,
    pub created_at: bson::DateTime,
    #[serde(default)]
    pub completed: bool,
}

impl From<TodoDocument> for Todo {
    fn from(doc: TodoDocument) -> Self {
        Todo {
            id: doc.id.to_hex(),
            text: doc.text,
            created_at: doc.created_at.to_chrono(),
            completed: doc.completed,
        }
    }
}

/// Parses an external id into a native key. Malformed ids yield `None`.
pub(crate) fn parse_id(id: &str) -> Option<ObjectId> {
    match ObjectId::parse_str(id) {
        Ok(oid) => Some(oid),
        Err(err) => {
            debug!(todo_id = id, error = %err, "malformed todo id");
            None
        }
    }
}

/// The insert payload. `_id` is left for the store to assign.
pub(crate) fn insert_document(todo: &NewTodo) -> Document {
    doc! {
        "text": todo.text.as_str(),
        "created_at": bson::DateTime::from_chrono(todo.created_at),
        "completed": todo.completed,
    }
}

pub(crate) fn filter_document(filter: TodoFilter) -> Document {
    let mut query = Document::new();
    if let Some(completed) = filter.completed {
        query.insert("completed", completed);
    }
    query
}

/// The `$set` body for a patch. Only named fields appear.
pub(crate) fn set_document(patch: &TodoPatch) -> Document {
    let mut set = Document::new();
    if let Some(text) = &patch.text {
        set.insert("text", text.as_str());
    }
    if let Some(completed) = patch.completed {
        set.insert("completed", completed);
    }
    set
}
