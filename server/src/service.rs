//! Todo use-case service.
//!
//! # Responsibility
//! - Validate and normalize todo text before it reaches the store.
//! - Stamp creation metadata and compute pagination metadata.
//! - Collapse store failures into `TodoError::Storage`, logging the detail.
//!
//! # Invariants
//! - Every persisted `text` is trimmed and 1..=200 characters long.
//! - The service never inspects store-native keys.

use std::sync::Arc;

use tracing::{error, info};

use crate::error::{Operation, StoreError, TodoError, ValidationError, MAX_TODO_LENGTH};
use crate::model::{NewTodo, PageRequest, Todo, TodoFilter, TodoPage, TodoPatch};
use crate::store::TodoStore;

/// Requested changes to an existing todo.
///
/// `text: Some(None)` means the caller named `text` but supplied no string,
/// which fails validation just like a missing text on create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoChanges {
    pub text: Option<Option<String>>,
    pub completed: Option<bool>,
}

/// Checks a todo text and returns its trimmed form.
///
/// Length is counted in characters after trimming surrounding whitespace.
pub fn validate_text(text: Option<&str>) -> Result<&str, ValidationError> {
    let text = match text {
        Some(text) if !text.is_empty() => text,
        _ => return Err(ValidationError::Missing),
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Blank);
    }
    if trimmed.chars().count() > MAX_TODO_LENGTH {
        return Err(ValidationError::TooLong);
    }
    Ok(trimmed)
}

#[derive(Clone)]
pub struct TodoService {
    store: Arc<dyn TodoStore>,
}

impl TodoService {
    pub fn new(store: Arc<dyn TodoStore>) -> Self {
        Self { store }
    }

    pub async fn create_todo(&self, text: Option<&str>) -> Result<Todo, TodoError> {
        let text = validate_text(text)?;
        let todo = self
            .store
            .create(NewTodo::now(text))
            .await
            .map_err(|err| storage_failure(Operation::Create, None, err))?;
        info!(todo_id = %todo.id, "todo created");
        Ok(todo)
    }

    pub async fn list_todos(
        &self,
        page: PageRequest,
        filter: TodoFilter,
    ) -> Result<TodoPage, TodoError> {
        let (todos, total) = self
            .store
            .list(page, filter)
            .await
            .map_err(|err| storage_failure(Operation::List, None, err))?;
        Ok(TodoPage::new(todos, page, total))
    }

    /// `Ok(None)` when no todo has this id.
    pub async fn get_todo(&self, id: &str) -> Result<Option<Todo>, TodoError> {
        self.store
            .get_by_id(id)
            .await
            .map_err(|err| storage_failure(Operation::Get, Some(id), err))
    }

    pub async fn update_todo(&self, id: &str, changes: TodoChanges) -> Result<Todo, TodoError> {
        let text = match &changes.text {
            Some(text) => Some(validate_text(text.as_deref())?.to_string()),
            None => None,
        };
        let patch = TodoPatch {
            text,
            completed: changes.completed,
        };

        match self.store.update(id, &patch).await {
            Ok(Some(todo)) => {
                info!(todo_id = id, "todo updated");
                Ok(todo)
            }
            Ok(None) => Err(TodoError::NotFound),
            Err(err) => Err(storage_failure(Operation::Update, Some(id), err)),
        }
    }

    pub async fn delete_todo(&self, id: &str) -> Result<(), TodoError> {
        match self.store.delete(id).await {
            Ok(true) => {
                info!(todo_id = id, "todo deleted");
                Ok(())
            }
            Ok(false) => Err(TodoError::NotFound),
            Err(err) => Err(storage_failure(Operation::Delete, Some(id), err)),
        }
    }

    /// Creates the store's secondary indexes. Never fails.
    pub async fn ensure_ready(&self) {
        self.store.ensure_indexes().await;
    }

    pub async fn health_check(&self) -> bool {
        self.store.health_check().await
    }
}

fn storage_failure(op: Operation, todo_id: Option<&str>, err: StoreError) -> TodoError {
    error!(operation = ?op, todo_id, error = %err, "todo store operation failed");
    TodoError::Storage(op)
}
