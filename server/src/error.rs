//! Error taxonomy for the todo service.
//!
//! # Design
//! Each layer has its own error type. `DbError` comes from the connector,
//! `StoreError` from the record access layer, and `TodoError` from the
//! service. Only `TodoError` reaches the HTTP layer, and its `Display` output
//! is always a short static message that is safe to show to users. Details
//! of store failures are logged where they occur and never cross into
//! `TodoError`.

use std::time::Duration;

use thiserror::Error;

pub const MAX_TODO_LENGTH: usize = 200;

/// Errors raised while connecting to or probing the document store.
#[derive(Debug, Error)]
pub enum DbError {
    /// The connection URI could not be parsed into client options.
    #[error("invalid store uri: {0}")]
    InvalidUri(#[source] mongodb::error::Error),

    /// The store did not answer within the connection timeout.
    #[error("store unreachable: {0}")]
    Connection(#[source] mongodb::error::Error),

    /// The startup wait gave up. Carries the last probe failure.
    #[error("timed out waiting for store after {}s: {last_error}", .waited.as_secs())]
    Timeout { waited: Duration, last_error: String },
}

/// Errors raised by the record access layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Connection(#[from] DbError),

    #[error("store operation failed: {0}")]
    Storage(#[from] mongodb::error::Error),

    /// A stored document could not be mapped into a `Todo`.
    #[error("corrupt document: {0}")]
    Corrupt(String),
}

/// Reasons a todo text is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Text is required and must be a string")]
    Missing,

    #[error("Text cannot be empty or whitespace only")]
    Blank,

    #[error("Text must be {} characters or fewer", MAX_TODO_LENGTH)]
    TooLong,

    #[error("Completed must be a boolean")]
    InvalidCompleted,
}

/// Which service operation failed against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    List,
    Get,
    Update,
    Delete,
}

/// Errors returned by `TodoService`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TodoError {
    /// User-correctable input problem.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Todo not found")]
    NotFound,

    /// The store failed. The cause has already been logged.
    #[error("{}", storage_message(.0))]
    Storage(Operation),
}

fn storage_message(op: &Operation) -> &'static str {
    match op {
        Operation::Create => "Failed to create todo",
        Operation::List => "Failed to list todos",
        Operation::Get => "Failed to fetch todo",
        Operation::Update => "Failed to update todo",
        Operation::Delete => "Failed to delete todo",
    }
}
