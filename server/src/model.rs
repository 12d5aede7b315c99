//! Typed records for the todo service.
//!
//! # Design
//! `Todo` is the only shape that leaves the record access layer. Store-native
//! documents (with their `_id` key) live in `store` and are mapped into `Todo`
//! there, so nothing above the store ever sees a native key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single todo item as exposed by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// External string form of the store's native key.
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub completed: bool,
}

/// Fields for a todo that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTodo {
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub completed: bool,
}

impl NewTodo {
    /// A fresh, incomplete todo stamped with the current UTC time.
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            created_at: Utc::now(),
            completed: false,
        }
    }
}

/// Partial field-set update. Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoPatch {
    pub text: Option<String>,
    pub completed: Option<bool>,
}

impl TodoPatch {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.completed.is_none()
    }
}

/// Filter applied to `list` and `count`. The default matches every todo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TodoFilter {
    pub completed: Option<bool>,
}

impl TodoFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
        }
    }

    pub fn matches(&self, completed: bool) -> bool {
        self.completed.map_or(true, |wanted| wanted == completed)
    }
}

/// A 1-indexed page window. Both fields are always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    page_size: u64,
}

impl PageRequest {
    pub const DEFAULT_PAGE: u64 = 1;
    pub const DEFAULT_PAGE_SIZE: u64 = 10;

    /// Builds a window, clamping zero values up to 1.
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Number of matching items excluded from the front of the ordering.
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAGE, Self::DEFAULT_PAGE_SIZE)
    }
}

/// One window of todos plus pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoPage {
    pub results: Vec<Todo>,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl TodoPage {
    pub fn new(results: Vec<Todo>, request: PageRequest, total: u64) -> Self {
        Self {
            results,
            page: request.page(),
            page_size: request.page_size(),
            total,
            total_pages: total_pages(total, request.page_size()),
        }
    }
}

/// `ceil(total / page_size)`; zero items means zero pages.
pub fn total_pages(total: u64, page_size: u64) -> u64 {
    total.div_ceil(page_size.max(1))
}
