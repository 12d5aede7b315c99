//! Todo list backend.
//!
//! # Overview
//! A small CRUD service for todos, persisted in a MongoDB `todos` collection
//! and exposed over HTTP with axum.
//!
//! # Design
//! - `db::Connector` owns the pooled client and is passed explicitly to the
//!   store; there is no process-wide connection.
//! - `store::TodoStore` is the record access seam. `MongoTodoStore` is the
//!   production implementation and `MemoryTodoStore` backs tests and local
//!   runs.
//! - `service::TodoService` validates input and returns typed errors; `api`
//!   is the only layer that knows about status codes.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod service;
pub mod store;
pub mod telemetry;

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;

pub use api::app;
pub use config::{ApiSettings, Config, StoreBackend};
pub use error::{DbError, StoreError, TodoError, ValidationError};
pub use model::{PageRequest, Todo, TodoFilter, TodoPage};
pub use service::{TodoChanges, TodoService};
pub use store::{MemoryTodoStore, MongoTodoStore, TodoStore};

/// Serves the API on `listener` until the process exits.
pub async fn run(
    listener: TcpListener,
    service: TodoService,
    settings: ApiSettings,
) -> Result<(), std::io::Error> {
    axum::serve(listener, app(service, settings)).await
}

/// Serves the API until `shutdown` resolves, then drains open connections.
pub async fn run_until<F>(
    listener: TcpListener,
    service: TodoService,
    settings: ApiSettings,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app(service, settings))
        .with_graceful_shutdown(shutdown)
        .await
}

/// A service over a fresh in-memory store.
pub fn in_memory_service() -> TodoService {
    TodoService::new(Arc::new(MemoryTodoStore::new()))
}
