//! HTTP view layer.
//!
//! # Design
//! Handlers parse transport input, call `TodoService`, and map the result to
//! a status code. This is the only place `TodoError` becomes an HTTP status.
//! Store failures surface as a short per-endpoint message with status 500;
//! the underlying cause was already logged by the service.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{debug, error};
use uuid::Uuid;

use crate::config::ApiSettings;
use crate::error::{TodoError, ValidationError};
use crate::model::{PageRequest, Todo, TodoFilter, TodoPage};
use crate::service::{TodoChanges, TodoService};

#[derive(Clone)]
struct AppState {
    service: TodoService,
    settings: ApiSettings,
}

/// Builds the router with tracing and `x-request-id` propagation.
pub fn app(service: TodoService, settings: ApiSettings) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<axum::body::Body>| {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id,
        )
    });

    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todos/", get(list_todos).post(create_todo))
        .route(
            "/todos/{id}",
            get(get_todo)
                .put(update_todo)
                .patch(update_todo)
                .delete(delete_todo),
        )
        .route("/health", get(health))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(trace)
        .layer(SetRequestIdLayer::x_request_id(RequestUuid))
        .with_state(AppState { service, settings })
}

#[derive(Clone, Copy, Default)]
struct RequestUuid;

impl MakeRequestId for RequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// A JSON `{"error": ...}` response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Maps a service error, hiding store failures behind `unavailable`.
    fn from_service(err: TodoError, unavailable: &'static str) -> Self {
        match err {
            TodoError::Validation(reason) => Self::new(StatusCode::BAD_REQUEST, reason.to_string()),
            TodoError::NotFound => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            TodoError::Storage(_) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, unavailable),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Raw list query. Values are kept as strings so bad input falls back to
/// defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub completed: Option<String>,
}

impl ListParams {
    /// Page window with defaults, a floor of 1 and `max_page_size` as ceiling.
    pub fn page_request(&self, max_page_size: u64) -> PageRequest {
        let page = int_param(self.page.as_deref(), PageRequest::DEFAULT_PAGE);
        let page_size = int_param(self.page_size.as_deref(), PageRequest::DEFAULT_PAGE_SIZE);
        PageRequest::new(page, page_size.min(max_page_size.max(1)))
    }

    pub fn filter(&self) -> TodoFilter {
        match self.completed.as_deref().map(str::trim) {
            Some("true" | "1") => TodoFilter::completed(true),
            Some("false" | "0") => TodoFilter::completed(false),
            _ => TodoFilter::all(),
        }
    }
}

/// Parses an integer parameter. Missing or unparsable values yield
/// `default`; anything below 1 is raised to 1.
fn int_param(raw: Option<&str>, default: u64) -> u64 {
    match raw.map(|value| value.trim().parse::<i64>()) {
        Some(Ok(n)) => n.max(1).unsigned_abs(),
        _ => default,
    }
}

async fn list_todos(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<TodoPage>, ApiError> {
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "ignoring malformed query");
            ListParams::default()
        }
    };
    let page = params.page_request(state.settings.max_page_size);

    state
        .service
        .list_todos(page, params.filter())
        .await
        .map(Json)
        .map_err(|err| {
            error!(page = page.page(), page_size = page.page_size(), "error fetching todos");
            ApiError::from_service(err, "Unable to fetch todos")
        })
}

async fn create_todo(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Todo>), ApiError> {
    let body = json_body(body)?;
    let text = body.get("text").and_then(Value::as_str);

    let todo = state
        .service
        .create_todo(text)
        .await
        .map_err(|err| ApiError::from_service(err, "Unable to create todo"))?;
    Ok((StatusCode::CREATED, Json(todo)))
}

async fn get_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Todo>, ApiError> {
    match state.service.get_todo(&id).await {
        Ok(Some(todo)) => Ok(Json(todo)),
        Ok(None) => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            TodoError::NotFound.to_string(),
        )),
        Err(err) => Err(ApiError::from_service(err, "Unable to fetch todo")),
    }
}

async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Todo>, ApiError> {
    let body = json_body(body)?;
    let changes = changes_from(&body)
        .map_err(|reason| ApiError::from_service(reason.into(), "Unable to update todo"))?;

    state
        .service
        .update_todo(&id, changes)
        .await
        .map(Json)
        .map_err(|err| ApiError::from_service(err, "Unable to update todo"))
}

async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .delete_todo(&id)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|err| ApiError::from_service(err, "Unable to delete todo"))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let service = state.service.clone();
    // A panicking probe must still answer 503.
    let healthy = match tokio::spawn(async move { service.health_check().await }).await {
        Ok(healthy) => healthy,
        Err(err) => {
            error!(error = %err, "health check failed");
            false
        }
    };

    if healthy {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "error" })),
        )
    }
}

/// Unwraps a JSON body. A request without a JSON content type is treated as
/// an empty body so that it fails field validation instead.
fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(Value::Null),
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "rejected request body");
            Err(ApiError::new(StatusCode::BAD_REQUEST, "Invalid JSON body"))
        }
    }
}

fn changes_from(body: &Value) -> Result<TodoChanges, ValidationError> {
    let text = body
        .get("text")
        .map(|value| value.as_str().map(str::to_owned));
    let completed = match body.get("completed") {
        None => None,
        Some(Value::Bool(completed)) => Some(*completed),
        Some(_) => return Err(ValidationError::InvalidCompleted),
    };
    Ok(TodoChanges { text, completed })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, page_size: Option<&str>) -> ListParams {
        ListParams {
            page: page.map(str::to_string),
            page_size: page_size.map(str::to_string),
            completed: None,
        }
    }

    #[test]
    fn missing_params_use_defaults() {
        let req = params(None, None).page_request(100);
        assert_eq!((req.page(), req.page_size()), (1, 10));
    }

    #[test]
    fn unparsable_params_use_defaults() {
        let req = params(Some("two"), Some("1.5")).page_request(100);
        assert_eq!((req.page(), req.page_size()), (1, 10));
    }

    #[test]
    fn small_params_clamp_to_one() {
        let req = params(Some("0"), Some("-4")).page_request(100);
        assert_eq!((req.page(), req.page_size()), (1, 1));
    }

    #[test]
    fn page_size_is_capped() {
        let req = params(Some(" 3 "), Some("5000")).page_request(100);
        assert_eq!((req.page(), req.page_size()), (3, 100));
    }

    #[test]
    fn completed_param_builds_filter() {
        let mut p = params(None, None);
        assert_eq!(p.filter(), TodoFilter::all());
        p.completed = Some("true".to_string());
        assert_eq!(p.filter(), TodoFilter::completed(true));
        p.completed = Some("0".to_string());
        assert_eq!(p.filter(), TodoFilter::completed(false));
        p.completed = Some("maybe".to_string());
        assert_eq!(p.filter(), TodoFilter::all());
    }

    #[test]
    fn changes_distinguish_absent_and_non_string_text() {
        let changes = changes_from(&json!({ "completed": true })).unwrap();
        assert_eq!(changes.text, None);
        assert_eq!(changes.completed, Some(true));

        let changes = changes_from(&json!({ "text": 5 })).unwrap();
        assert_eq!(changes.text, Some(None));

        let changes = changes_from(&json!({ "text": "hi" })).unwrap();
        assert_eq!(changes.text, Some(Some("hi".to_string())));

        assert_eq!(
            changes_from(&json!({ "completed": "yes" })),
            Err(ValidationError::InvalidCompleted)
        );
    }
}
