//! Full lifecycle test against a live server.
//!
//! # Design
//! Starts the server on a random port over an in-memory store, then drives
//! every client operation over real HTTP using ureq. Validates that request
//! building and response parsing agree with the actual server.

use todo_core::{ApiError, CreateTodo, HttpMethod, HttpResponse, TodoClient, UpdateTodo};
use todo_server::{in_memory_service, ApiSettings};

/// Execute an `HttpRequest` using ureq and return an `HttpResponse`.
///
/// Disables ureq's automatic status-code-as-error behavior so 4xx/5xx
/// responses are returned as data rather than `Err`, letting the core
/// client handle status interpretation.
fn execute(req: todo_core::HttpRequest) -> HttpResponse {
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent();

    let mut response = if req.method.has_body() {
        let builder = match req.method {
            HttpMethod::Patch => agent.patch(&req.path),
            _ => agent.post(&req.path),
        };
        match req.body {
            Some(body) => builder.content_type("application/json").send(body.as_bytes()),
            None => builder.send_empty(),
        }
    } else {
        match req.method {
            HttpMethod::Delete => agent.delete(&req.path).call(),
            _ => agent.get(&req.path).call(),
        }
    }
    .expect("HTTP transport error");

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            Some((name.as_str().to_string(), value.to_str().ok()?.to_string()))
        })
        .collect();
    let body = response.body_mut().read_to_string().unwrap_or_default();

    HttpResponse {
        status,
        headers,
        body,
    }
}

fn start_server() -> TodoClient {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            todo_server::run(listener, in_memory_service(), ApiSettings::default()).await
        })
        .unwrap();
    });

    TodoClient::new(&format!("http://{addr}"))
}

#[test]
fn crud_lifecycle() {
    let client = start_server();

    // Step 1: health. Every response carries a server-assigned request id.
    let response = execute(client.build_health());
    let request_id = response.request_id().map(str::to_owned);
    assert_eq!(request_id.as_deref().map(str::len), Some(36));
    assert_eq!(response.header("Content-Type"), Some("application/json"));
    assert!(client.parse_health(response).unwrap());

    // Step 2: list should be empty.
    let page = client
        .parse_list_todos(execute(client.build_list_todos(1, 10)))
        .unwrap();
    assert!(page.results.is_empty(), "expected empty list");
    assert_eq!(page.total_pages, 0);

    // Step 3: create a todo.
    let input = CreateTodo {
        text: "buy milk".to_string(),
    };
    let req = client.build_create_todo(&input).unwrap();
    let created = client.parse_create_todo(execute(req)).unwrap();
    assert_eq!(created.text, "buy milk");
    assert!(!created.completed);
    assert!(created.created_at <= chrono::Utc::now());
    let id = created.id.clone();

    // Step 4: invalid create is rejected with a reason.
    let input = CreateTodo {
        text: String::new(),
    };
    let req = client.build_create_todo(&input).unwrap();
    let err = client.parse_create_todo(execute(req)).unwrap_err();
    assert!(matches!(err, ApiError::Rejected(ref reason) if reason.contains("required")));

    // Step 5: get the created todo.
    let fetched = client.parse_get_todo(execute(client.build_get_todo(&id))).unwrap();
    assert_eq!(fetched, created);

    // Step 6: mark completed.
    let update = UpdateTodo {
        completed: Some(true),
        ..UpdateTodo::default()
    };
    let req = client.build_update_todo(&id, &update).unwrap();
    let updated = client.parse_update_todo(execute(req)).unwrap();
    assert_eq!(updated.text, "buy milk");
    assert!(updated.completed);

    // Step 7: page zero is treated as page one.
    let page = client
        .parse_list_todos(execute(client.build_list_todos(0, 10)))
        .unwrap();
    assert_eq!(page.page, 1);
    assert_eq!(page.total, 1);
    assert_eq!(page.total_pages, 1);
    assert_eq!(page.results[0].id, id);

    // Step 8: delete.
    client.parse_delete_todo(execute(client.build_delete_todo(&id))).unwrap();

    // Step 9: get after delete should be NotFound.
    let err = client.parse_get_todo(execute(client.build_get_todo(&id))).unwrap_err();
    assert!(matches!(err, ApiError::NotFound));

    // Step 10: delete again should be NotFound.
    let err = client.parse_delete_todo(execute(client.build_delete_todo(&id))).unwrap_err();
    assert!(matches!(err, ApiError::NotFound));
}
