use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use webshim_tasks::{
    ExtensionClient, InvocationError, InvocationEvent, InvocationSource, RunnerConfig, TaskRunner,
};

#[derive(Clone, Default)]
struct FakeRuntimeApi {
    register_status: Option<StatusCode>,
    omit_identifier: bool,
    events: Arc<Mutex<VecDeque<Value>>>,
    registrations: Arc<Mutex<Vec<(String, Value)>>>,
    next_calls: Arc<Mutex<Vec<String>>>,
}

async fn register(
    State(api): State<FakeRuntimeApi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let name = headers
        .get("lambda-extension-name")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let wants_shutdown = body["events"]
        .as_array()
        .is_some_and(|events| events.iter().any(|e| e.as_str() == Some("SHUTDOWN")));
    api.registrations.lock().unwrap().push((name, body));

    // Internal extensions may not subscribe to SHUTDOWN.
    if wants_shutdown {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "errorMessage": "ShutdownEventNotSupportedForInternalExtension",
                "errorType": "Extension.InvalidEventType"
            })),
        )
            .into_response();
    }
    if let Some(status) = api.register_status {
        return (status, "denied").into_response();
    }
    if api.omit_identifier {
        return (StatusCode::OK, Json(json!({}))).into_response();
    }
    (
        StatusCode::OK,
        [("lambda-extension-identifier", "ext-123")],
        Json(json!({"functionName": "demo"})),
    )
        .into_response()
}

async fn next(State(api): State<FakeRuntimeApi>, headers: HeaderMap) -> axum::response::Response {
    let id = headers
        .get("lambda-extension-identifier")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    api.next_calls.lock().unwrap().push(id);

    let event = api.events.lock().unwrap().pop_front();
    match event {
        Some(event) => (StatusCode::OK, Json(event)).into_response(),
        // Park like the real API would when nothing is pending.
        None => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            StatusCode::OK.into_response()
        }
    }
}

struct TestServer {
    runtime_api: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(api: FakeRuntimeApi) -> Self {
        let app = Router::new()
            .route("/2020-01-01/extension/register", post(register))
            .route("/2020-01-01/extension/event/next", get(next))
            .with_state(api);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            runtime_api: addr.to_string(),
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn registers_as_internal_extension_for_invoke_only() {
    let api = FakeRuntimeApi::default();
    let srv = TestServer::spawn(api.clone()).await;

    let client = ExtensionClient::register(&srv.runtime_api, "background-task-extension")
        .await
        .unwrap();

    assert_eq!(client.extension_id(), "ext-123");
    let registrations = api.registrations.lock().unwrap().clone();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].0, "background-task-extension");
    assert_eq!(registrations[0].1, json!({"events": ["INVOKE"]}));
}

#[tokio::test]
async fn next_invocation_sends_identifier_and_decodes_events() {
    let api = FakeRuntimeApi::default();
    api.events.lock().unwrap().extend([
        json!({"eventType": "INVOKE", "requestId": "req-1", "deadlineMs": 10}),
        json!({"eventType": "SHUTDOWN", "shutdownReason": "spindown"}),
    ]);
    let srv = TestServer::spawn(api.clone()).await;

    let mut client = ExtensionClient::register(&srv.runtime_api, "ext").await.unwrap();

    assert_eq!(
        client.next_invocation().await.unwrap(),
        InvocationEvent::Invoke {
            request_id: Some("req-1".to_string()),
            deadline_ms: Some(10),
        }
    );
    assert!(matches!(
        client.next_invocation().await.unwrap(),
        InvocationEvent::Shutdown { .. }
    ));
    assert_eq!(*api.next_calls.lock().unwrap(), vec!["ext-123", "ext-123"]);
}

#[tokio::test]
async fn rejected_registration_is_a_status_error() {
    let api = FakeRuntimeApi {
        register_status: Some(StatusCode::FORBIDDEN),
        ..Default::default()
    };
    let srv = TestServer::spawn(api).await;

    let err = ExtensionClient::register(&srv.runtime_api, "ext").await.unwrap_err();
    match err {
        InvocationError::Status { status, body } => {
            assert_eq!(status, 403);
            assert_eq!(body, "denied");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_identifier_header_is_reported() {
    let api = FakeRuntimeApi {
        omit_identifier: true,
        ..Default::default()
    };
    let srv = TestServer::spawn(api).await;

    let err = ExtensionClient::register(&srv.runtime_api, "ext").await.unwrap_err();
    assert!(matches!(err, InvocationError::MissingHeader(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runner_serves_invocation_then_drains_on_handle_shutdown() {
    let api = FakeRuntimeApi::default();
    api.events
        .lock()
        .unwrap()
        .push_back(json!({"eventType": "INVOKE", "requestId": "req-1"}));
    let srv = TestServer::spawn(api.clone()).await;
    let client = ExtensionClient::register(&srv.runtime_api, "ext").await.unwrap();

    let (queue, handle) = TaskRunner::start(client, RunnerConfig::default()).unwrap();
    let ran = Arc::new(Mutex::new(Vec::new()));
    let record = |label: &'static str| {
        let ran = ran.clone();
        move || {
            ran.lock().unwrap().push(label);
            Ok(())
        }
    };
    queue.enqueue("first", record("first"));
    queue.enqueue("second", record("second"));
    queue.mark_done();

    for _ in 0..500 {
        if handle.stats().invocations_completed == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(*ran.lock().unwrap(), vec!["first", "second"]);

    // The listener is now parked on `next`; SIGTERM lands here as a handle shutdown.
    queue.enqueue("late", record("late"));
    handle.shutdown().await;

    assert_eq!(*ran.lock().unwrap(), vec!["first", "second", "late"]);
}
