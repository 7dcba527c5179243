use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use api_engine_http::{ApiResponse, ErrorKind, RequestConfig, RequestEngine};
use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

#[derive(Clone)]
struct MockResponse {
    status: StatusCode,
    body: Option<JsonValue>,
    delay: Duration,
}

impl MockResponse {
    fn json(status: StatusCode, body: JsonValue) -> Self {
        Self {
            status,
            body: Some(body),
            delay: Duration::from_millis(0),
        }
    }

    fn empty(status: StatusCode) -> Self {
        Self {
            status,
            body: None,
            delay: Duration::from_millis(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Debug)]
struct Recorded {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: String,
}

#[derive(Clone)]
struct MockState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
    hits: Arc<AtomicUsize>,
}

async fn handler(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state
        .recorded
        .lock()
        .expect("record mutex must not be poisoned")
        .push(Recorded {
            method,
            path: uri.path().to_owned(),
            headers,
            body,
        });

    let response = {
        let mut queue = state
            .responses
            .lock()
            .expect("response queue mutex must not be poisoned");
        queue.pop_front().unwrap_or_else(|| {
            MockResponse::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "no mock response available"}),
            )
        })
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    match response.body {
        Some(body) => (response.status, Json(body)).into_response(),
        None => response.status.into_response(),
    }
}

struct TestServer {
    base_url: String,
    hits: Arc<AtomicUsize>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn recorded(&self) -> Vec<Recorded> {
        self.recorded
            .lock()
            .expect("record mutex must not be poisoned")
            .clone()
    }
}

async fn spawn_server(responses: Vec<MockResponse>) -> TestServer {
    let state = MockState {
        responses: Arc::new(Mutex::new(responses.into())),
        recorded: Arc::default(),
        hits: Arc::new(AtomicUsize::new(0)),
    };

    let app = Router::new().fallback(handler).with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("mock server must run");
    });

    TestServer {
        base_url: format!("http://{address}/api/"),
        hits: state.hits,
        recorded: state.recorded,
        task,
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
struct User {
    id: u64,
    name: String,
}

fn kit() -> JsonValue {
    json!({"id": 1, "name": "Kit"})
}

#[tokio::test]
async fn cached_get_hits_server_once() {
    let server = spawn_server(vec![MockResponse::json(StatusCode::OK, kit())]).await;
    let api = RequestEngine::new(&server.base_url);
    let ttl = Some(Duration::from_secs(60));

    let first: User = api.get("/users/1", (), ttl).await.expect("get must succeed");
    let second: User = api.get("/users/1", (), ttl).await.expect("cached get");

    assert_eq!(first, second);
    assert_eq!(server.hits(), 1);
    let recorded = server.recorded();
    assert_eq!(recorded[0].method, Method::GET);
    assert_eq!(recorded[0].path, "/api/users/1");
    assert!(recorded[0].body.is_empty());
}

#[tokio::test]
async fn post_sends_json_body_and_merged_headers() {
    let server = spawn_server(vec![MockResponse::json(StatusCode::CREATED, kit())]).await;
    let api = RequestEngine::with_headers(
        &server.base_url,
        [("X-Client", "default"), ("X-Tenant", "acme")],
    );

    let new_user = User {
        id: 1,
        name: "Kit".to_owned(),
    };
    let created: User = api
        .post("/users", &new_user, RequestConfig::new().header("x-client", "call"))
        .await
        .expect("post must succeed");

    assert_eq!(created, new_user);
    let recorded = server.recorded();
    assert_eq!(recorded[0].method, Method::POST);
    assert_eq!(recorded[0].headers["x-client"], "call");
    assert_eq!(recorded[0].headers["x-tenant"], "acme");
    assert_eq!(recorded[0].headers["content-type"], "application/json");
    let sent: User = serde_json::from_str(&recorded[0].body).expect("body must be JSON");
    assert_eq!(sent, new_user);
}

#[tokio::test]
async fn patch_and_put_use_their_verbs() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::OK, kit()),
        MockResponse::json(StatusCode::OK, kit()),
    ])
    .await;
    let api = RequestEngine::new(&server.base_url);

    let _: User = api
        .patch("/users/1", &json!({"name": "Kit"}), ())
        .await
        .expect("patch must succeed");
    let _: User = api
        .put("/users/1", &kit(), ())
        .await
        .expect("put must succeed");

    let methods: Vec<Method> = server.recorded().into_iter().map(|r| r.method).collect();
    assert_eq!(methods, [Method::PATCH, Method::PUT]);
}

#[tokio::test]
async fn delete_accepts_no_content() {
    let server = spawn_server(vec![MockResponse::empty(StatusCode::NO_CONTENT)]).await;
    let api = RequestEngine::new(&server.base_url);

    api.delete::<()>("/users/1", ())
        .await
        .expect("delete must succeed");

    assert_eq!(server.recorded()[0].method, Method::DELETE);
}

#[tokio::test]
async fn send_returns_status_and_headers() {
    let server = spawn_server(vec![MockResponse::json(StatusCode::OK, kit())]).await;
    let api = RequestEngine::new(&server.base_url);

    let response: ApiResponse<User> = api
        .send("/users/1", RequestConfig::new())
        .await
        .expect("send must succeed");

    assert_eq!(response.status, 200);
    assert_eq!(response.status_text, "OK");
    assert_eq!(response.headers["content-type"], "application/json");
    assert_eq!(response.data.name, "Kit");
}

#[tokio::test]
async fn not_found_carries_body_and_skips_retries() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::NOT_FOUND, json!({"error": "no such user"})),
        MockResponse::json(StatusCode::OK, kit()),
    ])
    .await;
    let api = RequestEngine::new(&server.base_url);
    let config = RequestConfig::new()
        .retries(2)
        .retry_delay(Duration::from_millis(1));

    let err = api
        .get::<User>("/users/404", config, Some(Duration::from_secs(60)))
        .await
        .expect_err("must fail with 404");

    assert_eq!(err.status, 404);
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(err.response, Some(json!({"error": "no such user"})));
    assert_eq!(server.hits(), 1);
    assert_eq!(api.cache_len(), 0);
}

#[tokio::test]
async fn slow_server_times_out_with_408() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::OK, kit()).with_delay(Duration::from_millis(500))
    ])
    .await;
    let api = RequestEngine::new(&server.base_url);
    let config = RequestConfig::new()
        .timeout(Duration::from_millis(150))
        .retries(2)
        .retry_delay(Duration::from_millis(1));

    let err = api
        .get::<User>("/users/1", config, None)
        .await
        .expect_err("request must time out");

    assert_eq!(err.status, 408);
    assert_eq!(err.message, "Request timeout");

    // Give a retry, if any were sent, time to reach the server.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind probe listener");
    let address = listener.local_addr().expect("must have local addr");
    drop(listener);

    let api = RequestEngine::new(format!("http://{address}"));
    let config = RequestConfig::new()
        .retries(1)
        .retry_delay(Duration::from_millis(1));

    let err = api
        .get::<User>("/users/1", config, None)
        .await
        .expect_err("connection must be refused");

    assert_eq!(err.status, 0);
    assert!(err.is_transport());
}
