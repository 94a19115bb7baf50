use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, HeaderMap, Method, Request, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::json;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::core::config::Settings;
use crate::core::state::AppState;
use crate::services::evaluator::EvaluatorClient;

const TEST_SECRET_KEY: &str = "test-secret";

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("EXAMGRADER_ENV", "test");
    std::env::set_var("EXAMGRADER_STRICT_CONFIG", "0");
    std::env::set_var("SECRET_KEY", TEST_SECRET_KEY);
    std::env::remove_var("EVALUATOR_BASE_URL");
    std::env::remove_var("EVALUATOR_API_KEY");
    std::env::remove_var("EVALUATOR_REQUEST_TIMEOUT");
    std::env::remove_var("MAX_UPLOAD_SIZE_MB");
    std::env::remove_var("ACCEPTED_EXTENSIONS");
    std::env::remove_var("EXAMGRADER_USERNAME");
    std::env::remove_var("EXAMGRADER_PASSWORD");
    std::env::remove_var("PROMETHEUS_ENABLED");
}

pub(crate) fn build_state(settings: Settings) -> AppState {
    let evaluator = EvaluatorClient::from_settings(&settings).expect("evaluator client");
    AppState::new(settings, evaluator)
}

/// Locks the environment, points the evaluator settings at the given stub
/// and builds a routable application around fresh state.
pub(crate) async fn setup_test_context(evaluator_base_url: &str) -> TestContext {
    let guard = env_lock().await;
    set_test_env();
    std::env::set_var("EVALUATOR_BASE_URL", evaluator_base_url);

    let settings = Settings::load().expect("settings");
    let state = build_state(settings);
    let app = api::router::router(state.clone());

    TestContext { state, app, _guard: guard }
}

/// A local stand-in for the external grading service. Counts every request
/// it receives and answers from a queue, repeating the last entry once the
/// queue is drained.
pub(crate) struct EvaluatorStub {
    pub(crate) base_url: String,
    hits: Arc<AtomicUsize>,
    authorization: Arc<StdMutex<Option<String>>>,
    requests: Arc<StdMutex<Vec<serde_json::Value>>>,
}

impl EvaluatorStub {
    pub(crate) fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub(crate) fn last_authorization(&self) -> Option<String> {
        self.authorization.lock().expect("authorization lock").clone()
    }

    pub(crate) fn last_request(&self) -> Option<serde_json::Value> {
        self.requests.lock().expect("requests lock").last().cloned()
    }
}

#[derive(Clone)]
struct StubState {
    hits: Arc<AtomicUsize>,
    responses: Arc<StdMutex<VecDeque<(u16, serde_json::Value)>>>,
    fallback: (u16, serde_json::Value),
    delay: Duration,
    authorization: Arc<StdMutex<Option<String>>>,
    requests: Arc<StdMutex<Vec<serde_json::Value>>>,
}

async fn evaluator_stub_handler(
    State(stub): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    stub.hits.fetch_add(1, Ordering::SeqCst);
    *stub.authorization.lock().expect("authorization lock") = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());
    stub.requests.lock().expect("requests lock").push(body);

    if !stub.delay.is_zero() {
        tokio::time::sleep(stub.delay).await;
    }

    let (status, payload) = stub
        .responses
        .lock()
        .expect("responses lock")
        .pop_front()
        .unwrap_or_else(|| stub.fallback.clone());

    (StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), Json(payload))
}

pub(crate) async fn spawn_evaluator_stub(
    responses: Vec<(u16, serde_json::Value)>,
) -> EvaluatorStub {
    spawn_evaluator_stub_with_delay(Duration::ZERO, responses).await
}

pub(crate) async fn spawn_evaluator_stub_with_delay(
    delay: Duration,
    responses: Vec<(u16, serde_json::Value)>,
) -> EvaluatorStub {
    let fallback = responses.last().cloned().expect("stub needs at least one response");
    let state = StubState {
        hits: Arc::new(AtomicUsize::new(0)),
        responses: Arc::new(StdMutex::new(responses.into_iter().collect())),
        fallback,
        delay,
        authorization: Arc::new(StdMutex::new(None)),
        requests: Arc::new(StdMutex::new(Vec::new())),
    };

    let app = Router::new()
        .route("/grade-exam", post(evaluator_stub_handler))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    EvaluatorStub {
        base_url: format!("http://{addr}"),
        hits: state.hits,
        authorization: state.authorization,
        requests: state.requests,
    }
}

/// A well-formed evaluator response body with the requested shape.
pub(crate) fn evaluation_body(
    score: f64,
    total_questions: u32,
    wrong_count: usize,
) -> serde_json::Value {
    let wrong_answers: Vec<serde_json::Value> = (0..wrong_count)
        .map(|index| {
            json!({
                "question": format!("Question {}", index + 1),
                "studentAnswer": "b",
                "correctAnswer": "a",
            })
        })
        .collect();

    json!({
        "score": score,
        "totalQuestions": total_questions,
        "wrongAnswers": wrong_answers,
        "feedback": "Focus on the missed questions.",
    })
}

/// Logs in with the fixed test account and returns the bearer token.
pub(crate) async fn authenticate(app: Router) -> String {
    use tower::ServiceExt;

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({"username": "163141", "password": "123"})),
        ))
        .await
        .expect("login response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    body["access_token"].as_str().expect("access token").to_string()
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) fn multipart_request(
    uri: &str,
    token: &str,
    filename: &str,
    content_type: &str,
    bytes: &[u8],
) -> Request<Body> {
    let boundary = "examgrader-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .expect("multipart request")
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
