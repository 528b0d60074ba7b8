//! Shared test fixtures: an in-process fake Gemini backend, an in-process
//! fake PostgREST store, and a builder wiring the real router to both.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::{to_bytes, Body};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower::ServiceExt;

use mathsprout_backend::config::{AppConfig, Prompts};
use mathsprout_backend::routes::build_router;
use mathsprout_backend::state::AppState;

// ---------- fake Gemini ----------

/// Replies keyed off markers in the default prompt templates. The sweep's
/// first candidate (generateContent) always succeeds here; negotiation
/// itself is covered by the gateway's own tests.
async fn fake_gemini_handler(
    State(generation_reply): State<Arc<String>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let prompt = body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default();

    let reply = if prompt.contains("Respond strictly as minified JSON") {
        generation_reply.as_str().to_string()
    } else if prompt.contains("step-by-step solution") {
        r#"["Step one","Step two"]"#.to_string()
    } else if prompt.contains("helpful hint") {
        "Focus on grouping the numbers first. Then add the parts.".to_string()
    } else {
        "Great effort! Keep practicing.".to_string()
    };

    Json(json!({
        "candidates": [{ "content": { "parts": [{ "text": reply }] } }]
    }))
}

async fn spawn_fake_gemini(generation_reply: &str) -> String {
    let app = Router::new()
        .fallback(fake_gemini_handler)
        .with_state(Arc::new(generation_reply.to_string()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

// ---------- fake PostgREST ----------

#[derive(Default)]
pub struct SupaState {
    pub sessions: Vec<Value>,
    pub submissions: Vec<Value>,
    counter: u64,
}

impl SupaState {
    /// Monotonic, lexicographically sortable timestamps.
    fn next_row_meta(&mut self, prefix: &str) -> (String, String) {
        self.counter += 1;
        (
            format!("{prefix}-{:04}", self.counter),
            format!("2026-01-01T00:00:00.{:06}Z", self.counter),
        )
    }
}

pub type SharedSupa = Arc<Mutex<SupaState>>;

async fn supa_create_session(
    State(state): State<SharedSupa>,
    Json(mut row): Json<Value>,
) -> Json<Vec<Value>> {
    let mut guard = state.lock().unwrap();
    let (id, created_at) = guard.next_row_meta("sess");
    row["id"] = json!(id);
    row["created_at"] = json!(created_at);
    guard.sessions.push(row.clone());
    Json(vec![row])
}

async fn supa_get_sessions(
    State(state): State<SharedSupa>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Vec<Value>> {
    let guard = state.lock().unwrap();

    if let Some(filter) = params.get("id") {
        let wanted = filter.trim_start_matches("eq.");
        let rows = guard
            .sessions
            .iter()
            .filter(|s| s["id"] == json!(wanted))
            .cloned()
            .collect();
        return Json(rows);
    }

    // History query: newest sessions first, embedded submissions newest first.
    let mut rows: Vec<Value> = guard.sessions.clone();
    rows.sort_by(|a, b| b["created_at"].as_str().cmp(&a["created_at"].as_str()));
    if let Some(limit) = params.get("limit").and_then(|l| l.parse::<usize>().ok()) {
        rows.truncate(limit);
    }
    for row in &mut rows {
        let mut subs: Vec<Value> = guard
            .submissions
            .iter()
            .filter(|s| s["session_id"] == row["id"])
            .cloned()
            .collect();
        subs.sort_by(|a, b| b["created_at"].as_str().cmp(&a["created_at"].as_str()));
        row["math_problem_submissions"] = Value::Array(subs);
    }
    Json(rows)
}

async fn supa_delete_sessions(State(state): State<SharedSupa>) -> StatusCode {
    state.lock().unwrap().sessions.clear();
    StatusCode::NO_CONTENT
}

async fn supa_create_submission(
    State(state): State<SharedSupa>,
    Json(mut row): Json<Value>,
) -> StatusCode {
    let mut guard = state.lock().unwrap();
    let (id, created_at) = guard.next_row_meta("sub");
    row["id"] = json!(id);
    row["created_at"] = json!(created_at);
    guard.submissions.push(row);
    StatusCode::CREATED
}

/// GET also serves HEAD in axum, which is how the real store counts rows:
/// `Prefer: count=exact` + the total in `content-range`.
async fn supa_count_submissions(
    State(state): State<SharedSupa>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let guard = state.lock().unwrap();
    let count = match params.get("is_correct").map(String::as_str) {
        Some("eq.true") => guard
            .submissions
            .iter()
            .filter(|s| s["is_correct"] == json!(true))
            .count(),
        _ => guard.submissions.len(),
    };

    let mut headers = HeaderMap::new();
    headers.insert("content-range", format!("*/{count}").parse().unwrap());
    (headers, Json(Vec::<Value>::new()))
}

async fn supa_delete_submissions(State(state): State<SharedSupa>) -> StatusCode {
    state.lock().unwrap().submissions.clear();
    StatusCode::NO_CONTENT
}

async fn spawn_fake_supabase() -> (String, SharedSupa) {
    let shared: SharedSupa = Arc::new(Mutex::new(SupaState::default()));

    let app = Router::new()
        .route(
            "/rest/v1/math_problem_sessions",
            post(supa_create_session)
                .get(supa_get_sessions)
                .delete(supa_delete_sessions),
        )
        .route(
            "/rest/v1/math_problem_submissions",
            post(supa_create_submission)
                .get(supa_count_submissions)
                .delete(supa_delete_submissions),
        )
        .with_state(shared.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), shared)
}

// ---------- app builder & request helpers ----------

pub const DEFAULT_GENERATION_REPLY: &str = r#"{"problem_text":"2+2","final_answer":4}"#;

/// Real router wired to both fakes. Returns a handle to the fake store so
/// tests can assert what got persisted.
pub async fn create_test_app_with_generation(generation_reply: &str) -> (Router, SharedSupa) {
    let gemini_url = spawn_fake_gemini(generation_reply).await;
    let (supabase_url, supa) = spawn_fake_supabase().await;

    let config = AppConfig {
        google_api_key: "test-key".into(),
        google_base_url: gemini_url,
        google_api_version: "v1beta".into(),
        google_model: "test-model".into(),
        supabase_url,
        supabase_key: "test-anon-key".into(),
    };
    let state = AppState::new(&config, Prompts::default()).unwrap();
    (build_router(Arc::new(state)), supa)
}

pub async fn create_test_app() -> (Router, SharedSupa) {
    create_test_app_with_generation(DEFAULT_GENERATION_REPLY).await
}

/// One JSON request through the router; returns status and decoded body.
pub async fn request_json(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = match body {
        Some(v) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&v).unwrap()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}
