//! Client for the Google Generative Language API.
//!
//! The backend's exact API version and generation method are not known at
//! deploy time, so `generate` sweeps a cross product of candidate versions ×
//! method shapes until one succeeds. Calls are instrumented and log versions,
//! methods and latencies (not prompt contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

use crate::config::AppConfig;
use crate::util::trunc_for_log;

/// Versions tried after the configured one, in order.
const FALLBACK_VERSIONS: [&str; 3] = ["v1beta1", "v1beta", "v1"];

/// Generation method shapes the backend may or may not support.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationMethod {
  /// Chat-style "contents" payload.
  GenerateContent,
  /// Legacy "messages" payload.
  GenerateMessage,
  /// Legacy plain-text payload.
  GenerateText,
}

impl GenerationMethod {
  pub const ALL: [GenerationMethod; 3] = [
    GenerationMethod::GenerateContent,
    GenerationMethod::GenerateMessage,
    GenerationMethod::GenerateText,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      GenerationMethod::GenerateContent => "generateContent",
      GenerationMethod::GenerateMessage => "generateMessage",
      GenerationMethod::GenerateText => "generateText",
    }
  }
}

/// Outcome of a single (version, method) attempt. Soft failures advance the
/// sweep; hard failures abort it.
#[derive(Debug)]
pub enum Attempt {
  Success(String),
  SoftFail(String),
  HardFail(String),
}

#[derive(Clone)]
pub struct GeminiClient {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
  api_version: String,
  model: String,
}

impl GeminiClient {
  pub fn new(cfg: &AppConfig) -> Result<Self, String> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .map_err(|e| format!("failed to build HTTP client: {e}"))?;

    Ok(Self {
      client,
      api_key: cfg.google_api_key.clone(),
      base_url: cfg.google_base_url.clone(),
      api_version: cfg.google_api_version.clone(),
      model: cfg.google_model.clone(),
    })
  }

  /// Model identifier with the `models/` prefix the endpoints expect.
  fn model_path(&self) -> String {
    if self.model.starts_with("models/") {
      self.model.clone()
    } else {
      format!("models/{}", self.model)
    }
  }

  /// Preferred version first, then the fixed fallbacks; duplicates removed,
  /// order preserved.
  fn candidate_versions(&self) -> Vec<String> {
    let mut versions: Vec<String> = Vec::with_capacity(1 + FALLBACK_VERSIONS.len());
    for v in std::iter::once(self.api_version.as_str()).chain(FALLBACK_VERSIONS) {
      if !v.is_empty() && !versions.iter().any(|seen| seen == v) {
        versions.push(v.to_string());
      }
    }
    versions
  }

  /// Sweep (version × method) candidates in order until one yields text.
  /// Strictly sequential; one attempt per pair, no backoff.
  #[instrument(level = "info", skip(self, prompt), fields(prompt_len = prompt.len(), model = %self.model))]
  pub async fn generate(&self, prompt: &str) -> Result<String, String> {
    let model_path = self.model_path();
    let mut last_error: Option<String> = None;

    for version in self.candidate_versions() {
      for method in GenerationMethod::ALL {
        let label = format!("{} {}", version, method.as_str());
        let endpoint = format!(
          "{}/{}/{}:{}?key={}",
          self.base_url,
          version,
          model_path,
          method.as_str(),
          self.api_key
        );

        let start = std::time::Instant::now();
        let res = match self
          .client
          .post(&endpoint)
          .header(CONTENT_TYPE, "application/json")
          .json(&build_request_body(method, prompt))
          .send()
          .await
        {
          Ok(r) => r,
          Err(e) => {
            // Transport-level failures advance the sweep like a 404 does.
            warn!(target: "mathsprout_backend", %label, error = %e, "Model request failed to send");
            last_error = Some(format!("[{label}] {e}"));
            continue;
          }
        };

        let status = res.status();
        let raw = res.text().await.unwrap_or_default();
        let elapsed = start.elapsed();

        match classify_attempt(status, &raw, &label) {
          Attempt::Success(text) => {
            info!(target: "mathsprout_backend", %label, ?elapsed, text_len = text.len(), "Model response received");
            return Ok(text);
          }
          Attempt::SoftFail(e) => {
            warn!(target: "mathsprout_backend", %label, ?elapsed, error = %trunc_for_log(&e, 300), "Attempt failed; trying next candidate");
            last_error = Some(e);
          }
          Attempt::HardFail(e) => {
            error!(target: "mathsprout_backend", %label, ?elapsed, error = %trunc_for_log(&e, 300), "Attempt failed hard; aborting sweep");
            return Err(e);
          }
        }
      }
    }

    Err(last_error.unwrap_or_else(|| "unable to generate text with the model backend".into()))
  }
}

/// Version/method-appropriate request body embedding the prompt. Sampling is
/// fixed: temperature 0.7, one candidate.
fn build_request_body(method: GenerationMethod, prompt: &str) -> Value {
  match method {
    GenerationMethod::GenerateContent => json!({
      "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
      "generationConfig": { "temperature": 0.7, "candidateCount": 1 }
    }),
    GenerationMethod::GenerateMessage => json!({
      "prompt": { "messages": [{ "author": "user", "content": prompt }] },
      "temperature": 0.7,
      "candidateCount": 1
    }),
    GenerationMethod::GenerateText => json!({
      "prompt": { "text": prompt },
      "temperature": 0.7,
      "candidateCount": 1
    }),
  }
}

/// Decide what a single attempt's (status, raw body) means for the sweep:
/// - malformed JSON in a non-empty body aborts the whole negotiation,
/// - 404 means "this shape doesn't exist here", try the next candidate,
/// - any other failure status aborts,
/// - a 2xx without extractable text advances to the next candidate.
pub fn classify_attempt(status: StatusCode, raw: &str, label: &str) -> Attempt {
  let payload: Option<Value> = if raw.is_empty() {
    None
  } else {
    match serde_json::from_str(raw) {
      Ok(v) => Some(v),
      Err(e) => {
        return Attempt::HardFail(format!(
          "[{label}] failed to parse model response: {e}: {}",
          trunc_for_log(raw, 200)
        ))
      }
    }
  };

  if !status.is_success() {
    let message = payload
      .as_ref()
      .and_then(|p| p.get("error"))
      .and_then(|e| e.get("message"))
      .and_then(Value::as_str)
      .map(str::to_string)
      .unwrap_or_else(|| {
        if raw.is_empty() {
          format!("model request failed with status {status}")
        } else {
          raw.to_string()
        }
      });
    let message = format!("[{label}] {message}");
    if status == StatusCode::NOT_FOUND {
      return Attempt::SoftFail(message);
    }
    return Attempt::HardFail(message);
  }

  match payload.as_ref().and_then(extract_candidate_text) {
    Some(text) if !text.is_empty() => Attempt::Success(text),
    _ => Attempt::SoftFail(format!("[{label}] model response did not include text output")),
  }
}

/// Pull the first text out of a structured response. Per candidate: a plain
/// string `output`, a plain string `content`, then a parts array (either
/// `content.parts` or `content` itself) holding string `text` fields.
fn extract_candidate_text(payload: &Value) -> Option<String> {
  let candidates = payload.get("candidates")?.as_array()?;
  for candidate in candidates {
    if let Some(s) = candidate.get("output").and_then(Value::as_str) {
      return Some(s.trim().to_string());
    }
    let content = candidate.get("content");
    if let Some(s) = content.and_then(Value::as_str) {
      return Some(s.trim().to_string());
    }
    let parts = content
      .and_then(|c| c.get("parts"))
      .and_then(Value::as_array)
      .or_else(|| content.and_then(Value::as_array));
    if let Some(parts) = parts {
      for part in parts {
        if let Some(s) = part.get("text").and_then(Value::as_str) {
          return Some(s.trim().to_string());
        }
      }
    }
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::Uri;
  use axum::response::IntoResponse;
  use axum::Router;
  use std::sync::Arc;
  use std::sync::Mutex;

  fn cfg(base_url: &str) -> AppConfig {
    AppConfig {
      google_api_key: "test-key".into(),
      google_base_url: base_url.trim_end_matches('/').into(),
      google_api_version: "v1beta".into(),
      google_model: "test-model".into(),
      supabase_url: "http://127.0.0.1:1".into(),
      supabase_key: "unused".into(),
    }
  }

  #[test]
  fn versions_are_deduped_in_order() {
    let client = GeminiClient::new(&cfg("http://x")).unwrap();
    assert_eq!(client.candidate_versions(), vec!["v1beta", "v1beta1", "v1"]);

    let mut custom = cfg("http://x");
    custom.google_api_version = "v2".into();
    let client = GeminiClient::new(&custom).unwrap();
    assert_eq!(client.candidate_versions(), vec!["v2", "v1beta1", "v1beta", "v1"]);
  }

  #[test]
  fn model_path_gets_prefixed_once() {
    let client = GeminiClient::new(&cfg("http://x")).unwrap();
    assert_eq!(client.model_path(), "models/test-model");

    let mut prefixed = cfg("http://x");
    prefixed.google_model = "models/other".into();
    let client = GeminiClient::new(&prefixed).unwrap();
    assert_eq!(client.model_path(), "models/other");
  }

  #[test]
  fn bodies_follow_the_method_shape() {
    let content = build_request_body(GenerationMethod::GenerateContent, "hi");
    assert_eq!(content["contents"][0]["parts"][0]["text"], "hi");
    assert_eq!(content["generationConfig"]["temperature"], 0.7);

    let message = build_request_body(GenerationMethod::GenerateMessage, "hi");
    assert_eq!(message["prompt"]["messages"][0]["content"], "hi");
    assert_eq!(message["candidateCount"], 1);

    let text = build_request_body(GenerationMethod::GenerateText, "hi");
    assert_eq!(text["prompt"]["text"], "hi");
  }

  #[test]
  fn not_found_is_a_soft_failure() {
    let raw = r#"{"error":{"message":"unknown method"}}"#;
    match classify_attempt(StatusCode::NOT_FOUND, raw, "v1 generateText") {
      Attempt::SoftFail(e) => assert!(e.contains("unknown method")),
      other => panic!("expected SoftFail, got {other:?}"),
    }
  }

  #[test]
  fn other_http_failures_abort() {
    match classify_attempt(StatusCode::INTERNAL_SERVER_ERROR, "", "v1 generateText") {
      Attempt::HardFail(e) => assert!(e.contains("500")),
      other => panic!("expected HardFail, got {other:?}"),
    }
  }

  #[test]
  fn malformed_json_aborts_even_on_success_status() {
    match classify_attempt(StatusCode::OK, "not json at all", "v1 generateText") {
      Attempt::HardFail(e) => assert!(e.contains("failed to parse")),
      other => panic!("expected HardFail, got {other:?}"),
    }
  }

  #[test]
  fn success_without_text_advances() {
    let raw = r#"{"candidates":[{"content":{"parts":[{"inlineData":"x"}]}}]}"#;
    match classify_attempt(StatusCode::OK, raw, "v1 generateContent") {
      Attempt::SoftFail(_) => {}
      other => panic!("expected SoftFail, got {other:?}"),
    }
  }

  #[test]
  fn text_extraction_covers_all_candidate_shapes() {
    let output = serde_json::json!({"candidates":[{"output":" hi "}]});
    assert_eq!(extract_candidate_text(&output).as_deref(), Some("hi"));

    let content_str = serde_json::json!({"candidates":[{"content":"hello"}]});
    assert_eq!(extract_candidate_text(&content_str).as_deref(), Some("hello"));

    let content_parts =
      serde_json::json!({"candidates":[{"content":{"parts":[{"text":"nested"}]}}]});
    assert_eq!(extract_candidate_text(&content_parts).as_deref(), Some("nested"));

    let content_array = serde_json::json!({"candidates":[{"content":[{"text":"arr"}]}]});
    assert_eq!(extract_candidate_text(&content_array).as_deref(), Some("arr"));

    let skip_empty = serde_json::json!({"candidates":[{},{"output":"second"}]});
    assert_eq!(extract_candidate_text(&skip_empty).as_deref(), Some("second"));

    let none = serde_json::json!({"candidates":[]});
    assert_eq!(extract_candidate_text(&none), None);
  }

  /// Fake model backend: scripted status/body per generation method, plus a
  /// log of the method suffixes it was asked for. Statuses are u16 because
  /// the server side speaks axum's http types, not reqwest's.
  async fn spawn_fake_backend(
    script: Vec<(&'static str, u16, &'static str)>,
  ) -> (String, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let script: Arc<Vec<(String, u16, String)>> = Arc::new(
      script
        .into_iter()
        .map(|(m, s, b)| (m.to_string(), s, b.to_string()))
        .collect(),
    );

    let log = seen.clone();
    let app = Router::new().fallback(move |uri: Uri| {
      let script = script.clone();
      let log = log.clone();
      async move {
        let path = uri.path().to_string();
        let method = path.rsplit(':').next().unwrap_or("").to_string();
        log.lock().unwrap().push(method.clone());
        for (m, status, body) in script.iter() {
          if *m == method {
            let status = axum::http::StatusCode::from_u16(*status).unwrap();
            return (status, body.clone()).into_response();
          }
        }
        (
          axum::http::StatusCode::NOT_FOUND,
          r#"{"error":{"message":"no such method"}}"#.to_string(),
        )
          .into_response()
      }
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
  }

  const OK_BODY: &str = r#"{"candidates":[{"content":{"parts":[{"text":"generated"}]}}]}"#;

  #[tokio::test]
  async fn sweep_advances_past_404_to_a_working_method() {
    let (base, seen) =
      spawn_fake_backend(vec![("generateMessage", 200, OK_BODY)]).await;
    let client = GeminiClient::new(&cfg(&base)).unwrap();

    let text = client.generate("prompt").await.unwrap();
    assert_eq!(text, "generated");
    let calls = seen.lock().unwrap().clone();
    assert_eq!(calls, vec!["generateContent", "generateMessage"]);
  }

  #[tokio::test]
  async fn sweep_aborts_on_non_404_failure() {
    let (base, seen) = spawn_fake_backend(vec![(
      "generateContent",
      500,
      r#"{"error":{"message":"backend exploded"}}"#,
    )])
    .await;
    let client = GeminiClient::new(&cfg(&base)).unwrap();

    let err = client.generate("prompt").await.unwrap_err();
    assert!(err.contains("backend exploded"), "unexpected error: {err}");
    assert_eq!(seen.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn sweep_aborts_on_malformed_json() {
    let (base, seen) =
      spawn_fake_backend(vec![("generateContent", 200, "```not json```")]).await;
    let client = GeminiClient::new(&cfg(&base)).unwrap();

    let err = client.generate("prompt").await.unwrap_err();
    assert!(err.contains("failed to parse"), "unexpected error: {err}");
    assert_eq!(seen.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn exhausted_sweep_surfaces_the_last_error() {
    let (base, seen) = spawn_fake_backend(vec![]).await;
    let client = GeminiClient::new(&cfg(&base)).unwrap();

    let err = client.generate("prompt").await.unwrap_err();
    assert!(err.contains("no such method"), "unexpected error: {err}");
    // 3 versions (v1beta, v1beta1, v1) × 3 methods, all 404.
    assert_eq!(seen.lock().unwrap().len(), 9);
  }
}
