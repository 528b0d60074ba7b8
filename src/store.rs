//! Supabase/PostgREST client for problem sessions and submissions.
//!
//! Thin HTTP wrapper over the two tables; it never interprets answers or
//! grades anything. Errors come back as strings and are mapped to
//! `ApiError::StorageFailure` by the orchestration layer.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::domain::{
  Difficulty, NewSubmission, ProblemType, ScoreSummary, Session, SessionWithSubmissions,
};
use crate::util::{round1, trunc_for_log};

const SESSIONS_TABLE: &str = "math_problem_sessions";
const SUBMISSIONS_TABLE: &str = "math_problem_submissions";

/// History returns at most this many sessions, newest first.
pub const HISTORY_LIMIT: usize = 20;

const SESSION_SELECT: &str = "id,created_at,problem_text,correct_answer,difficulty,problem_type";
const HISTORY_SELECT: &str = "id,created_at,difficulty,problem_type,problem_text,correct_answer,\
math_problem_submissions(id,created_at,user_answer,is_correct,feedback_text,hint_text,solution_steps)";

// PostgREST refuses unfiltered bulk deletes; this matches every row.
const MATCH_ALL_FILTER: &str = "gt.1970-01-01T00:00:00Z";

#[derive(Clone)]
pub struct SupabaseStore {
  client: reqwest::Client,
  base_url: String,
  api_key: String,
}

impl SupabaseStore {
  pub fn new(cfg: &AppConfig) -> Result<Self, String> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .map_err(|e| format!("failed to build HTTP client: {e}"))?;

    Ok(Self {
      client,
      base_url: cfg.supabase_url.clone(),
      api_key: cfg.supabase_key.clone(),
    })
  }

  fn table_url(&self, table: &str) -> String {
    format!("{}/rest/v1/{}", self.base_url, table)
  }

  fn authed(&self, req: RequestBuilder) -> RequestBuilder {
    req
      .header("apikey", &self.api_key)
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
  }

  /// Check status and decode the JSON row set.
  async fn read_rows<T: DeserializeOwned>(res: reqwest::Response) -> Result<Vec<T>, String> {
    let status = res.status();
    if !status.is_success() {
      let body = res.text().await.unwrap_or_default();
      return Err(format!("store request failed with status {status}: {}", trunc_for_log(&body, 300)));
    }
    res.json::<Vec<T>>().await.map_err(|e| format!("failed to decode store response: {e}"))
  }

  /// Insert a new problem session and return the stored row (id and
  /// created_at assigned by the store).
  #[instrument(level = "info", skip(self, problem_text), fields(text_len = problem_text.len(), difficulty = %difficulty.as_str(), problem_type = %problem_type.as_str()))]
  pub async fn create_session(
    &self,
    problem_text: &str,
    correct_answer: f64,
    difficulty: Difficulty,
    problem_type: ProblemType,
  ) -> Result<Session, String> {
    #[derive(serde::Serialize)]
    struct Body<'a> {
      problem_text: &'a str,
      correct_answer: f64,
      difficulty: Difficulty,
      problem_type: ProblemType,
    }

    let res = self
      .authed(self.client.post(self.table_url(SESSIONS_TABLE)))
      .header(CONTENT_TYPE, "application/json")
      .header("Prefer", "return=representation")
      .json(&Body { problem_text, correct_answer, difficulty, problem_type })
      .send()
      .await
      .map_err(|e| e.to_string())?;

    let rows: Vec<Session> = Self::read_rows(res).await?;
    let session = rows
      .into_iter()
      .next()
      .ok_or_else(|| "session insert returned no rows".to_string())?;
    info!(target: "problem", session_id = %session.id, "Session stored");
    Ok(session)
  }

  /// Fetch a session by id. `Ok(None)` when absent; the caller decides
  /// whether that is a 404.
  #[instrument(level = "debug", skip(self), fields(%id))]
  pub async fn get_session(&self, id: &str) -> Result<Option<Session>, String> {
    let res = self
      .authed(self.client.get(self.table_url(SESSIONS_TABLE)))
      .query(&[("id", format!("eq.{id}").as_str()), ("select", SESSION_SELECT)])
      .send()
      .await
      .map_err(|e| e.to_string())?;

    let rows: Vec<Session> = Self::read_rows(res).await?;
    Ok(rows.into_iter().next())
  }

  #[instrument(level = "info", skip(self, submission), fields(session_id = %submission.session_id, is_correct = submission.is_correct))]
  pub async fn create_submission(&self, submission: &NewSubmission) -> Result<(), String> {
    let res = self
      .authed(self.client.post(self.table_url(SUBMISSIONS_TABLE)))
      .header(CONTENT_TYPE, "application/json")
      .header("Prefer", "return=minimal")
      .json(submission)
      .send()
      .await
      .map_err(|e| e.to_string())?;

    let status = res.status();
    if !status.is_success() {
      let body = res.text().await.unwrap_or_default();
      return Err(format!("submission insert failed with status {status}: {}", trunc_for_log(&body, 300)));
    }
    Ok(())
  }

  /// Newest sessions first, each with its submissions newest first.
  #[instrument(level = "info", skip(self))]
  pub async fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionWithSubmissions>, String> {
    let res = self
      .authed(self.client.get(self.table_url(SESSIONS_TABLE)))
      .query(&[
        ("select", HISTORY_SELECT),
        ("order", "created_at.desc"),
        ("math_problem_submissions.order", "created_at.desc"),
        ("limit", limit.to_string().as_str()),
      ])
      .send()
      .await
      .map_err(|e| e.to_string())?;

    Self::read_rows(res).await
  }

  /// Purge everything. Submissions first so the session reference never
  /// dangles, even though the store enforces no constraint itself.
  #[instrument(level = "info", skip(self))]
  pub async fn reset_all(&self) -> Result<(), String> {
    for table in [SUBMISSIONS_TABLE, SESSIONS_TABLE] {
      let res = self
        .authed(self.client.delete(self.table_url(table)))
        .query(&[("created_at", MATCH_ALL_FILTER)])
        .send()
        .await
        .map_err(|e| e.to_string())?;

      let status = res.status();
      if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(format!("delete from {table} failed with status {status}: {}", trunc_for_log(&body, 300)));
      }
    }
    info!(target: "problem", "All sessions and submissions purged");
    Ok(())
  }

  /// Exact row count via a HEAD request; PostgREST reports it in the
  /// `content-range` header (`*/N`).
  async fn count(&self, table: &str, filter: Option<(&str, &str)>) -> Result<u64, String> {
    let mut req = self
      .authed(self.client.head(self.table_url(table)))
      .query(&[("select", "id")])
      .header("Prefer", "count=exact");
    if let Some((key, value)) = filter {
      req = req.query(&[(key, value)]);
    }

    let res = req.send().await.map_err(|e| e.to_string())?;
    let status = res.status();
    if !status.is_success() && status != StatusCode::PARTIAL_CONTENT {
      return Err(format!("count on {table} failed with status {status}"));
    }

    let header = res
      .headers()
      .get("content-range")
      .and_then(|v| v.to_str().ok())
      .ok_or_else(|| format!("count on {table}: missing content-range header"))?;
    parse_content_range_total(header)
      .ok_or_else(|| format!("count on {table}: unparseable content-range '{header}'"))
  }

  /// Two count queries plus the derived percentage.
  #[instrument(level = "info", skip(self))]
  pub async fn score_summary(&self) -> Result<ScoreSummary, String> {
    let total = self.count(SUBMISSIONS_TABLE, None).await?;
    let correct = self.count(SUBMISSIONS_TABLE, Some(("is_correct", "eq.true"))).await?;
    let accuracy = if total > 0 {
      round1(correct as f64 / total as f64 * 100.0)
    } else {
      0.0
    };
    Ok(ScoreSummary { total_attempts: total, correct_answers: correct, accuracy })
  }
}

/// Total row count out of a PostgREST `content-range` value, e.g. `*/12`
/// or `0-9/42`.
fn parse_content_range_total(value: &str) -> Option<u64> {
  value.rsplit('/').next()?.trim().parse().ok()
}
