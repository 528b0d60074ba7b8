//! HTTP endpoint handlers. These are thin wrappers that forward to core
//! logic; failures surface as `ApiError` and map to 400/404/500.

use std::sync::Arc;
use axum::{extract::State, response::IntoResponse, Json};
use tracing::{info, instrument};

use crate::domain::ScoreSummary;
use crate::error::ApiError;
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

/// The body is optional: the simplest client posts nothing and gets the
/// default difficulty/type.
#[instrument(level = "info", skip(state, body))]
pub async fn http_generate_problem(
  State(state): State<Arc<AppState>>,
  body: Option<Json<GenerateIn>>,
) -> Result<Json<GenerateOut>, ApiError> {
  let req = body.map(|Json(b)| b).unwrap_or_default();
  let out = logic::generate_problem(&state, req).await?;
  info!(target: "problem", session_id = %out.session_id, "HTTP problem served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_submit_answer(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SubmitIn>,
) -> Result<Json<SubmitOut>, ApiError> {
  let out = logic::submit_answer(&state, body).await?;
  info!(target: "problem", is_correct = out.is_correct, "HTTP submission evaluated");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_history(
  State(state): State<Arc<AppState>>,
) -> Result<Json<HistoryOut>, ApiError> {
  let out = logic::fetch_history(&state).await?;
  info!(target: "problem", sessions = out.sessions.len(), "HTTP history served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_score(
  State(state): State<Arc<AppState>>,
) -> Result<Json<ScoreSummary>, ApiError> {
  let summary = logic::fetch_score(&state).await?;
  Ok(Json(summary))
}

#[instrument(level = "info", skip(state))]
pub async fn http_reset(
  State(state): State<Arc<AppState>>,
) -> Result<Json<ResetOut>, ApiError> {
  let out = logic::reset_all(&state).await?;
  Ok(Json(out))
}
