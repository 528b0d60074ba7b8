//! Core behaviors behind the HTTP handlers: generate, submit, history,
//! score, reset. Handlers stay thin; everything here returns
//! `Result<Dto, ApiError>` so failures map uniformly to HTTP statuses.

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::ApiError;
use crate::grading;
use crate::prompts;
use crate::protocol::{GenerateIn, GenerateOut, HistoryOut, ProblemOut, ResetOut, SubmitIn, SubmitOut};
use crate::state::AppState;
use crate::store::HISTORY_LIMIT;
use crate::domain::{NewSubmission, ScoreSummary};
use crate::util::trunc_for_log;

/// Generate a new word problem, persist it as a session, and hand the
/// problem back with its session id.
#[instrument(level = "info", skip(state, req))]
pub async fn generate_problem(state: &AppState, req: GenerateIn) -> Result<GenerateOut, ApiError> {
  let difficulty = req.difficulty.unwrap_or_default();
  let problem_type = req.problem_type.unwrap_or_default();

  let prompt = prompts::generation_prompt(&state.prompts, difficulty, problem_type);
  let raw = state
    .gemini
    .generate(&prompt)
    .await
    .map_err(ApiError::GenerationFailure)?;

  // Only a validated problem may be persisted.
  let problem = parse_generated_problem(&raw)?;

  let session = state
    .store
    .create_session(&problem.problem_text, problem.final_answer, difficulty, problem_type)
    .await
    .map_err(ApiError::StorageFailure)?;

  info!(
    target: "problem",
    session_id = %session.id,
    difficulty = %difficulty.as_str(),
    problem_type = %problem_type.as_str(),
    "Problem generated"
  );

  Ok(GenerateOut {
    session_id: session.id,
    problem: ProblemOut {
      problem_text: session.problem_text,
      final_answer: session.correct_answer,
    },
  })
}

/// Grade a submission against the stored answer, gather feedback/hint/steps
/// from the model, and persist the attempt.
#[instrument(level = "info", skip(state, body))]
pub async fn submit_answer(state: &AppState, body: SubmitIn) -> Result<SubmitOut, ApiError> {
  let session_id = body
    .session_id
    .as_deref()
    .filter(|s| !s.is_empty())
    .ok_or_else(|| ApiError::bad_request("Invalid submission payload."))?
    .to_string();
  let user_answer = body
    .numeric_answer()
    .ok_or_else(|| ApiError::bad_request("Invalid submission payload."))?;

  let session = state
    .store
    .get_session(&session_id)
    .await
    .map_err(ApiError::StorageFailure)?
    .ok_or_else(|| ApiError::not_found("Problem session not found."))?;

  // Grade strictly against the stored answer; never trust the caller.
  let is_correct = grading::is_correct(user_answer, session.correct_answer);

  let decorated_problem = format!(
    "{} (Difficulty: {}, Type: {})",
    session.problem_text,
    session.difficulty.as_str(),
    session.problem_type.as_str()
  );
  let feedback_prompt = prompts::feedback_prompt(
    &state.prompts,
    &decorated_problem,
    session.correct_answer,
    user_answer,
    is_correct,
  );
  let hint_prompt = prompts::hint_prompt(
    &state.prompts,
    &session.problem_text,
    session.correct_answer,
    (!is_correct).then_some(user_answer),
  );
  let solution_prompt =
    prompts::solution_prompt(&state.prompts, &session.problem_text, session.correct_answer);

  // The three auxiliary generations are independent; run them concurrently.
  // All must complete before we respond; any failure fails the submit.
  let (feedback, hint, solution_raw) = tokio::try_join!(
    state.gemini.generate(&feedback_prompt),
    state.gemini.generate(&hint_prompt),
    state.gemini.generate(&solution_prompt),
  )
  .map_err(ApiError::GenerationFailure)?;

  let solution_steps = parse_solution_steps(&solution_raw);

  state
    .store
    .create_submission(&NewSubmission {
      session_id: session.id.clone(),
      user_answer,
      is_correct,
      feedback_text: feedback.clone(),
      hint_text: Some(hint.clone()),
      solution_steps: solution_steps.clone(),
    })
    .await
    .map_err(ApiError::StorageFailure)?;

  info!(target: "problem", session_id = %session.id, %is_correct, "Submission graded");

  Ok(SubmitOut {
    is_correct,
    feedback,
    hint,
    solution_steps: solution_steps.unwrap_or_default(),
  })
}

/// The 20 most recent sessions, nested submissions newest first.
#[instrument(level = "info", skip(state))]
pub async fn fetch_history(state: &AppState) -> Result<HistoryOut, ApiError> {
  let sessions = state
    .store
    .recent_sessions(HISTORY_LIMIT)
    .await
    .map_err(ApiError::StorageFailure)?;
  Ok(HistoryOut { sessions })
}

#[instrument(level = "info", skip(state))]
pub async fn fetch_score(state: &AppState) -> Result<ScoreSummary, ApiError> {
  state.store.score_summary().await.map_err(ApiError::StorageFailure)
}

#[instrument(level = "info", skip(state))]
pub async fn reset_all(state: &AppState) -> Result<ResetOut, ApiError> {
  state.store.reset_all().await.map_err(ApiError::StorageFailure)?;
  Ok(ResetOut { success: true })
}

// -------- Model-output parsing --------

/// Slice out the first `{...}` object: models like to wrap their JSON in
/// prose or markdown fences despite the instructions.
fn extract_json_object(raw: &str) -> Option<&str> {
  let start = raw.find('{')?;
  let end = raw.rfind('}')?;
  (end >= start).then(|| &raw[start..=end])
}

/// Validate the generation output: a JSON object with a non-empty
/// `problem_text` string and a finite numeric `final_answer` (numbers-as-
/// strings are coerced).
pub(crate) fn parse_generated_problem(raw: &str) -> Result<ProblemOut, ApiError> {
  let snippet = extract_json_object(raw).ok_or_else(|| {
    ApiError::invalid_generation(format!(
      "model response did not contain a JSON object: {}",
      trunc_for_log(raw, 200)
    ))
  })?;
  let value: Value = serde_json::from_str(snippet).map_err(|e| {
    ApiError::invalid_generation(format!(
      "failed to parse model response: {e}: {}",
      trunc_for_log(snippet, 200)
    ))
  })?;

  let problem_text = value
    .get("problem_text")
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .ok_or_else(|| ApiError::invalid_generation("model response missing problem_text"))?
    .to_string();

  let final_answer = match value.get("final_answer") {
    Some(Value::Number(n)) => n.as_f64(),
    Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
    _ => None,
  }
  .filter(|n| n.is_finite())
  .ok_or_else(|| ApiError::invalid_generation("final_answer must be a finite number"))?;

  Ok(ProblemOut { problem_text, final_answer })
}

/// Parse the solution text as a JSON array of strings. Parse failures are
/// tolerated: log and fall back to no steps, never fail the submit.
fn parse_solution_steps(raw: &str) -> Option<Vec<String>> {
  match serde_json::from_str::<Value>(raw) {
    Ok(Value::Array(items)) => Some(
      items
        .iter()
        .filter_map(Value::as_str)
        .map(|s| s.trim().to_string())
        .collect(),
    ),
    Ok(other) => {
      warn!(target: "problem", got = %trunc_for_log(&other.to_string(), 120), "Solution steps were not a JSON array");
      None
    }
    Err(e) => {
      warn!(target: "problem", error = %e, raw = %trunc_for_log(raw, 120), "Failed to parse solution steps");
      None
    }
  }
}
