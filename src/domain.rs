//! Domain models: problem sessions, submissions, and the derived score summary.

use serde::{Deserialize, Serialize};

/// How hard the generated word problem should be.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
}
impl Default for Difficulty {
  fn default() -> Self { Difficulty::Medium }
}
impl Difficulty {
  pub fn as_str(self) -> &'static str {
    match self {
      Difficulty::Easy => "easy",
      Difficulty::Medium => "medium",
      Difficulty::Hard => "hard",
    }
  }
}

/// Which arithmetic operations the problem should exercise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemType {
  Mixed,
  Addition,
  Subtraction,
  Multiplication,
  Division,
}
impl Default for ProblemType {
  fn default() -> Self { ProblemType::Mixed }
}
impl ProblemType {
  pub fn as_str(self) -> &'static str {
    match self {
      ProblemType::Mixed => "mixed",
      ProblemType::Addition => "addition",
      ProblemType::Subtraction => "subtraction",
      ProblemType::Multiplication => "multiplication",
      ProblemType::Division => "division",
    }
  }
}

/// One generated problem with its correct answer, as stored in
/// `math_problem_sessions`. Immutable after creation; `id` and `created_at`
/// are assigned by the store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
  pub id: String,
  #[serde(default)]
  pub created_at: String,
  pub problem_text: String,
  pub correct_answer: f64,
  #[serde(default)]
  pub difficulty: Difficulty,
  #[serde(default)]
  pub problem_type: ProblemType,
}

/// One graded attempt, as stored in `math_problem_submissions`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmissionRow {
  pub id: String,
  #[serde(default)]
  pub created_at: String,
  pub user_answer: f64,
  pub is_correct: bool,
  pub feedback_text: String,
  #[serde(default)]
  pub hint_text: Option<String>,
  #[serde(default)]
  pub solution_steps: Option<Vec<String>>,
}

/// Submission payload sent to the store (no id/created_at yet).
#[derive(Clone, Debug, Serialize)]
pub struct NewSubmission {
  pub session_id: String,
  pub user_answer: f64,
  pub is_correct: bool,
  pub feedback_text: String,
  pub hint_text: Option<String>,
  pub solution_steps: Option<Vec<String>>,
}

/// History row: a session joined with its submissions (newest first).
/// The embedded key keeps the store's table name so the UI consumes the
/// payload unchanged.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionWithSubmissions {
  pub id: String,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub difficulty: Difficulty,
  #[serde(default)]
  pub problem_type: ProblemType,
  pub problem_text: String,
  pub correct_answer: f64,
  #[serde(default)]
  pub math_problem_submissions: Vec<SubmissionRow>,
}

/// Derived, never persisted. `accuracy` is correct/total × 100, one decimal.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
  pub total_attempts: u64,
  pub correct_answers: u64,
  pub accuracy: f64,
}
