//! Public request/response structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Difficulty, ProblemType, SessionWithSubmissions};

/// Body of `POST /api/math-problem`. The whole body is optional; both
/// fields default when absent.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateIn {
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default, rename = "problemType")]
    pub problem_type: Option<ProblemType>,
}

/// The generated problem as shown to the student.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProblemOut {
    pub problem_text: String,
    pub final_answer: f64,
}

#[derive(Debug, Serialize)]
pub struct GenerateOut {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub problem: ProblemOut,
}

/// Body of `POST /api/math-problem/submit`. Fields stay loose here; the
/// orchestration layer decides what counts as a 400. The answer may arrive
/// as a JSON number or a numeric string.
#[derive(Debug, Deserialize)]
pub struct SubmitIn {
    #[serde(default, rename = "sessionId")]
    pub session_id: Option<String>,
    #[serde(default, rename = "userAnswer")]
    pub user_answer: Option<Value>,
}

impl SubmitIn {
    /// Coerce the submitted answer to a finite f64, if possible.
    pub fn numeric_answer(&self) -> Option<f64> {
        let n = match self.user_answer.as_ref()? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        n.is_finite().then_some(n)
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitOut {
    #[serde(rename = "isCorrect")]
    pub is_correct: bool,
    pub feedback: String,
    pub hint: String,
    #[serde(rename = "solutionSteps")]
    pub solution_steps: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryOut {
    pub sessions: Vec<SessionWithSubmissions>,
}

#[derive(Debug, Serialize)]
pub struct ResetOut {
    pub success: bool,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
