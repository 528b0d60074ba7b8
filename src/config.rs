//! Environment configuration and prompt templates.
//!
//! `AppConfig` carries the external collaborator settings (Google generative
//! API + Supabase). `Prompts` holds the templates used to talk to the model;
//! defaults are compiled in and can be overridden from a TOML file named by
//! PROMPTS_CONFIG_PATH. See `Prompts` for the expected schema.

use serde::Deserialize;
use tracing::{error, info};

/// Settings for both external backends, read once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
  pub google_api_key: String,
  pub google_base_url: String,
  pub google_api_version: String,
  pub google_model: String,
  pub supabase_url: String,
  pub supabase_key: String,
}

impl AppConfig {
  /// Build from env. Missing required variables are a startup error; the
  /// optional ones fall back to the documented defaults.
  pub fn from_env() -> Result<Self, String> {
    let google_api_key = std::env::var("GOOGLE_API_KEY")
      .map_err(|_| "Missing GOOGLE_API_KEY environment variable".to_string())?;
    let supabase_url = std::env::var("SUPABASE_URL")
      .map_err(|_| "Missing SUPABASE_URL environment variable".to_string())?;
    let supabase_key = std::env::var("SUPABASE_ANON_KEY")
      .map_err(|_| "Missing SUPABASE_ANON_KEY environment variable".to_string())?;

    let google_base_url = std::env::var("GOOGLE_API_BASE_URL")
      .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".into());
    let google_api_version =
      std::env::var("GOOGLE_API_VERSION").unwrap_or_else(|_| "v1beta".into());
    let google_model =
      std::env::var("GOOGLE_MODEL_NAME").unwrap_or_else(|_| "models/gemini-2.0-flash".into());

    Ok(Self {
      google_api_key,
      google_base_url: google_base_url.trim_end_matches('/').to_string(),
      google_api_version,
      google_model,
      supabase_url: supabase_url.trim_end_matches('/').to_string(),
      supabase_key,
    })
  }
}

/// TOML file schema: a single `[prompts]` table.
#[derive(Clone, Debug, Deserialize, Default)]
struct PromptFile {
  #[serde(default)]
  prompts: Prompts,
}

/// Prompt templates used by the Gemini client. Defaults target Primary 5 /
/// Singapore syllabus problems. Override them in TOML to tune tone or level.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  // Problem generation
  pub generation_template: String,
  // Post-submission feedback (verdict sentence injected by the builder)
  pub feedback_template: String,
  pub feedback_correct_verdict: String,
  pub feedback_incorrect_verdict: String,
  // Hints, with and without a wrong answer to react to
  pub hint_template: String,
  pub hint_with_answer_template: String,
  // Stepwise solution
  pub solution_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generation_template: "Create a Primary 5 level math word problem that aligns with the Singapore Mathematics syllabus. The problem should be of {difficulty} difficulty and focus on {problem_type} operations. Respond strictly as minified JSON with two properties: \"problem_text\" (string) and \"final_answer\" (number). Ensure the problem requires at most two computation steps and has a final numerical answer. Do not include any additional commentary, formatting, or markdown code fences.".into(),
      feedback_template: "You are a supportive Primary 5 mathematics tutor. A student attempted the following problem: \"{problem_text}\". The correct answer is {correct_answer}. The student answered {user_answer}. {verdict} Keep the tone encouraging, concise, and actionable. Do not mention you are an AI. Respond in 2-4 sentences.".into(),
      feedback_correct_verdict: "Congratulate them briefly and reinforce the strategy that led to the correct answer.".into(),
      feedback_incorrect_verdict: "Explain where their reasoning likely went wrong and offer a clear tip to reach the correct answer next time.".into(),
      hint_template: "You are helping a Primary 5 student with a math word problem. Problem: \"{problem_text}\". Provide a helpful hint that nudges the student towards the correct approach without giving away the final answer. Keep the hint to 2 sentences and focus on strategy rather than the final numeric solution.".into(),
      hint_with_answer_template: "You are helping a Primary 5 student with a math word problem. Problem: \"{problem_text}\". The student is currently at this answer: {user_answer}. Provide a helpful hint that nudges them towards the correct approach without giving away the final answer ({correct_answer}). Keep the hint to 2 sentences and focus on strategy rather than the final numeric solution.".into(),
      solution_template: "Provide a step-by-step solution for the following Primary 5 math problem. Problem: \"{problem_text}\". Final answer: {correct_answer}. Return the response strictly as a JSON array of strings where each string is one concise step (do not include numbering or markdown).".into(),
    }
  }
}

/// Attempt to load `Prompts` from PROMPTS_CONFIG_PATH. On any parsing/IO
/// error, returns None (callers fall back to the compiled-in defaults).
pub fn load_prompts_from_env() -> Option<Prompts> {
  let path = std::env::var("PROMPTS_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<PromptFile>(&s) {
      Ok(file) => {
        info!(target: "mathsprout_backend", %path, "Loaded prompt config (TOML)");
        Some(file.prompts)
      }
      Err(e) => {
        error!(target: "mathsprout_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "mathsprout_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
