//! Prompt construction. Pure functions over the `Prompts` templates; no
//! side effects, no network calls.

use crate::config::Prompts;
use crate::domain::{Difficulty, ProblemType};
use crate::util::{fill_template, fmt_number};

/// Prompt asking the model for a new word problem as strict JSON
/// (`problem_text` + `final_answer`).
pub fn generation_prompt(
  prompts: &Prompts,
  difficulty: Difficulty,
  problem_type: ProblemType,
) -> String {
  fill_template(
    &prompts.generation_template,
    &[
      ("difficulty", difficulty.as_str()),
      ("problem_type", problem_type.as_str()),
    ],
  )
}

/// Encouraging or corrective 2-4 sentence feedback on a graded attempt.
pub fn feedback_prompt(
  prompts: &Prompts,
  problem_text: &str,
  correct_answer: f64,
  user_answer: f64,
  is_correct: bool,
) -> String {
  let verdict = if is_correct {
    &prompts.feedback_correct_verdict
  } else {
    &prompts.feedback_incorrect_verdict
  };
  fill_template(
    &prompts.feedback_template,
    &[
      ("problem_text", problem_text),
      ("correct_answer", &fmt_number(correct_answer)),
      ("user_answer", &fmt_number(user_answer)),
      ("verdict", verdict),
    ],
  )
}

/// Two-sentence strategic nudge. The user's answer is included only when it
/// was wrong; the prompt instructs the model never to reveal the final number.
pub fn hint_prompt(
  prompts: &Prompts,
  problem_text: &str,
  correct_answer: f64,
  wrong_answer: Option<f64>,
) -> String {
  match wrong_answer {
    Some(user_answer) => fill_template(
      &prompts.hint_with_answer_template,
      &[
        ("problem_text", problem_text),
        ("correct_answer", &fmt_number(correct_answer)),
        ("user_answer", &fmt_number(user_answer)),
      ],
    ),
    None => fill_template(&prompts.hint_template, &[("problem_text", problem_text)]),
  }
}

/// Stepwise solution as a JSON array of short step strings.
pub fn solution_prompt(prompts: &Prompts, problem_text: &str, correct_answer: f64) -> String {
  fill_template(
    &prompts.solution_template,
    &[
      ("problem_text", problem_text),
      ("correct_answer", &fmt_number(correct_answer)),
    ],
  )
}
