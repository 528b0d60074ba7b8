//! Tolerance-based grading.

/// Fixed absolute epsilon absorbing float/decimal drift from the storage
/// layer. Must not be altered.
pub const ANSWER_EPSILON: f64 = 0.01;

/// A user answer is correct when it is within `ANSWER_EPSILON` of the
/// session's stored answer.
pub fn is_correct(user_answer: f64, correct_answer: f64) -> bool {
  (user_answer - correct_answer).abs() <= ANSWER_EPSILON
}
