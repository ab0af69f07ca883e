//! Latency-weighted scoring.
//!
//! A correct answer earns a base of 1000 points plus up to 1000 bonus points
//! scaled linearly by the fraction of the time limit still remaining.

use crate::types::{AnswerValue, Question, QuestionKind};

pub const BASE_POINTS: u32 = 1000;
pub const MAX_BONUS_POINTS: u32 = 1000;

/// Outcome of scoring a single answer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scored {
    /// `None` for survey questions, which have no right answer
    pub is_correct: Option<bool>,
    pub points: u32,
}

/// Clamp a client-reported elapsed time into something scoreable.
///
/// Negative values (clock skew) become 0; NaN and infinities are treated as
/// "ran out the clock" so they never earn a bonus.
pub fn clamp_elapsed(elapsed_seconds: f64, time_limit_seconds: f64) -> f64 {
    if !elapsed_seconds.is_finite() {
        return time_limit_seconds.max(0.0);
    }
    elapsed_seconds.max(0.0)
}

/// Points for a scored question
pub fn latency_score(is_correct: bool, elapsed_seconds: f64, time_limit_seconds: f64) -> u32 {
    if !is_correct {
        return 0;
    }
    let elapsed = clamp_elapsed(elapsed_seconds, time_limit_seconds);
    let remaining_fraction = if time_limit_seconds > 0.0 {
        (1.0 - elapsed / time_limit_seconds).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (BASE_POINTS as f64 + remaining_fraction * MAX_BONUS_POINTS as f64).round() as u32
}

/// Score an answer against its question. The answer shape is assumed to
/// have been validated already; a mismatched shape scores as incorrect.
pub fn score_answer(question: &Question, answer: &AnswerValue, elapsed_seconds: f64) -> Scored {
    match question.kind {
        QuestionKind::Survey => Scored {
            is_correct: None,
            points: 0,
        },
        QuestionKind::MultipleChoice => {
            let is_correct = match answer {
                AnswerValue::Choice { index } => question.correct_index == Some(*index),
                AnswerValue::FreeForm { .. } => false,
            };
            Scored {
                is_correct: Some(is_correct),
                points: latency_score(
                    is_correct,
                    elapsed_seconds,
                    question.time_limit_seconds as f64,
                ),
            }
        }
    }
}
