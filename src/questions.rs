//! Question set files and validation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::types::{Question, QuestionKind, SessionConfig};

/// Most answer options a question may offer
pub const MAX_OPTIONS: usize = 4;

/// A quiz as authored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSet {
    pub title: String,
    #[serde(default)]
    pub config: SessionConfig,
    pub questions: Vec<Question>,
}

#[derive(Debug, thiserror::Error)]
pub enum QuestionSetError {
    #[error("failed to read question set: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse question set: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid question set: {0}")]
    Invalid(String),
}

impl QuestionSet {
    pub fn from_json(json: &str) -> Result<Self, QuestionSetError> {
        let set: QuestionSet = serde_json::from_str(json)?;
        validate_questions(&set.questions).map_err(QuestionSetError::Invalid)?;
        Ok(set)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, QuestionSetError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Check a question list before a session is opened for it
pub fn validate_questions(questions: &[Question]) -> Result<(), String> {
    if questions.is_empty() {
        return Err("a session needs at least one question".to_string());
    }

    let mut seen = HashSet::new();
    for q in questions {
        if q.id.trim().is_empty() {
            return Err("question id must not be empty".to_string());
        }
        if !seen.insert(q.id.as_str()) {
            return Err(format!("duplicate question id {}", q.id));
        }
        if q.time_limit_seconds == 0 {
            return Err(format!("question {} has no time limit", q.id));
        }
        if q.options.len() > MAX_OPTIONS {
            return Err(format!(
                "question {} has {} options (max {})",
                q.id,
                q.options.len(),
                MAX_OPTIONS
            ));
        }

        match q.kind {
            QuestionKind::MultipleChoice => {
                if q.options.len() < 2 {
                    return Err(format!("question {} needs at least two options", q.id));
                }
                match q.correct_index {
                    Some(i) if i < q.options.len() => {}
                    Some(i) => {
                        return Err(format!(
                            "question {} marks option {} correct but has {} options",
                            q.id,
                            i,
                            q.options.len()
                        ))
                    }
                    None => return Err(format!("question {} has no correct option", q.id)),
                }
            }
            QuestionKind::Survey => {
                if q.options.is_empty() {
                    return Err(format!("survey {} has no options", q.id));
                }
                if q.correct_index.is_some() {
                    return Err(format!("survey {} cannot have a correct option", q.id));
                }
            }
        }
    }

    Ok(())
}
