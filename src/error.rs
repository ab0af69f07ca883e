//! Error taxonomy for session orchestration.
//!
//! Validation failures are returned as values; only the not-found cases, `InvalidInput`
//! and exhausted `TransientIo` escape as `Err`.

use serde::{Deserialize, Serialize};

use crate::store::StoreError;
use crate::types::{SessionId, SessionPhase};

/// The host asked for a phase that is not a direct successor of the stored phase
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: SessionPhase,
    pub to: SessionPhase,
}

/// Why an answer was dropped. Never shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    #[error("session is not accepting answers")]
    PhaseMismatch,
    #[error("question is no longer current")]
    StaleQuestion,
    #[error("answer does not fit the question")]
    InvalidAnswer,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store unavailable: {0}")]
    TransientIo(#[from] StoreError),
}

impl SessionError {
    pub fn session_not_found(id: &str) -> Self {
        SessionError::SessionNotFound(id.to_string())
    }

    /// The session is gone for good; clients stop retrying
    pub fn is_session_gone(&self) -> bool {
        matches!(self, SessionError::SessionNotFound(_))
    }

    /// Stable wire code for `ServerMessage::Error`
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            SessionError::NotFound(_) => "NOT_FOUND",
            SessionError::InvalidTransition(_) => "INVALID_TRANSITION",
            SessionError::InvalidInput(_) => "INVALID_INPUT",
            SessionError::TransientIo(_) => "UNAVAILABLE",
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
