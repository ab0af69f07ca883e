use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::leaderboard::Leaderboard;
use crate::state::SessionSnapshot;
use crate::types::*;

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    // Host-only messages
    HostTransitionPhase {
        phase: SessionPhase,
    },
    /// Move to the natural next phase
    HostAdvance,
    HostSetQuestionVisible {
        visible: bool,
    },
    HostCloseSession,

    // Player messages
    SubmitAnswer {
        question_id: QuestionId,
        answer: AnswerValue,
        /// Seconds since the question appeared on the player's screen
        elapsed_seconds: f64,
    },

    // Any role
    RequestSnapshot,
    RequestLeaderboard,
}

/// Outcome of an answer as told to the player. Rejection reasons stay server-side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Accepted,
    AlreadyAnswered,
    Dropped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        role: Role,
        #[serde(skip_serializing_if = "Option::is_none")]
        player_id: Option<PlayerId>,
        snapshot: SessionSnapshot,
        server_now: String,
    },
    Snapshot {
        snapshot: SessionSnapshot,
    },
    AnswerAck {
        question_id: QuestionId,
        status: AckStatus,
    },
    Leaderboard {
        leaderboard: Leaderboard,
    },
    /// The session was torn down; the client should stop reconnecting
    SessionClosed,
    Error {
        code: String,
        msg: String,
    },
}

impl From<SessionError> for ServerMessage {
    fn from(err: SessionError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            msg: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_format() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"t":"submit_answer","question_id":"q1","answer":{"kind":"choice","index":2},"elapsed_seconds":3.5}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::SubmitAnswer {
                question_id,
                answer,
                elapsed_seconds,
            } => {
                assert_eq!(question_id, "q1");
                assert_eq!(answer, AnswerValue::Choice { index: 2 });
                assert_eq!(elapsed_seconds, 3.5);
            }
            other => panic!("Expected SubmitAnswer, got {:?}", other),
        }

        let msg: ClientMessage =
            serde_json::from_str(r#"{"t":"host_transition_phase","phase":"QUESTION_ACTIVE"}"#)
                .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::HostTransitionPhase {
                phase: SessionPhase::QuestionActive
            }
        ));

        assert!(serde_json::from_str::<ClientMessage>(r#"{"t":"host_advance"}"#).is_ok());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"t":"launch_rockets"}"#).is_err());
    }

    #[test]
    fn test_error_message_from_session_error() {
        let msg: ServerMessage = SessionError::session_not_found("ABC123").into();
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["t"], "error");
        assert_eq!(json["code"], "SESSION_NOT_FOUND");
    }

    #[test]
    fn test_answer_ack_wire_format() {
        let msg = ServerMessage::AnswerAck {
            question_id: "q1".to_string(),
            status: AckStatus::AlreadyAnswered,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["t"], "answer_ack");
        assert_eq!(json["status"], "already_answered");
    }
}
