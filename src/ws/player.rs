//! Player message handlers

use crate::protocol::{AckStatus, ServerMessage};
use crate::state::{AppState, SubmitOutcome};
use crate::types::{AnswerValue, QuestionId};
use std::sync::Arc;

pub async fn handle_submit_answer(
    state: &Arc<AppState>,
    session_id: &str,
    player_id: &str,
    question_id: QuestionId,
    answer: AnswerValue,
    elapsed_seconds: f64,
) -> Option<ServerMessage> {
    let outcome = state
        .submit_answer(session_id, player_id, &question_id, answer, elapsed_seconds)
        .await;

    let status = match outcome {
        Ok(SubmitOutcome::Accepted(_)) => AckStatus::Accepted,
        Ok(SubmitOutcome::Duplicate) => AckStatus::AlreadyAnswered,
        Ok(SubmitOutcome::Rejected(reason)) => {
            tracing::debug!(
                "Answer from {} for {} rejected: {:?}",
                player_id,
                question_id,
                reason
            );
            AckStatus::Dropped
        }
        Err(e) => return Some(e.into()),
    };

    Some(ServerMessage::AnswerAck {
        question_id,
        status,
    })
}
