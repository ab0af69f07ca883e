//! WebSocket message dispatch
//!
//! Authorization is checked here, then dispatched to role-specific handler modules.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{PlayerId, Role, SessionId};
use std::sync::Arc;

use super::{host, player};

/// Who is on the other end of a connection
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub role: Role,
    pub session_id: SessionId,
    /// Set for players only
    pub player_id: Option<PlayerId>,
}

impl ClientContext {
    pub fn host(session_id: &str) -> Self {
        Self {
            role: Role::Host,
            session_id: session_id.to_string(),
            player_id: None,
        }
    }

    pub fn player(session_id: &str, player_id: &str) -> Self {
        Self {
            role: Role::Player,
            session_id: session_id.to_string(),
            player_id: Some(player_id.to_string()),
        }
    }
}

/// Macro to check host authorization and return early if unauthorized
macro_rules! check_host {
    ($ctx:expr, $action:expr) => {
        if $ctx.role != Role::Host {
            return Some(ServerMessage::Error {
                code: "UNAUTHORIZED".to_string(),
                msg: format!("Only host can {}", $action),
            });
        }
    };
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    ctx: &ClientContext,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        // Host-only commands (authorization checked before dispatch)
        ClientMessage::HostTransitionPhase { phase } => {
            check_host!(ctx, "transition phases");
            host::handle_transition_phase(state, &ctx.session_id, phase).await
        }

        ClientMessage::HostAdvance => {
            check_host!(ctx, "advance the session");
            host::handle_advance(state, &ctx.session_id).await
        }

        ClientMessage::HostSetQuestionVisible { visible } => {
            check_host!(ctx, "change question visibility");
            host::handle_set_question_visible(state, &ctx.session_id, visible).await
        }

        ClientMessage::HostCloseSession => {
            check_host!(ctx, "close the session");
            host::handle_close_session(state, &ctx.session_id).await
        }

        // Player messages
        ClientMessage::SubmitAnswer {
            question_id,
            answer,
            elapsed_seconds,
        } => {
            let Some(player_id) = ctx.player_id.as_deref() else {
                return Some(ServerMessage::Error {
                    code: "UNAUTHORIZED".to_string(),
                    msg: "Only players can answer".to_string(),
                });
            };
            player::handle_submit_answer(
                state,
                &ctx.session_id,
                player_id,
                question_id,
                answer,
                elapsed_seconds,
            )
            .await
        }

        // Any role
        ClientMessage::RequestSnapshot => {
            match state.snapshot(&ctx.session_id, ctx.role.clone().into()).await {
                Ok(snapshot) => Some(ServerMessage::Snapshot { snapshot }),
                Err(e) => Some(e.into()),
            }
        }

        ClientMessage::RequestLeaderboard => match state.leaderboard(&ctx.session_id).await {
            Ok(leaderboard) => Some(ServerMessage::Leaderboard { leaderboard }),
            Err(e) => Some(e.into()),
        },
    }
}
