//! Host-only command handlers
//!
//! All handlers in this module require the Host role.
//! Authorization is checked in the main dispatch layer before calling these.
//! On success they return nothing: the connection's follower pushes the new
//! snapshot to every client, including the host.

use crate::protocol::ServerMessage;
use crate::roles::HostController;
use crate::state::AppState;
use crate::types::SessionPhase;
use std::sync::Arc;

async fn controller(
    state: &Arc<AppState>,
    session_id: &str,
) -> Result<HostController, ServerMessage> {
    HostController::attach(state.as_ref().clone(), session_id)
        .await
        .map_err(ServerMessage::from)
}

pub async fn handle_transition_phase(
    state: &Arc<AppState>,
    session_id: &str,
    phase: SessionPhase,
) -> Option<ServerMessage> {
    tracing::info!("Host transitioning {} to phase: {:?}", session_id, phase);
    let host = match controller(state, session_id).await {
        Ok(host) => host,
        Err(msg) => return Some(msg),
    };
    match host.transition(phase).await {
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Transition of {} to {:?} failed: {}", session_id, phase, e);
            Some(e.into())
        }
    }
}

pub async fn handle_advance(state: &Arc<AppState>, session_id: &str) -> Option<ServerMessage> {
    let host = match controller(state, session_id).await {
        Ok(host) => host,
        Err(msg) => return Some(msg),
    };
    match host.advance().await {
        Ok(session) => {
            tracing::info!("Host advanced {} to {:?}", session_id, session.phase);
            None
        }
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_set_question_visible(
    state: &Arc<AppState>,
    session_id: &str,
    visible: bool,
) -> Option<ServerMessage> {
    tracing::info!("Host setting question visible={} in {}", visible, session_id);
    match state.set_question_visible(session_id, visible).await {
        Ok(_) => None,
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_close_session(
    state: &Arc<AppState>,
    session_id: &str,
) -> Option<ServerMessage> {
    let host = match controller(state, session_id).await {
        Ok(host) => host,
        Err(msg) => return Some(msg),
    };
    match host.close().await {
        Ok(()) => Some(ServerMessage::SessionClosed),
        Err(e) => Some(e.into()),
    }
}
