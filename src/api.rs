//! HTTP API endpoints.
//!
//! Session creation is for the host UI; the read endpoints and the join
//! endpoint serve players before they open a WebSocket.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::SessionError;
use crate::leaderboard::Leaderboard;
use crate::state::{AppState, SessionSnapshot, SnapshotScope};
use crate::types::{Clan, Player, Question, Session, SessionConfig};

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    msg: String,
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = match &self {
            SessionError::SessionNotFound(_) | SessionError::NotFound(_) => StatusCode::NOT_FOUND,
            SessionError::InvalidTransition(_) => StatusCode::CONFLICT,
            SessionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            SessionError::TransientIo(e) => {
                tracing::error!("Store unavailable: {}", e);
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        let body = ErrorBody {
            code: self.code(),
            msg: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub config: SessionConfig,
    pub questions: Vec<Question>,
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub display_name: String,
    #[serde(default)]
    pub clan: Option<Clan>,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Open a new session in the lobby.
///
/// POST /api/sessions
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Session>), SessionError> {
    let session = state.create_session(req.questions, req.config).await?;
    if let Some(title) = req.title {
        tracing::info!("Session {} is running \"{}\"", session.id, title);
    }
    Ok((StatusCode::CREATED, Json(session)))
}

/// Player-scoped view of a session.
///
/// GET /api/sessions/{id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, SessionError> {
    let snapshot = state.snapshot(&session_id, SnapshotScope::Player).await?;
    Ok(Json(snapshot))
}

/// GET /api/sessions/{id}/leaderboard
pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Leaderboard>, SessionError> {
    Ok(Json(state.leaderboard(&session_id).await?))
}

/// Join a session as a player.
///
/// POST /api/sessions/{id}/players
pub async fn join_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<JoinRequest>,
) -> Result<(StatusCode, Json<Player>), SessionError> {
    let player = state
        .join_player(&session_id, &req.display_name, req.clan, req.avatar)
        .await?;
    Ok((StatusCode::CREATED, Json(player)))
}
