use crate::error::{InvalidTransition, SessionResult};
use crate::leaderboard::Leaderboard;
use crate::state::{natural_successor, AppState, SessionFollower, SessionSnapshot, SnapshotScope};
use crate::types::*;

/// Host-side handle on one session
#[derive(Clone)]
pub struct HostController {
    state: AppState,
    session_id: SessionId,
}

impl HostController {
    /// Open a new session and take control of it
    pub async fn create(
        state: AppState,
        questions: Vec<Question>,
        config: SessionConfig,
    ) -> SessionResult<Self> {
        let session = state.create_session(questions, config).await?;
        Ok(Self {
            state,
            session_id: session.id,
        })
    }

    /// Take control of an existing session, e.g. after a host reconnect
    pub async fn attach(state: AppState, session_id: &str) -> SessionResult<Self> {
        let session = state.get_session(session_id).await?;
        Ok(Self {
            state,
            session_id: session.id,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn transition(&self, to: SessionPhase) -> SessionResult<Session> {
        self.state.transition_phase(&self.session_id, to).await
    }

    /// Move to the natural next phase: clan intro or first question from the
    /// lobby, next question or finish from the leaderboard
    pub async fn advance(&self) -> SessionResult<Session> {
        let session = self.state.get_session(&self.session_id).await?;
        let questions = self.state.load_questions(&self.session_id).await?;
        match natural_successor(&session, questions.len()) {
            Some(next) => self.transition(next).await,
            None => Err(InvalidTransition {
                from: session.phase,
                to: session.phase,
            }
            .into()),
        }
    }

    pub async fn set_question_visible(&self, visible: bool) -> SessionResult<Session> {
        self.state
            .set_question_visible(&self.session_id, visible)
            .await
    }

    pub async fn snapshot(&self) -> SessionResult<SessionSnapshot> {
        self.state
            .snapshot(&self.session_id, SnapshotScope::Host)
            .await
    }

    pub async fn leaderboard(&self) -> SessionResult<Leaderboard> {
        self.state.leaderboard(&self.session_id).await
    }

    pub async fn follow(&self) -> SessionFollower {
        SessionFollower::new(self.state.clone(), &self.session_id, SnapshotScope::Host).await
    }

    /// Tear down a finished session
    pub async fn close(self) -> SessionResult<()> {
        self.state.close_session(&self.session_id).await
    }
}
