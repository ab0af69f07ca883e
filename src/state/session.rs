//! Session phase state machine.
//!
//! Phase graph:
//! LOBBY -> QUESTION_INTRO -> QUESTION_ACTIVE -> QUESTION_RESULT -> LEADERBOARD
//!       -> {QUESTION_INTRO (next question) | FINISHED}
//! With clan mode, LOBBY -> CLAN_BATTLE_INTRO -> CLAN_BATTLE_VS -> QUESTION_INTRO
//! is also allowed. The question pointer only moves on LEADERBOARD -> QUESTION_INTRO.

use chrono::{DateTime, Utc};
use rand::Rng;

use super::AppState;
use crate::error::{InvalidTransition, SessionError, SessionResult};
use crate::notify::ChangeKind;
use crate::questions::validate_questions;
use crate::store::{CasOutcome, StoreError};
use crate::types::*;

/// Upper bound on optimistic write attempts under contention
pub const MAX_CAS_ATTEMPTS: usize = 8;

/// Safe character set for join codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

fn generate_session_code() -> SessionId {
    let mut rng = rand::rng();
    (0..super::SESSION_CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Direct successors of `phase`
pub fn successors(phase: SessionPhase, clan_mode: bool, has_next_question: bool) -> Vec<SessionPhase> {
    use SessionPhase::*;

    match phase {
        Lobby if clan_mode => vec![QuestionIntro, ClanBattleIntro],
        Lobby => vec![QuestionIntro],
        ClanBattleIntro => vec![ClanBattleVs],
        ClanBattleVs => vec![QuestionIntro],
        QuestionIntro => vec![QuestionActive],
        QuestionActive => vec![QuestionResult],
        QuestionResult => vec![Leaderboard],
        Leaderboard if has_next_question => vec![QuestionIntro, Finished],
        Leaderboard => vec![Finished],
        Finished => vec![],
    }
}

/// The phase a host's "next" button leads to
pub fn natural_successor(session: &Session, question_count: usize) -> Option<SessionPhase> {
    use SessionPhase::*;

    match session.phase {
        Lobby if session.config.clan_mode => Some(ClanBattleIntro),
        Leaderboard if !session.has_next_question(question_count) => Some(Finished),
        phase => successors(phase, session.config.clan_mode, true).first().copied(),
    }
}

impl Session {
    pub fn has_next_question(&self, question_count: usize) -> bool {
        self.current_question_index + 1 < question_count
    }

    pub fn valid_transitions(&self, question_count: usize) -> Vec<SessionPhase> {
        successors(
            self.phase,
            self.config.clan_mode,
            self.has_next_question(question_count),
        )
    }

    /// Compute the session after moving to `to`, without persisting it
    pub fn apply_transition(
        &self,
        to: SessionPhase,
        questions: &[Question],
        now: DateTime<Utc>,
    ) -> Result<Session, InvalidTransition> {
        if !self.valid_transitions(questions.len()).contains(&to) {
            return Err(InvalidTransition {
                from: self.phase,
                to,
            });
        }

        let mut next = self.clone();
        next.version += 1;
        next.phase = to;
        // Any transition closes the previous answer window
        next.answer_window = None;

        if self.phase == SessionPhase::Leaderboard && to == SessionPhase::QuestionIntro {
            next.current_question_index += 1;
        }

        match to {
            SessionPhase::QuestionIntro => next.question_visible = false,
            SessionPhase::QuestionActive => {
                next.question_visible = true;
                next.answer_window = questions
                    .get(next.current_question_index)
                    .map(|q| AnswerWindow {
                        question_id: q.id.clone(),
                        opened_at: now,
                    });
            }
            _ => {}
        }

        Ok(next)
    }
}

impl AppState {
    /// Open a new session in LOBBY for a validated question set
    pub async fn create_session(
        &self,
        questions: Vec<Question>,
        config: SessionConfig,
    ) -> SessionResult<Session> {
        validate_questions(&questions).map_err(SessionError::InvalidInput)?;

        for _ in 0..MAX_CAS_ATTEMPTS {
            let session = Session {
                id: generate_session_code(),
                version: 1,
                phase: SessionPhase::Lobby,
                current_question_index: 0,
                question_visible: false,
                config: config.clone(),
                answer_window: None,
                created_at: Utc::now(),
            };

            let store = &self.store;
            let attempt = (session.clone(), questions.clone());
            let created = self
                .retry
                .run("create_session", move || {
                    store.create_session(attempt.0.clone(), attempt.1.clone())
                })
                .await;

            match created {
                Ok(()) => {
                    self.notifier.open(&session.id).await;
                    tracing::info!(
                        "Created session {} with {} questions (clan mode: {})",
                        session.id,
                        questions.len(),
                        session.config.clan_mode
                    );
                    return Ok(session);
                }
                // Join code collision, draw another
                Err(StoreError::AlreadyExists(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(SessionError::TransientIo(StoreError::Unavailable(
            "could not allocate a free session code".to_string(),
        )))
    }

    pub async fn get_session(&self, session_id: &str) -> SessionResult<Session> {
        self.load_session(session_id).await
    }

    /// Move the session to `to` if it is a direct successor of the stored phase.
    ///
    /// Validation runs against the phase read from the store immediately
    /// before a version-guarded write; a lost race re-reads and re-validates,
    /// so a duplicate request that arrives second is rejected.
    pub async fn transition_phase(
        &self,
        session_id: &str,
        to: SessionPhase,
    ) -> SessionResult<Session> {
        let questions = self.load_questions(session_id).await?;

        self.update_session(session_id, ChangeKind::Session, |current| {
            current
                .apply_transition(to, &questions, Utc::now())
                .map_err(SessionError::from)
        })
        .await
        .inspect(|next| {
            tracing::info!(
                "Session {} -> {:?} (question {}/{})",
                session_id,
                next.phase,
                next.current_question_index + 1,
                questions.len()
            );
        })
    }

    /// Host toggle for whether players can see the current question
    pub async fn set_question_visible(
        &self,
        session_id: &str,
        visible: bool,
    ) -> SessionResult<Session> {
        self.update_session(session_id, ChangeKind::Session, |current| {
            if current.phase == SessionPhase::Finished {
                return Err(SessionError::InvalidInput(
                    "session has finished".to_string(),
                ));
            }
            let mut next = current.clone();
            next.version += 1;
            next.question_visible = visible;
            Ok(next)
        })
        .await
    }

    /// Read-validate-CAS loop shared by every session mutation
    async fn update_session<F>(
        &self,
        session_id: &str,
        kind: ChangeKind,
        mut plan: F,
    ) -> SessionResult<Session>
    where
        F: FnMut(&Session) -> SessionResult<Session>,
    {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let current = self.load_session(session_id).await?;
            let next = plan(&current)?;

            let store = &self.store;
            let expected = current.version;
            let candidate = next.clone();
            let outcome = self
                .retry
                .run("compare_and_swap_session", move || {
                    store.compare_and_swap_session(expected, candidate.clone())
                })
                .await?;

            match outcome {
                CasOutcome::Applied => {
                    self.notifier.notify(session_id, kind).await;
                    return Ok(next);
                }
                CasOutcome::Conflict { current } => {
                    tracing::debug!(
                        "Session {} changed underneath us (now v{}), re-validating",
                        session_id,
                        current
                    );
                }
                CasOutcome::Missing => return Err(SessionError::session_not_found(session_id)),
            }
        }

        Err(SessionError::TransientIo(StoreError::Unavailable(format!(
            "session {} is under heavy contention",
            session_id
        ))))
    }

    /// Remove a finished session and close its change feed
    pub async fn close_session(&self, session_id: &str) -> SessionResult<()> {
        let session = self.load_session(session_id).await?;
        if session.phase != SessionPhase::Finished {
            return Err(SessionError::InvalidInput(
                "only finished sessions can be closed".to_string(),
            ));
        }
        let store = &self.store;
        self.retry
            .run("remove_session", move || store.remove_session(session_id))
            .await?;
        self.notifier.close(session_id).await;
        tracing::info!("Closed session {}", session_id);
        Ok(())
    }
}
