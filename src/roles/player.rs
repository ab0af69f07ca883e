use tokio::time::Instant;

use crate::error::{RejectReason, SessionError, SessionResult};
use crate::leaderboard::Leaderboard;
use crate::state::{AppState, QuestionView, SessionSnapshot, SnapshotScope, SubmitOutcome};
use crate::types::*;

/// What the player's screen shows
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerView {
    /// Lobby, clan battle screens, or a question the host has not shown yet
    Waiting {
        phase: SessionPhase,
        player_count: usize,
    },
    Question {
        question: QuestionView,
        /// False while the question is only being introduced
        accepting: bool,
        answered_count: Option<usize>,
        player_count: usize,
    },
    Answered {
        question_id: QuestionId,
        answer: AnswerValue,
    },
    /// Result screen for the question just closed
    WaitingForNext {
        question: Option<QuestionView>,
        answer: Option<AnswerValue>,
        is_correct: Option<bool>,
        points: Option<u32>,
        distribution: Option<Vec<u32>>,
    },
    Leaderboard(Leaderboard),
    Finished(Option<Leaderboard>),
    Reconnecting,
    SessionNotFound,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Link {
    Live,
    Reconnecting,
    Gone,
}

#[derive(Debug, Clone)]
struct Submitted {
    question_id: QuestionId,
    answer: AnswerValue,
    is_correct: Option<bool>,
    points: Option<u32>,
}

/// Local answering state; reset whenever the question or its visibility changes
#[derive(Debug, Default)]
struct Selection {
    key: Option<(usize, bool)>,
    shown_at: Option<Instant>,
    submitted: Option<Submitted>,
}

/// Participant client for one session
pub struct PlayerAgent {
    state: AppState,
    session_id: SessionId,
    player_id: PlayerId,
    snapshot: Option<SessionSnapshot>,
    link: Link,
    selection: Selection,
}

impl PlayerAgent {
    pub fn new(state: AppState, session_id: &str, player_id: &str) -> Self {
        Self {
            state,
            session_id: session_id.to_string(),
            player_id: player_id.to_string(),
            snapshot: None,
            link: Link::Reconnecting,
            selection: Selection::default(),
        }
    }

    /// Join a session and return an agent for the new player
    pub async fn join(
        state: AppState,
        session_id: &str,
        display_name: &str,
        clan: Option<Clan>,
    ) -> SessionResult<Self> {
        let player = state.join_player(session_id, display_name, clan, None).await?;
        let mut agent = Self::new(state, session_id, &player.id);
        agent.refresh().await;
        Ok(agent)
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    /// Take in a freshly fetched snapshot
    pub fn observe(&mut self, snapshot: SessionSnapshot) {
        let key = (
            snapshot.session.current_question_index,
            snapshot.session.question_visible,
        );
        if self.selection.key != Some(key) {
            self.selection = Selection {
                key: Some(key),
                ..Selection::default()
            };
        }
        if snapshot.session.phase == SessionPhase::QuestionActive
            && snapshot.current_question.is_some()
            && self.selection.shown_at.is_none()
        {
            self.selection.shown_at = Some(Instant::now());
        }
        self.link = Link::Live;
        self.snapshot = Some(snapshot);
    }

    /// A fetch failed; the view degrades instead of showing raw errors
    pub fn observe_error(&mut self, err: &SessionError) {
        self.link = match err {
            SessionError::SessionNotFound(_) => Link::Gone,
            _ => Link::Reconnecting,
        };
    }

    /// Re-read the session and fold it in
    pub async fn refresh(&mut self) -> PlayerView {
        match self
            .state
            .snapshot(&self.session_id, SnapshotScope::Player)
            .await
        {
            Ok(snapshot) => self.observe(snapshot),
            Err(e) => {
                tracing::debug!("Player {} refresh failed: {}", self.player_id, e);
                self.observe_error(&e);
            }
        }
        self.view()
    }

    pub fn view(&self) -> PlayerView {
        match self.link {
            Link::Gone => return PlayerView::SessionNotFound,
            Link::Reconnecting => return PlayerView::Reconnecting,
            Link::Live => {}
        }
        let Some(snap) = &self.snapshot else {
            return PlayerView::Reconnecting;
        };

        let waiting = || PlayerView::Waiting {
            phase: snap.session.phase,
            player_count: snap.player_count,
        };
        let submitted = self.selection.submitted.as_ref();

        match snap.session.phase {
            SessionPhase::Lobby | SessionPhase::ClanBattleIntro | SessionPhase::ClanBattleVs => {
                waiting()
            }
            SessionPhase::QuestionIntro | SessionPhase::QuestionActive => {
                let accepting = snap.session.phase == SessionPhase::QuestionActive;
                match (&snap.current_question, submitted) {
                    (Some(q), Some(s)) if accepting && s.question_id == q.id => {
                        PlayerView::Answered {
                            question_id: s.question_id.clone(),
                            answer: s.answer.clone(),
                        }
                    }
                    (Some(q), _) => PlayerView::Question {
                        question: q.clone(),
                        accepting,
                        answered_count: snap.answered_count,
                        player_count: snap.player_count,
                    },
                    (None, _) => waiting(),
                }
            }
            SessionPhase::QuestionResult => PlayerView::WaitingForNext {
                question: snap.current_question.clone(),
                answer: submitted.map(|s| s.answer.clone()),
                is_correct: submitted.and_then(|s| s.is_correct),
                points: submitted.and_then(|s| s.points),
                distribution: snap.answer_distribution.clone(),
            },
            SessionPhase::Leaderboard => match &snap.leaderboard {
                Some(board) => PlayerView::Leaderboard(board.clone()),
                None => waiting(),
            },
            SessionPhase::Finished => PlayerView::Finished(snap.leaderboard.clone()),
        }
    }

    /// Answer the question on screen, timing from when it was first shown
    pub async fn answer(&mut self, answer: AnswerValue) -> SessionResult<SubmitOutcome> {
        let elapsed = self
            .selection
            .shown_at
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.answer_with_elapsed(answer, elapsed).await
    }

    pub async fn answer_with_elapsed(
        &mut self,
        answer: AnswerValue,
        elapsed_seconds: f64,
    ) -> SessionResult<SubmitOutcome> {
        let question_id = match &self.snapshot {
            Some(snap) if snap.session.phase == SessionPhase::QuestionActive => {
                match &snap.current_question {
                    Some(q) => q.id.clone(),
                    None => return Ok(SubmitOutcome::Rejected(RejectReason::PhaseMismatch)),
                }
            }
            _ => return Ok(SubmitOutcome::Rejected(RejectReason::PhaseMismatch)),
        };

        let submitted = self
            .state
            .submit_answer(
                &self.session_id,
                &self.player_id,
                &question_id,
                answer.clone(),
                elapsed_seconds,
            )
            .await;
        let outcome = match submitted {
            Ok(outcome) => outcome,
            Err(e) => {
                self.observe_error(&e);
                return Err(e);
            }
        };

        match &outcome {
            SubmitOutcome::Accepted(record) => {
                self.selection.submitted = Some(Submitted {
                    question_id,
                    answer: record.answer.clone(),
                    is_correct: record.is_correct,
                    points: Some(record.points),
                });
            }
            SubmitOutcome::Duplicate => {
                // Answered from another tab or before a reconnect
                if self.selection.submitted.is_none() {
                    self.selection.submitted = Some(Submitted {
                        question_id,
                        answer,
                        is_correct: None,
                        points: None,
                    });
                }
            }
            SubmitOutcome::Rejected(reason) => {
                tracing::debug!("Answer from {} dropped: {}", self.player_id, reason);
            }
        }
        Ok(outcome)
    }
}
