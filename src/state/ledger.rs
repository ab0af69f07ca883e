use chrono::Utc;
use ulid::Ulid;

use super::{AppState, MAX_CAS_ATTEMPTS};
use crate::error::{RejectReason, SessionError, SessionResult};
use crate::notify::ChangeKind;
use crate::scoring::{clamp_elapsed, score_answer};
use crate::store::{RecordOutcome, StoreError};
use crate::types::*;

/// Longest free-form survey answer accepted
pub const MAX_FREE_FORM_LEN: usize = 500;

/// What happened to a submitted answer
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// First answer for this (player, question); points already credited
    Accepted(AnswerRecord),
    /// An answer was already recorded; nothing changed
    Duplicate,
    /// Dropped without side effects
    Rejected(RejectReason),
}

fn fits_question(question: &Question, answer: &AnswerValue) -> bool {
    match (question.kind, answer) {
        (_, AnswerValue::Choice { index }) => *index < question.options.len(),
        (QuestionKind::Survey, AnswerValue::FreeForm { text }) => {
            let text = text.trim();
            !text.is_empty() && text.chars().count() <= MAX_FREE_FORM_LEN
        }
        (QuestionKind::MultipleChoice, AnswerValue::FreeForm { .. }) => false,
    }
}

/// Per-option answer counts for the result screen
pub fn answer_distribution(question: &Question, records: &[AnswerRecord]) -> Vec<u32> {
    let mut counts = vec![0; question.options.len()];
    for record in records.iter().filter(|r| r.question_id == question.id) {
        if let AnswerValue::Choice { index } = record.answer {
            if let Some(count) = counts.get_mut(index) {
                *count += 1;
            }
        }
    }
    counts
}

impl AppState {
    /// Record a player's answer for the current question.
    ///
    /// Checks run in order: answer window open, question current, answer
    /// shape, then the ledger's first-write-wins insert. The insert is guarded
    /// by the session version read here, so an answer racing a phase change
    /// is either recorded before the change or re-validated after it.
    pub async fn submit_answer(
        &self,
        session_id: &str,
        player_id: &str,
        question_id: &str,
        answer: AnswerValue,
        client_elapsed_seconds: f64,
    ) -> SessionResult<SubmitOutcome> {
        let questions = self.load_questions(session_id).await?;
        let question = questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or_else(|| SessionError::NotFound(format!("question {}", question_id)))?;

        let store = &self.store;
        self.retry
            .run("get_player", move || store.get_player(session_id, player_id))
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("player {}", player_id)))?;

        // Stable across retries so a write that landed before a transient
        // error is recognised as ours
        let submission_id = Ulid::new().to_string();

        for _ in 0..MAX_CAS_ATTEMPTS {
            let session = self.load_session(session_id).await?;

            let window = match &session.answer_window {
                Some(window) if session.phase == SessionPhase::QuestionActive => window,
                _ => {
                    tracing::debug!(
                        "Dropping answer from {} in session {}: phase {:?}",
                        player_id,
                        session_id,
                        session.phase
                    );
                    return Ok(SubmitOutcome::Rejected(RejectReason::PhaseMismatch));
                }
            };
            if window.question_id != question_id {
                tracing::debug!(
                    "Dropping stale answer from {} for {} (current {})",
                    player_id,
                    question_id,
                    window.question_id
                );
                return Ok(SubmitOutcome::Rejected(RejectReason::StaleQuestion));
            }
            if !fits_question(question, &answer) {
                tracing::debug!(
                    "Dropping malformed answer from {} for {}",
                    player_id,
                    question_id
                );
                return Ok(SubmitOutcome::Rejected(RejectReason::InvalidAnswer));
            }

            let now = Utc::now();
            let server_elapsed = (now - window.opened_at).num_milliseconds() as f64 / 1000.0;
            let scored = score_answer(question, &answer, client_elapsed_seconds);
            let record = AnswerRecord {
                session_id: session_id.to_string(),
                player_id: player_id.to_string(),
                question_id: question_id.to_string(),
                submission_id: submission_id.clone(),
                answer: answer.clone(),
                elapsed_seconds: clamp_elapsed(
                    client_elapsed_seconds,
                    question.time_limit_seconds as f64,
                ),
                server_elapsed_seconds: Some(server_elapsed.max(0.0)),
                is_correct: scored.is_correct,
                points: scored.points,
                submitted_at: now,
            };

            let version = session.version;
            let candidate = record.clone();
            let outcome = self
                .retry
                .run("record_answer", move || {
                    store.record_answer(version, candidate.clone())
                })
                .await?;

            match outcome {
                RecordOutcome::Inserted { new_score } => {
                    tracing::debug!(
                        "Player {} answered {} in session {}: +{} (total {})",
                        player_id,
                        question_id,
                        session_id,
                        record.points,
                        new_score
                    );
                    self.notifier.notify(session_id, ChangeKind::Answer).await;
                    return Ok(SubmitOutcome::Accepted(record));
                }
                RecordOutcome::Duplicate(existing) if existing.submission_id == submission_id => {
                    self.notifier.notify(session_id, ChangeKind::Answer).await;
                    return Ok(SubmitOutcome::Accepted(existing));
                }
                RecordOutcome::Duplicate(_) => return Ok(SubmitOutcome::Duplicate),
                RecordOutcome::Conflict { current } => {
                    tracing::debug!(
                        "Session {} moved to v{} while answering, re-validating",
                        session_id,
                        current
                    );
                }
                RecordOutcome::MissingSession => {
                    return Err(SessionError::session_not_found(session_id))
                }
                RecordOutcome::MissingPlayer => {
                    return Err(SessionError::NotFound(format!("player {}", player_id)))
                }
            }
        }

        Err(SessionError::TransientIo(StoreError::Unavailable(format!(
            "session {} is under heavy contention",
            session_id
        ))))
    }

    pub async fn answers_for_question(
        &self,
        session_id: &str,
        question_id: &str,
    ) -> SessionResult<Vec<AnswerRecord>> {
        self.load_session(session_id).await?;
        self.load_answers(session_id, Some(question_id)).await
    }

    /// How many players have answered the given question so far
    pub async fn answered_count(&self, session_id: &str, question_id: &str) -> SessionResult<usize> {
        Ok(self.answers_for_question(session_id, question_id).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::state::test_support::{active_session, question, survey};
    use crate::store::{
        CasOutcome, MemoryStore, RetryPolicy, SessionStore, StoreResult,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    async fn join(state: &AppState, session_id: &str, name: &str) -> Player {
        state.join_player(session_id, name, None, None).await.unwrap()
    }

    fn choice(index: usize) -> AnswerValue {
        AnswerValue::Choice { index }
    }

    #[tokio::test]
    async fn test_correct_fast_answer_earns_full_points() {
        let state = AppState::new();
        let session = active_session(&state).await;
        let alice = join(&state, &session.id, "Alice").await;

        let outcome = state
            .submit_answer(&session.id, &alice.id, "q1", choice(1), 0.0)
            .await
            .unwrap();
        let SubmitOutcome::Accepted(record) = outcome else {
            panic!("Expected Accepted, got {:?}", outcome);
        };
        assert_eq!(record.points, 2000);
        assert_eq!(record.is_correct, Some(true));
        assert!(record.server_elapsed_seconds.unwrap() >= 0.0);

        let players = state.get_players(&session.id).await.unwrap();
        assert_eq!(players[0].score, 2000);
    }

    #[tokio::test]
    async fn test_wrong_answer_scores_zero() {
        let state = AppState::new();
        let session = active_session(&state).await;
        let bob = join(&state, &session.id, "Bob").await;

        let outcome = state
            .submit_answer(&session.id, &bob.id, "q1", choice(3), 1.0)
            .await
            .unwrap();
        let SubmitOutcome::Accepted(record) = outcome else {
            panic!("Expected Accepted, got {:?}", outcome);
        };
        assert_eq!(record.points, 0);
        assert_eq!(record.is_correct, Some(false));
    }

    #[tokio::test]
    async fn test_second_answer_is_duplicate_and_changes_nothing() {
        let state = AppState::new();
        let session = active_session(&state).await;
        let alice = join(&state, &session.id, "Alice").await;

        state
            .submit_answer(&session.id, &alice.id, "q1", choice(1), 5.0)
            .await
            .unwrap();
        let again = state
            .submit_answer(&session.id, &alice.id, "q1", choice(1), 0.0)
            .await
            .unwrap();
        assert_eq!(again, SubmitOutcome::Duplicate);

        let records = state.answers_for_question(&session.id, "q1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].points, 1500);
        assert_eq!(state.get_players(&session.id).await.unwrap()[0].score, 1500);
    }

    #[tokio::test]
    async fn test_answers_outside_window_are_rejected() {
        let state = AppState::new();
        let session = state
            .create_session(vec![question("q1", 0)], SessionConfig::default())
            .await
            .unwrap();
        let alice = join(&state, &session.id, "Alice").await;

        let lobby = state
            .submit_answer(&session.id, &alice.id, "q1", choice(0), 0.0)
            .await
            .unwrap();
        assert_eq!(lobby, SubmitOutcome::Rejected(RejectReason::PhaseMismatch));

        state
            .transition_phase(&session.id, SessionPhase::QuestionIntro)
            .await
            .unwrap();
        let intro = state
            .submit_answer(&session.id, &alice.id, "q1", choice(0), 0.0)
            .await
            .unwrap();
        assert_eq!(intro, SubmitOutcome::Rejected(RejectReason::PhaseMismatch));

        state
            .transition_phase(&session.id, SessionPhase::QuestionActive)
            .await
            .unwrap();
        state
            .transition_phase(&session.id, SessionPhase::QuestionResult)
            .await
            .unwrap();
        let late = state
            .submit_answer(&session.id, &alice.id, "q1", choice(0), 0.0)
            .await
            .unwrap();
        assert_eq!(late, SubmitOutcome::Rejected(RejectReason::PhaseMismatch));

        assert!(state.load_answers(&session.id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_answer_for_other_question_is_stale() {
        let state = AppState::new();
        let session = active_session(&state).await;
        let alice = join(&state, &session.id, "Alice").await;

        let outcome = state
            .submit_answer(&session.id, &alice.id, "q2", choice(2), 0.0)
            .await
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Rejected(RejectReason::StaleQuestion));
    }

    #[tokio::test]
    async fn test_malformed_answers_are_rejected() {
        let state = AppState::new();
        let session = active_session(&state).await;
        let alice = join(&state, &session.id, "Alice").await;

        for answer in [
            choice(4),
            AnswerValue::FreeForm {
                text: "B".to_string(),
            },
        ] {
            let outcome = state
                .submit_answer(&session.id, &alice.id, "q1", answer, 0.0)
                .await
                .unwrap();
            assert_eq!(outcome, SubmitOutcome::Rejected(RejectReason::InvalidAnswer));
        }

        // A rejected attempt leaves the slot open
        let outcome = state
            .submit_answer(&session.id, &alice.id, "q1", choice(1), 0.0)
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Accepted(_)));
    }

    #[tokio::test]
    async fn test_survey_accepts_free_form_without_points() {
        let state = AppState::new();
        let session = state
            .create_session(vec![survey("s1")], SessionConfig::default())
            .await
            .unwrap();
        let alice = join(&state, &session.id, "Alice").await;
        let bob = join(&state, &session.id, "Bob").await;
        state
            .transition_phase(&session.id, SessionPhase::QuestionIntro)
            .await
            .unwrap();
        state
            .transition_phase(&session.id, SessionPhase::QuestionActive)
            .await
            .unwrap();

        let empty = state
            .submit_answer(
                &session.id,
                &alice.id,
                "s1",
                AnswerValue::FreeForm {
                    text: "   ".to_string(),
                },
                1.0,
            )
            .await
            .unwrap();
        assert_eq!(empty, SubmitOutcome::Rejected(RejectReason::InvalidAnswer));

        let text = state
            .submit_answer(
                &session.id,
                &alice.id,
                "s1",
                AnswerValue::FreeForm {
                    text: "More async please".to_string(),
                },
                1.0,
            )
            .await
            .unwrap();
        let SubmitOutcome::Accepted(record) = text else {
            panic!("Expected Accepted, got {:?}", text);
        };
        assert_eq!(record.points, 0);
        assert_eq!(record.is_correct, None);

        let vote = state
            .submit_answer(&session.id, &bob.id, "s1", choice(0), 1.0)
            .await
            .unwrap();
        assert!(matches!(vote, SubmitOutcome::Accepted(_)));
        assert_eq!(state.answered_count(&session.id, "s1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let state = AppState::new();
        let session = active_session(&state).await;
        let alice = join(&state, &session.id, "Alice").await;

        let ghost = state
            .submit_answer(&session.id, "ghost", "q1", choice(1), 0.0)
            .await
            .unwrap_err();
        assert_eq!(ghost.code(), "NOT_FOUND");

        let missing_question = state
            .submit_answer(&session.id, &alice.id, "q9", choice(1), 0.0)
            .await
            .unwrap_err();
        assert_eq!(missing_question.code(), "NOT_FOUND");

        let missing_session = state
            .submit_answer("ZZZZZZ", &alice.id, "q1", choice(1), 0.0)
            .await
            .unwrap_err();
        assert_eq!(missing_session.code(), "SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_concurrent_submissions_record_once() {
        let state = Arc::new(AppState::new());
        let session = active_session(&state).await;
        let alice = join(&state, &session.id, "Alice").await;

        let mut handles = Vec::new();
        for i in 0..16 {
            let state = state.clone();
            let session_id = session.id.clone();
            let player_id = alice.id.clone();
            handles.push(tokio::spawn(async move {
                state
                    .submit_answer(&session_id, &player_id, "q1", choice(1), i as f64 * 0.1)
                    .await
            }));
        }

        let mut accepted = Vec::new();
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                SubmitOutcome::Accepted(record) => accepted.push(record),
                SubmitOutcome::Duplicate => duplicates += 1,
                other => panic!("unexpected outcome {:?}", other),
            }
        }
        assert_eq!(accepted.len(), 1);
        assert_eq!(duplicates, 15);

        let records = state.answers_for_question(&session.id, "q1").await.unwrap();
        assert_eq!(records.len(), 1);
        let players = state.get_players(&session.id).await.unwrap();
        assert_eq!(players[0].score, accepted[0].points as u64);
    }

    #[tokio::test]
    async fn test_answer_notifies_subscribers() {
        let state = AppState::new();
        let session = active_session(&state).await;
        let alice = join(&state, &session.id, "Alice").await;
        let mut rx = state.notifier.subscribe(&session.id).await.unwrap();

        state
            .submit_answer(&session.id, &alice.id, "q1", choice(1), 0.0)
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Answer);
    }

    #[test]
    fn test_answer_distribution_counts_choices() {
        let q = question("q1", 0);
        let record = |index: usize| AnswerRecord {
            session_id: "AAAAAA".to_string(),
            player_id: Ulid::new().to_string(),
            question_id: "q1".to_string(),
            submission_id: Ulid::new().to_string(),
            answer: choice(index),
            elapsed_seconds: 1.0,
            server_elapsed_seconds: None,
            is_correct: Some(index == 0),
            points: 0,
            submitted_at: Utc::now(),
        };
        let records = vec![record(0), record(2), record(2), record(3)];
        assert_eq!(answer_distribution(&q, &records), vec![1, 0, 2, 1]);
        assert_eq!(answer_distribution(&q, &[]), vec![0, 0, 0, 0]);
    }

    /// Commits the first ledger write but reports it as failed
    struct LostAckStore {
        inner: MemoryStore,
        dropped: AtomicBool,
    }

    #[async_trait]
    impl SessionStore for LostAckStore {
        async fn create_session(&self, session: Session, questions: Vec<Question>) -> StoreResult<()> {
            self.inner.create_session(session, questions).await
        }

        async fn get_session(&self, id: &str) -> StoreResult<Option<Session>> {
            self.inner.get_session(id).await
        }

        async fn get_questions(&self, id: &str) -> StoreResult<Option<Vec<Question>>> {
            self.inner.get_questions(id).await
        }

        async fn compare_and_swap_session(
            &self,
            expected_version: u64,
            next: Session,
        ) -> StoreResult<CasOutcome> {
            self.inner.compare_and_swap_session(expected_version, next).await
        }

        async fn insert_player(&self, player: Player) -> StoreResult<Option<Player>> {
            self.inner.insert_player(player).await
        }

        async fn get_player(&self, session_id: &str, player_id: &str) -> StoreResult<Option<Player>> {
            self.inner.get_player(session_id, player_id).await
        }

        async fn list_players(&self, session_id: &str) -> StoreResult<Vec<Player>> {
            self.inner.list_players(session_id).await
        }

        async fn record_answer(
            &self,
            session_version: u64,
            record: AnswerRecord,
        ) -> StoreResult<RecordOutcome> {
            let outcome = self.inner.record_answer(session_version, record).await?;
            if !self.dropped.swap(true, Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection reset".to_string()));
            }
            Ok(outcome)
        }

        async fn list_answers(
            &self,
            session_id: &str,
            question_id: Option<&str>,
        ) -> StoreResult<Vec<AnswerRecord>> {
            self.inner.list_answers(session_id, question_id).await
        }

        async fn remove_session(&self, id: &str) -> StoreResult<bool> {
            self.inner.remove_session(id).await
        }
    }

    #[tokio::test]
    async fn test_retry_after_lost_ack_reports_accepted_once() {
        let config = ServerConfig {
            retry: RetryPolicy {
                max_attempts: 3,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
            },
            ..ServerConfig::default()
        };
        let store = Arc::new(LostAckStore {
            inner: MemoryStore::new(),
            dropped: AtomicBool::new(false),
        });
        let state = AppState::with_store(store, &config);
        let session = active_session(&state).await;
        let alice = join(&state, &session.id, "Alice").await;

        let outcome = state
            .submit_answer(&session.id, &alice.id, "q1", choice(1), 0.0)
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Accepted(ref r) if r.points == 2000));
        assert_eq!(state.get_players(&session.id).await.unwrap()[0].score, 2000);
        assert_eq!(
            state.answers_for_question(&session.id, "q1").await.unwrap().len(),
            1
        );
    }
}
