//! Storage collaborator for sessions, players and the answer ledger.
//!
//! The engine only needs read-your-writes consistency within a session plus
//! two conditional writes: a compare-and-swap on the session version, and an
//! insert-if-absent of an answer record that adds its points to the player's
//! score in the same transaction.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::types::*;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("session {0} already exists")]
    AlreadyExists(SessionId),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Result of a version-guarded session write
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    Applied,
    /// Stored version differs from the expected one; nothing was written
    Conflict { current: u64 },
    Missing,
}

/// Result of an insert-if-absent ledger write
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Record stored and the player's score increased by its points
    Inserted { new_score: u64 },
    /// A record for (session, player, question) already exists; nothing changed
    Duplicate(AnswerRecord),
    /// The session moved on since validation; nothing changed
    Conflict { current: u64 },
    MissingSession,
    MissingPlayer,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: Session, questions: Vec<Question>) -> StoreResult<()>;

    async fn get_session(&self, id: &str) -> StoreResult<Option<Session>>;

    async fn get_questions(&self, id: &str) -> StoreResult<Option<Vec<Question>>>;

    /// Replace the session only if the stored version equals `expected_version`
    async fn compare_and_swap_session(
        &self,
        expected_version: u64,
        next: Session,
    ) -> StoreResult<CasOutcome>;

    /// Insert a player, assigning its join sequence number
    async fn insert_player(&self, player: Player) -> StoreResult<Option<Player>>;

    async fn get_player(&self, session_id: &str, player_id: &str) -> StoreResult<Option<Player>>;

    async fn list_players(&self, session_id: &str) -> StoreResult<Vec<Player>>;

    /// Atomically insert the record (if absent) and add its points to the
    /// player's score, provided the session is still at `session_version`
    async fn record_answer(
        &self,
        session_version: u64,
        record: AnswerRecord,
    ) -> StoreResult<RecordOutcome>;

    async fn list_answers(
        &self,
        session_id: &str,
        question_id: Option<&str>,
    ) -> StoreResult<Vec<AnswerRecord>>;

    async fn remove_session(&self, id: &str) -> StoreResult<bool>;
}

/// Exponential backoff for transient store failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, fails permanently, or attempts run out
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    tracing::warn!(attempt, error = %err, "store {} failed; retrying", what);
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.max_delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
