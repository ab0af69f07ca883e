mod ledger;
mod player;
mod session;
mod snapshot;
mod sync;

pub use ledger::{answer_distribution, SubmitOutcome};
pub use session::{natural_successor, successors, MAX_CAS_ATTEMPTS};
pub use snapshot::{QuestionView, SessionSnapshot, SnapshotFingerprint, SnapshotScope};
pub use sync::SessionFollower;

use crate::config::ServerConfig;
use crate::error::{SessionError, SessionResult};
use crate::notify::ChangeNotifier;
use crate::store::{MemoryStore, RetryPolicy, SessionStore};
use crate::types::*;
use std::sync::Arc;
use std::time::Duration;

/// Length of the join code that doubles as the session id
pub const SESSION_CODE_LENGTH: usize = 6;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub notifier: Arc<ChangeNotifier>,
    pub retry: RetryPolicy,
    /// Re-fetch interval for followers whose change feed is gone
    pub poll_interval: Duration,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), &ServerConfig::default())
    }

    pub fn with_store(store: Arc<dyn SessionStore>, config: &ServerConfig) -> Self {
        Self {
            store,
            notifier: Arc::new(ChangeNotifier::new(config.notify_capacity)),
            retry: config.retry.clone(),
            poll_interval: config.poll_interval,
        }
    }

    /// Cheap shape check so malformed ids never reach the store
    pub fn is_session_code(id: &str) -> bool {
        id.len() == SESSION_CODE_LENGTH && id.chars().all(|c| c.is_ascii_alphanumeric())
    }

    pub(crate) async fn load_session(&self, id: &str) -> SessionResult<Session> {
        if !Self::is_session_code(id) {
            return Err(SessionError::session_not_found(id));
        }
        let store = &self.store;
        self.retry
            .run("get_session", move || store.get_session(id))
            .await?
            .ok_or_else(|| SessionError::session_not_found(id))
    }

    pub(crate) async fn load_questions(&self, id: &str) -> SessionResult<Vec<Question>> {
        if !Self::is_session_code(id) {
            return Err(SessionError::session_not_found(id));
        }
        let store = &self.store;
        self.retry
            .run("get_questions", move || store.get_questions(id))
            .await?
            .ok_or_else(|| SessionError::session_not_found(id))
    }

    pub(crate) async fn load_players(&self, id: &str) -> SessionResult<Vec<Player>> {
        let store = &self.store;
        Ok(self
            .retry
            .run("list_players", move || store.list_players(id))
            .await?)
    }

    pub(crate) async fn load_answers(
        &self,
        id: &str,
        question_id: Option<&str>,
    ) -> SessionResult<Vec<AnswerRecord>> {
        let store = &self.store;
        Ok(self
            .retry
            .run("list_answers", move || store.list_answers(id, question_id))
            .await?)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
