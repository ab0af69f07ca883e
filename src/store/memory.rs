use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{CasOutcome, RecordOutcome, SessionStore, StoreError, StoreResult};
use crate::types::*;

/// Everything belonging to one session, guarded by a single lock so ledger
/// inserts and score increments commit together
#[derive(Debug)]
struct SessionRecord {
    session: Session,
    questions: Vec<Question>,
    players: HashMap<PlayerId, Player>,
    answers: HashMap<(PlayerId, QuestionId), AnswerRecord>,
    next_join_seq: u64,
}

/// In-process store. Sessions are independent: each has its own lock.
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<SessionId, Arc<RwLock<SessionRecord>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn record(&self, id: &str) -> Option<Arc<RwLock<SessionRecord>>> {
        self.sessions.read().await.get(id).cloned()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, session: Session, questions: Vec<Question>) -> StoreResult<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(StoreError::AlreadyExists(session.id));
        }
        let id = session.id.clone();
        let record = SessionRecord {
            session,
            questions,
            players: HashMap::new(),
            answers: HashMap::new(),
            next_join_seq: 0,
        };
        sessions.insert(id, Arc::new(RwLock::new(record)));
        Ok(())
    }

    async fn get_session(&self, id: &str) -> StoreResult<Option<Session>> {
        match self.record(id).await {
            Some(record) => Ok(Some(record.read().await.session.clone())),
            None => Ok(None),
        }
    }

    async fn get_questions(&self, id: &str) -> StoreResult<Option<Vec<Question>>> {
        match self.record(id).await {
            Some(record) => Ok(Some(record.read().await.questions.clone())),
            None => Ok(None),
        }
    }

    async fn compare_and_swap_session(
        &self,
        expected_version: u64,
        next: Session,
    ) -> StoreResult<CasOutcome> {
        let Some(record) = self.record(&next.id).await else {
            return Ok(CasOutcome::Missing);
        };
        let mut record = record.write().await;
        if record.session.version != expected_version {
            return Ok(CasOutcome::Conflict {
                current: record.session.version,
            });
        }
        record.session = next;
        Ok(CasOutcome::Applied)
    }

    async fn insert_player(&self, mut player: Player) -> StoreResult<Option<Player>> {
        let Some(record) = self.record(&player.session_id).await else {
            return Ok(None);
        };
        let mut record = record.write().await;
        player.joined_seq = record.next_join_seq;
        record.next_join_seq += 1;
        record.players.insert(player.id.clone(), player.clone());
        Ok(Some(player))
    }

    async fn get_player(&self, session_id: &str, player_id: &str) -> StoreResult<Option<Player>> {
        match self.record(session_id).await {
            Some(record) => Ok(record.read().await.players.get(player_id).cloned()),
            None => Ok(None),
        }
    }

    async fn list_players(&self, session_id: &str) -> StoreResult<Vec<Player>> {
        match self.record(session_id).await {
            Some(record) => {
                let record = record.read().await;
                let mut players: Vec<Player> = record.players.values().cloned().collect();
                players.sort_by_key(|p| p.joined_seq);
                Ok(players)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn record_answer(
        &self,
        session_version: u64,
        record: AnswerRecord,
    ) -> StoreResult<RecordOutcome> {
        let Some(session_record) = self.record(&record.session_id).await else {
            return Ok(RecordOutcome::MissingSession);
        };
        let mut guard = session_record.write().await;

        let key = (record.player_id.clone(), record.question_id.clone());
        if let Some(existing) = guard.answers.get(&key) {
            return Ok(RecordOutcome::Duplicate(existing.clone()));
        }
        if guard.session.version != session_version {
            return Ok(RecordOutcome::Conflict {
                current: guard.session.version,
            });
        }
        let Some(player) = guard.players.get_mut(&record.player_id) else {
            return Ok(RecordOutcome::MissingPlayer);
        };

        player.score += record.points as u64;
        let new_score = player.score;
        guard.answers.insert(key, record);
        Ok(RecordOutcome::Inserted { new_score })
    }

    async fn list_answers(
        &self,
        session_id: &str,
        question_id: Option<&str>,
    ) -> StoreResult<Vec<AnswerRecord>> {
        let Some(record) = self.record(session_id).await else {
            return Ok(Vec::new());
        };
        let record = record.read().await;
        let mut answers: Vec<AnswerRecord> = record
            .answers
            .values()
            .filter(|a| question_id.is_none_or(|q| a.question_id == q))
            .cloned()
            .collect();
        answers.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        Ok(answers)
    }

    async fn remove_session(&self, id: &str) -> StoreResult<bool> {
        Ok(self.sessions.write().await.remove(id).is_some())
    }
}
