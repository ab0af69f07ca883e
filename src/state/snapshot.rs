//! Read model pushed to clients after every observed change.

use serde::{Deserialize, Serialize};

use super::{answer_distribution, AppState};
use crate::error::SessionResult;
use crate::leaderboard::{self, Leaderboard};
use crate::types::*;

/// Who a snapshot is prepared for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotScope {
    Host,
    Player,
}

impl From<Role> for SnapshotScope {
    fn from(role: Role) -> Self {
        match role {
            Role::Host => SnapshotScope::Host,
            Role::Player => SnapshotScope::Player,
        }
    }
}

/// The current question as shown on screen
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionView {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<String>,
    pub kind: QuestionKind,
    pub time_limit_seconds: u32,
    /// Withheld from players until the result is shown
    pub correct_index: Option<usize>,
    /// 1-based position within the quiz
    pub position: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
}

impl QuestionView {
    fn new(question: &Question, index: usize, total: usize) -> Self {
        Self {
            id: question.id.clone(),
            text: question.text.clone(),
            options: question.options.clone(),
            kind: question.kind,
            time_limit_seconds: question.time_limit_seconds,
            correct_index: question.correct_index,
            position: index + 1,
            total,
            technology: question.technology.clone(),
            skill: question.skill.clone(),
        }
    }
}

/// A joined player as shown on the lobby and clan screens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RosterEntry {
    pub id: PlayerId,
    pub display_name: String,
    pub clan: Option<Clan>,
    pub avatar: Option<String>,
}

impl From<&Player> for RosterEntry {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            display_name: player.display_name.clone(),
            clan: player.clan,
            avatar: player.avatar.clone(),
        }
    }
}

/// Players in join order
fn roster(players: &[Player]) -> Vec<RosterEntry> {
    let mut ordered: Vec<&Player> = players.iter().collect();
    ordered.sort_by_key(|p| p.joined_seq);
    ordered.into_iter().map(RosterEntry::from).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSnapshot {
    pub session: Session,
    pub question_count: usize,
    pub current_question: Option<QuestionView>,
    pub has_next_question: bool,
    /// Phases the host may move to next (empty for players)
    pub valid_transitions: Vec<SessionPhase>,
    pub player_count: usize,
    /// Who has joined, before the first question
    pub roster: Option<Vec<RosterEntry>>,
    /// Answers recorded for the current question
    pub answered_count: Option<usize>,
    /// Per-option counts, from QUESTION_RESULT onward
    pub answer_distribution: Option<Vec<u32>>,
    /// Standings, on LEADERBOARD and FINISHED
    pub leaderboard: Option<Leaderboard>,
}

/// The parts of a snapshot whose change is worth pushing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotFingerprint {
    pub version: u64,
    pub answered_count: Option<usize>,
    pub player_count: usize,
    pub has_leaderboard: bool,
}

impl SessionSnapshot {
    /// Redact what a player must not see yet
    pub fn for_player(mut self) -> Self {
        let phase = self.session.phase;
        if !self.session.question_visible && !phase.reveals_answer() {
            self.current_question = None;
        }
        if !phase.reveals_answer() {
            if let Some(question) = self.current_question.as_mut() {
                question.correct_index = None;
            }
        }
        if !self.session.config.show_live_response_count {
            self.answered_count = None;
        }
        self.valid_transitions.clear();
        self
    }

    pub fn fingerprint(&self) -> SnapshotFingerprint {
        SnapshotFingerprint {
            version: self.session.version,
            answered_count: self.answered_count,
            player_count: self.player_count,
            has_leaderboard: self.leaderboard.is_some(),
        }
    }
}

impl AppState {
    /// Assemble the current read model of a session
    pub async fn snapshot(
        &self,
        session_id: &str,
        scope: SnapshotScope,
    ) -> SessionResult<SessionSnapshot> {
        let session = self.load_session(session_id).await?;
        let questions = self.load_questions(session_id).await?;
        let players = self.load_players(session_id).await?;

        let question = questions.get(session.current_question_index);
        let answers = match question {
            Some(q) => self.load_answers(session_id, Some(&q.id)).await?,
            None => Vec::new(),
        };

        let shows_result = matches!(
            session.phase,
            SessionPhase::QuestionResult | SessionPhase::Leaderboard | SessionPhase::Finished
        );
        let shows_roster = matches!(
            session.phase,
            SessionPhase::Lobby | SessionPhase::ClanBattleIntro | SessionPhase::ClanBattleVs
        );
        let shows_leaderboard = matches!(
            session.phase,
            SessionPhase::Leaderboard | SessionPhase::Finished
        );

        let snapshot = SessionSnapshot {
            question_count: questions.len(),
            current_question: question
                .map(|q| QuestionView::new(q, session.current_question_index, questions.len())),
            has_next_question: session.has_next_question(questions.len()),
            valid_transitions: session.valid_transitions(questions.len()),
            player_count: players.len(),
            roster: shows_roster.then(|| roster(&players)),
            answered_count: question.map(|_| answers.len()),
            answer_distribution: question
                .filter(|_| shows_result)
                .map(|q| answer_distribution(q, &answers)),
            leaderboard: shows_leaderboard
                .then(|| leaderboard::build(&players, &session.config)),
            session,
        };

        Ok(match scope {
            SnapshotScope::Host => snapshot,
            SnapshotScope::Player => snapshot.for_player(),
        })
    }

    pub async fn leaderboard(&self, session_id: &str) -> SessionResult<Leaderboard> {
        let session = self.load_session(session_id).await?;
        let players = self.load_players(session_id).await?;
        Ok(leaderboard::build(&players, &session.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::active_session;

    #[tokio::test]
    async fn test_host_snapshot_of_active_question() {
        let state = AppState::new();
        let session = active_session(&state).await;
        let alice = state.join_player(&session.id, "Alice", None, None).await.unwrap();
        state
            .submit_answer(&session.id, &alice.id, "q1", AnswerValue::Choice { index: 1 }, 0.0)
            .await
            .unwrap();

        let snap = state.snapshot(&session.id, SnapshotScope::Host).await.unwrap();
        assert_eq!(snap.session.phase, SessionPhase::QuestionActive);
        assert_eq!(snap.question_count, 3);
        assert!(snap.has_next_question);
        assert_eq!(snap.valid_transitions, vec![SessionPhase::QuestionResult]);
        assert_eq!(snap.player_count, 1);
        assert_eq!(snap.answered_count, Some(1));
        assert!(snap.answer_distribution.is_none());
        assert!(snap.leaderboard.is_none());

        let question = snap.current_question.unwrap();
        assert_eq!(question.id, "q1");
        assert_eq!(question.position, 1);
        assert_eq!(question.total, 3);
        assert_eq!(question.correct_index, Some(1));
    }

    #[tokio::test]
    async fn test_player_snapshot_redacts_until_result() {
        let state = AppState::new();
        let session = active_session(&state).await;

        let active = state.snapshot(&session.id, SnapshotScope::Player).await.unwrap();
        let question = active.current_question.unwrap();
        assert_eq!(question.correct_index, None);
        assert!(active.answered_count.is_none());
        assert!(active.valid_transitions.is_empty());

        state
            .transition_phase(&session.id, SessionPhase::QuestionResult)
            .await
            .unwrap();
        let result = state.snapshot(&session.id, SnapshotScope::Player).await.unwrap();
        assert_eq!(result.current_question.unwrap().correct_index, Some(1));
        assert_eq!(result.answer_distribution, Some(vec![0, 0, 0, 0]));
    }

    #[tokio::test]
    async fn test_hidden_question_is_withheld_from_players() {
        let state = AppState::new();
        let session = state
            .create_session(
                vec![crate::state::test_support::question("q1", 0)],
                SessionConfig::default(),
            )
            .await
            .unwrap();
        state
            .transition_phase(&session.id, SessionPhase::QuestionIntro)
            .await
            .unwrap();

        let hidden = state.snapshot(&session.id, SnapshotScope::Player).await.unwrap();
        assert!(hidden.current_question.is_none());
        let host = state.snapshot(&session.id, SnapshotScope::Host).await.unwrap();
        assert!(host.current_question.is_some());

        state.set_question_visible(&session.id, true).await.unwrap();
        let shown = state.snapshot(&session.id, SnapshotScope::Player).await.unwrap();
        assert_eq!(shown.current_question.unwrap().id, "q1");
    }

    #[tokio::test]
    async fn test_live_response_count_follows_config() {
        let state = AppState::new();
        let session = state
            .create_session(
                vec![crate::state::test_support::question("q1", 0)],
                SessionConfig {
                    show_live_response_count: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let snap = state.snapshot(&session.id, SnapshotScope::Player).await.unwrap();
        assert_eq!(snap.answered_count, Some(0));
    }

    #[tokio::test]
    async fn test_leaderboard_phase_carries_standings() {
        let state = AppState::new();
        let session = active_session(&state).await;
        let alice = state.join_player(&session.id, "Alice", None, None).await.unwrap();
        let bob = state.join_player(&session.id, "Bob", None, None).await.unwrap();
        state
            .submit_answer(&session.id, &bob.id, "q1", AnswerValue::Choice { index: 1 }, 0.0)
            .await
            .unwrap();
        state
            .submit_answer(&session.id, &alice.id, "q1", AnswerValue::Choice { index: 0 }, 0.0)
            .await
            .unwrap();
        state
            .transition_phase(&session.id, SessionPhase::QuestionResult)
            .await
            .unwrap();
        state
            .transition_phase(&session.id, SessionPhase::Leaderboard)
            .await
            .unwrap();

        let snap = state.snapshot(&session.id, SnapshotScope::Player).await.unwrap();
        assert_eq!(snap.answer_distribution, Some(vec![1, 1, 0, 0]));
        let board = snap.leaderboard.unwrap();
        assert_eq!(board.players[0].display_name, "Bob");
        assert_eq!(board.players[0].score, 2000);
        assert_eq!(board.players[1].rank, 2);
        assert!(board.clans.is_none());

        assert_eq!(state.leaderboard(&session.id).await.unwrap(), board);
    }

    #[tokio::test]
    async fn test_roster_shown_until_first_question() {
        let state = AppState::new();
        let session = state
            .create_session(
                vec![crate::state::test_support::question("q1", 0)],
                SessionConfig {
                    clan_mode: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        state
            .join_player(&session.id, "Alice", Some(Clan::Defenders), Some("crab".to_string()))
            .await
            .unwrap();
        state.join_player(&session.id, "Bob", None, None).await.unwrap();

        let lobby = state.snapshot(&session.id, SnapshotScope::Player).await.unwrap();
        let roster = lobby.roster.unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].display_name, "Alice");
        assert_eq!(roster[0].clan, Some(Clan::Defenders));
        assert_eq!(roster[0].avatar.as_deref(), Some("crab"));
        assert_eq!(roster[1].display_name, "Bob");
        assert_eq!(roster[1].clan, Some(Clan::Titans));

        state
            .transition_phase(&session.id, SessionPhase::ClanBattleIntro)
            .await
            .unwrap();
        let intro = state.snapshot(&session.id, SnapshotScope::Host).await.unwrap();
        assert_eq!(intro.roster.map(|r| r.len()), Some(2));

        state
            .transition_phase(&session.id, SessionPhase::ClanBattleVs)
            .await
            .unwrap();
        state
            .transition_phase(&session.id, SessionPhase::QuestionIntro)
            .await
            .unwrap();
        let question = state.snapshot(&session.id, SnapshotScope::Player).await.unwrap();
        assert!(question.roster.is_none());
    }

    #[tokio::test]
    async fn test_fingerprint_tracks_version_and_counts() {
        let state = AppState::new();
        let session = active_session(&state).await;
        let before = state
            .snapshot(&session.id, SnapshotScope::Host)
            .await
            .unwrap()
            .fingerprint();

        state.join_player(&session.id, "Alice", None, None).await.unwrap();
        let after = state
            .snapshot(&session.id, SnapshotScope::Host)
            .await
            .unwrap()
            .fingerprint();

        assert_eq!(before.version, after.version);
        assert_ne!(before, after);
        assert_eq!(after.player_count, 1);
    }
}
