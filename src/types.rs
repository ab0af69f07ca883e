use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque ID types for type safety
pub type SessionId = String;
pub type QuestionId = String;
pub type PlayerId = String;
pub type SubmissionId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    Lobby,
    ClanBattleIntro,
    ClanBattleVs,
    QuestionIntro,
    QuestionActive,
    QuestionResult,
    Leaderboard,
    Finished,
}

impl SessionPhase {
    /// Phases from which the correct answer may be shown to players
    pub fn reveals_answer(&self) -> bool {
        matches!(
            self,
            SessionPhase::QuestionResult | SessionPhase::Leaderboard | SessionPhase::Finished
        )
    }
}

/// Team grouping used when clan mode is enabled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Clan {
    Titans,
    Defenders,
}

impl Clan {
    pub const ALL: [Clan; 2] = [Clan::Titans, Clan::Defenders];

    pub fn default_name(&self) -> &'static str {
        match self {
            Clan::Titans => "Titans",
            Clan::Defenders => "Defenders",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    pub clan_mode: bool,
    #[serde(default)]
    pub clan_names: HashMap<Clan, String>,
    /// When true, players see the live "answered / players" counter
    #[serde(default)]
    pub show_live_response_count: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            clan_mode: false,
            clan_names: HashMap::new(),
            show_live_response_count: false,
        }
    }
}

impl SessionConfig {
    pub fn clan_name(&self, clan: Clan) -> String {
        self.clan_names
            .get(&clan)
            .cloned()
            .unwrap_or_else(|| clan.default_name().to_string())
    }
}

/// Open answer-accepting window for exactly one question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerWindow {
    pub question_id: QuestionId,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: SessionId,
    /// Bumped on every persisted mutation (optimistic concurrency)
    pub version: u64,
    pub phase: SessionPhase,
    pub current_question_index: usize,
    pub question_visible: bool,
    pub config: SessionConfig,
    pub answer_window: Option<AnswerWindow>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    Survey,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: Option<usize>,
    pub time_limit_seconds: u32,
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
}

/// Answer payload, tagged by the shape the question expects
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerValue {
    Choice { index: usize },
    FreeForm { text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerRecord {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub question_id: QuestionId,
    pub submission_id: SubmissionId,
    pub answer: AnswerValue,
    /// Client-reported, clamped to be non-negative
    pub elapsed_seconds: f64,
    /// Measured from the answer window opening; recorded for auditing only
    pub server_elapsed_seconds: Option<f64>,
    pub is_correct: Option<bool>,
    pub points: u32,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub session_id: SessionId,
    pub display_name: String,
    pub clan: Option<Clan>,
    pub score: u64,
    pub avatar: Option<String>,
    /// Join order within the session, used as the stable leaderboard tie-break
    pub joined_seq: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Player,
}
