//! Ranked standings derived from player scores.
//!
//! Everything here is pure: standings hold no state of their own and can be
//! recomputed at any time from players and the answer ledger.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{AnswerRecord, Clan, Player, PlayerId, SessionConfig};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerStanding {
    /// Competition rank: equal scores share a rank (1, 1, 3)
    pub rank: u32,
    pub player_id: PlayerId,
    pub display_name: String,
    pub clan: Option<Clan>,
    pub avatar: Option<String>,
    pub score: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClanStanding {
    pub rank: u32,
    pub clan: Clan,
    pub display_name: String,
    pub score: u64,
    pub members: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Leaderboard {
    pub players: Vec<PlayerStanding>,
    /// Present only when clan mode is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clans: Option<Vec<ClanStanding>>,
}

/// Assign competition ranks to an already sorted list of scores
fn competition_ranks(scores: impl Iterator<Item = u64>) -> Vec<u32> {
    let mut ranks = Vec::new();
    let mut prev: Option<u64> = None;
    let mut current_rank = 0u32;
    for (i, score) in scores.enumerate() {
        if prev != Some(score) {
            current_rank = i as u32 + 1;
            prev = Some(score);
        }
        ranks.push(current_rank);
    }
    ranks
}

/// Rank players by score, descending. Ties break by join order, then id.
pub fn rank(players: &[Player]) -> Vec<PlayerStanding> {
    let mut sorted: Vec<&Player> = players.iter().collect();
    sorted.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.joined_seq.cmp(&b.joined_seq))
            .then_with(|| a.id.cmp(&b.id))
    });

    let ranks = competition_ranks(sorted.iter().map(|p| p.score));
    sorted
        .into_iter()
        .zip(ranks)
        .map(|(p, rank)| PlayerStanding {
            rank,
            player_id: p.id.clone(),
            display_name: p.display_name.clone(),
            clan: p.clan,
            avatar: p.avatar.clone(),
            score: p.score,
        })
        .collect()
}

/// Sum member scores per clan. Every clan appears, even without members.
pub fn rank_clans(players: &[Player], config: &SessionConfig) -> Vec<ClanStanding> {
    let mut totals: HashMap<Clan, (u64, u32)> = HashMap::new();
    for player in players {
        if let Some(clan) = player.clan {
            let entry = totals.entry(clan).or_insert((0, 0));
            entry.0 += player.score;
            entry.1 += 1;
        }
    }

    let mut clans: Vec<(Clan, u64, u32)> = Clan::ALL
        .iter()
        .map(|clan| {
            let (score, members) = totals.get(clan).copied().unwrap_or((0, 0));
            (*clan, score, members)
        })
        .collect();
    clans.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let ranks = competition_ranks(clans.iter().map(|c| c.1));
    clans
        .into_iter()
        .zip(ranks)
        .map(|((clan, score, members), rank)| ClanStanding {
            rank,
            clan,
            display_name: config.clan_name(clan),
            score,
            members,
        })
        .collect()
}

pub fn build(players: &[Player], config: &SessionConfig) -> Leaderboard {
    Leaderboard {
        players: rank(players),
        clans: config.clan_mode.then(|| rank_clans(players, config)),
    }
}

/// Re-derive cumulative scores from the ledger. Players without records get 0.
pub fn recompute_scores(players: &[Player], records: &[AnswerRecord]) -> HashMap<PlayerId, u64> {
    let mut totals: HashMap<PlayerId, u64> =
        players.iter().map(|p| (p.id.clone(), 0)).collect();
    for record in records {
        *totals.entry(record.player_id.clone()).or_insert(0) += record.points as u64;
    }
    totals
}
