use super::AppState;
use crate::error::{SessionError, SessionResult};
use crate::notify::ChangeKind;
use crate::types::*;

/// Longest display name accepted at join
pub const MAX_DISPLAY_NAME_LEN: usize = 40;

impl AppState {
    /// Add a player to a session.
    ///
    /// With clan mode on and no clan requested, the player joins whichever
    /// clan is currently smaller (Titans on a tie).
    pub async fn join_player(
        &self,
        session_id: &str,
        display_name: &str,
        clan: Option<Clan>,
        avatar: Option<String>,
    ) -> SessionResult<Player> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(SessionError::InvalidInput(
                "display name must not be empty".to_string(),
            ));
        }
        if display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(SessionError::InvalidInput(format!(
                "display name is longer than {} characters",
                MAX_DISPLAY_NAME_LEN
            )));
        }

        let session = self.load_session(session_id).await?;
        if session.phase == SessionPhase::Finished {
            return Err(SessionError::InvalidInput(
                "session has already finished".to_string(),
            ));
        }

        let clan = match (session.config.clan_mode, clan) {
            (false, Some(_)) => {
                return Err(SessionError::InvalidInput(
                    "session is not in clan mode".to_string(),
                ))
            }
            (false, None) => None,
            (true, Some(clan)) => Some(clan),
            (true, None) => {
                let players = self.load_players(session_id).await?;
                let count = |c: Clan| players.iter().filter(|p| p.clan == Some(c)).count();
                Clan::ALL.into_iter().min_by_key(|c| count(*c))
            }
        };

        let player = Player {
            id: ulid::Ulid::new().to_string(),
            session_id: session_id.to_string(),
            display_name: display_name.to_string(),
            clan,
            score: 0,
            avatar,
            joined_seq: 0,
        };

        let store = &self.store;
        let player = self
            .retry
            .run("insert_player", move || store.insert_player(player.clone()))
            .await?
            .ok_or_else(|| SessionError::session_not_found(session_id))?;

        tracing::info!(
            "Player {} ({}) joined session {}{}",
            player.display_name,
            player.id,
            session_id,
            player
                .clan
                .map(|c| format!(" as {}", session.config.clan_name(c)))
                .unwrap_or_default()
        );
        self.notifier.notify(session_id, ChangeKind::Players).await;
        Ok(player)
    }

    /// Players in join order
    pub async fn get_players(&self, session_id: &str) -> SessionResult<Vec<Player>> {
        self.load_session(session_id).await?;
        self.load_players(session_id).await
    }

    pub async fn get_player(&self, session_id: &str, player_id: &str) -> SessionResult<Player> {
        let store = &self.store;
        self.retry
            .run("get_player", move || store.get_player(session_id, player_id))
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("player {}", player_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::question;

    async fn lobby(state: &AppState, clan_mode: bool) -> Session {
        state
            .create_session(
                vec![question("q1", 0)],
                SessionConfig {
                    clan_mode,
                    ..Default::default()
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_join_trims_name_and_orders_players() {
        let state = AppState::new();
        let session = lobby(&state, false).await;

        let alice = state
            .join_player(&session.id, "  Alice ", None, Some("🦀".to_string()))
            .await
            .unwrap();
        assert_eq!(alice.display_name, "Alice");
        assert_eq!(alice.score, 0);
        assert!(alice.clan.is_none());

        state.join_player(&session.id, "Bob", None, None).await.unwrap();
        let players = state.get_players(&session.id).await.unwrap();
        let names: Vec<_> = players.iter().map(|p| p.display_name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        assert_eq!(
            state.get_player(&session.id, &alice.id).await.unwrap().avatar,
            Some("🦀".to_string())
        );
    }

    #[tokio::test]
    async fn test_join_rejects_bad_names() {
        let state = AppState::new();
        let session = lobby(&state, false).await;

        assert!(matches!(
            state.join_player(&session.id, "   ", None, None).await,
            Err(SessionError::InvalidInput(_))
        ));
        let long = "x".repeat(MAX_DISPLAY_NAME_LEN + 1);
        assert!(matches!(
            state.join_player(&session.id, &long, None, None).await,
            Err(SessionError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_join_unknown_session() {
        let state = AppState::new();
        let err = state.join_player("NOPE42", "Alice", None, None).await.unwrap_err();
        assert_eq!(err.code(), "SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_clan_assignment_balances_teams() {
        let state = AppState::new();
        let session = lobby(&state, true).await;

        let first = state.join_player(&session.id, "A", None, None).await.unwrap();
        let second = state.join_player(&session.id, "B", None, None).await.unwrap();
        let chosen = state
            .join_player(&session.id, "C", Some(Clan::Defenders), None)
            .await
            .unwrap();
        let fourth = state.join_player(&session.id, "D", None, None).await.unwrap();

        assert_eq!(first.clan, Some(Clan::Titans));
        assert_eq!(second.clan, Some(Clan::Defenders));
        assert_eq!(chosen.clan, Some(Clan::Defenders));
        assert_eq!(fourth.clan, Some(Clan::Titans));
    }

    #[tokio::test]
    async fn test_clan_requires_clan_mode() {
        let state = AppState::new();
        let session = lobby(&state, false).await;
        let result = state
            .join_player(&session.id, "A", Some(Clan::Titans), None)
            .await;
        assert!(matches!(result, Err(SessionError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_join_notifies_lobby() {
        let state = AppState::new();
        let session = lobby(&state, false).await;
        let mut rx = state.notifier.subscribe(&session.id).await.unwrap();

        state.join_player(&session.id, "Alice", None, None).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Players);
    }
}
