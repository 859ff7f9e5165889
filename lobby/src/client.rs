//! Lobby lifecycle from one participant's point of view: create a lobby,
//! join one, start the game and publish local moves.

use game::{BySide, ChessState, Player, PlayerKind};
use tokio::sync::broadcast;

use crate::error::LobbyError;
use crate::store::{generate_lobby_id, LobbyPlayer, LobbyRoster, LobbySnapshot, LobbyStore};

const DEFAULT_CLOCK_MINUTES: u64 = 10;

/// One participant's handle on the lobby store.
pub struct LobbyClient<S> {
    store: S,
    uid: String,
    name: String,
}

impl<S: LobbyStore> LobbyClient<S> {
    pub fn new(store: S, uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            store,
            uid: uid.into(),
            name: name.into(),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Create a fresh lobby with this participant in the white seat.
    pub async fn create(&self, now: u64) -> Result<LobbySnapshot, LobbyError> {
        let lobby_id = generate_lobby_id(&self.store).await?;
        let state = ChessState::new(DEFAULT_CLOCK_MINUTES, self.initial_players());
        let snapshot = LobbySnapshot {
            lobby_id: lobby_id.clone(),
            host_uid: self.uid.clone(),
            players: LobbyRoster {
                white: Some(self.as_lobby_player()),
                black: None,
            },
            spectators: Vec::new(),
            game: state.common_state(),
            in_game: false,
            last_access_time: now,
        };
        self.store.set(&lobby_id, &snapshot).await?;
        tracing::info!(%lobby_id, "lobby created");
        Ok(snapshot)
    }

    /// Join an existing lobby: claim the black seat if it is free, otherwise
    /// become a spectator. Re-joining a lobby you are already in is a no-op.
    pub async fn connect(&self, lobby_id: &str) -> Result<LobbySnapshot, LobbyError> {
        let mut snapshot = self
            .store
            .get(lobby_id)
            .await?
            .ok_or_else(|| LobbyError::NotFound(lobby_id.to_string()))?;

        if self.is_seated(&snapshot) {
            return Ok(snapshot);
        }
        if snapshot.players.black.is_none() {
            snapshot.players.black = Some(self.as_lobby_player());
            tracing::info!(%lobby_id, uid = %self.uid, "joined as black");
        } else if !snapshot.spectators.iter().any(|p| p.uid == self.uid) {
            snapshot.spectators.push(self.as_lobby_player());
            tracing::info!(%lobby_id, uid = %self.uid, "joined as spectator");
        }
        self.store.set(lobby_id, &snapshot).await?;
        Ok(snapshot)
    }

    /// Mark the lobby as in-game. Host-only by convention.
    pub async fn start(&self, lobby_id: &str) -> Result<(), LobbyError> {
        let mut snapshot = self
            .store
            .get(lobby_id)
            .await?
            .ok_or_else(|| LobbyError::NotFound(lobby_id.to_string()))?;
        snapshot.in_game = true;
        self.store.set(lobby_id, &snapshot).await
    }

    /// Publish the local state after a move, making it the lobby-authoritative
    /// version the other participants reconcile against.
    pub async fn sync(
        &self,
        lobby_id: &str,
        state: &ChessState,
        now: u64,
    ) -> Result<(), LobbyError> {
        let mut snapshot = self
            .store
            .get(lobby_id)
            .await?
            .ok_or_else(|| LobbyError::NotFound(lobby_id.to_string()))?;
        snapshot.game = state.common_state();
        snapshot.last_access_time = state.clocks[state.turn].started_at.unwrap_or(now);
        self.store.set(lobby_id, &snapshot).await
    }

    pub async fn subscribe(
        &self,
        lobby_id: &str,
    ) -> Result<broadcast::Receiver<LobbySnapshot>, LobbyError> {
        self.store.subscribe(lobby_id).await
    }

    fn is_seated(&self, snapshot: &LobbySnapshot) -> bool {
        let uid = Some(self.uid.as_str());
        snapshot.players.white.as_ref().map(|p| p.uid.as_str()) == uid
            || snapshot.players.black.as_ref().map(|p| p.uid.as_str()) == uid
    }

    fn as_lobby_player(&self) -> LobbyPlayer {
        LobbyPlayer {
            name: self.name.clone(),
            uid: self.uid.clone(),
        }
    }

    fn initial_players(&self) -> BySide<Player> {
        BySide {
            white: Player {
                name: self.name.clone(),
                kind: PlayerKind::Local,
            },
            black: Player {
                name: "connecting".to_string(),
                kind: PlayerKind::Online,
            },
        }
    }
}

/// Random participant identity for clients that have no account system.
pub fn anonymous_uid() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLobbyStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn create_then_connect_fills_both_seats() {
        let store = Arc::new(MemoryLobbyStore::new());
        let host = LobbyClient::new(store.clone(), "uid-host", "host");
        let guest = LobbyClient::new(store.clone(), "uid-guest", "guest");

        let created = host.create(1_000).await.unwrap();
        assert_eq!(created.lobby_id.len(), 6);
        assert!(created.players.black.is_none());
        assert!(!created.in_game);

        let joined = guest.connect(&created.lobby_id).await.unwrap();
        assert_eq!(
            joined.players.black.as_ref().map(|p| p.uid.as_str()),
            Some("uid-guest")
        );

        // Reconnecting changes nothing.
        let again = guest.connect(&created.lobby_id).await.unwrap();
        assert_eq!(again.players, joined.players);
        assert!(again.spectators.is_empty());
    }

    #[tokio::test]
    async fn third_participant_becomes_a_spectator() {
        let store = Arc::new(MemoryLobbyStore::new());
        let host = LobbyClient::new(store.clone(), "uid-host", "host");
        let guest = LobbyClient::new(store.clone(), "uid-guest", "guest");
        let watcher = LobbyClient::new(store.clone(), "uid-watcher", "watcher");

        let created = host.create(1_000).await.unwrap();
        guest.connect(&created.lobby_id).await.unwrap();
        let snapshot = watcher.connect(&created.lobby_id).await.unwrap();
        assert_eq!(snapshot.spectators.len(), 1);
        assert_eq!(snapshot.spectators[0].uid, "uid-watcher");
    }

    #[tokio::test]
    async fn connect_to_a_missing_lobby_fails() {
        let store = Arc::new(MemoryLobbyStore::new());
        let guest = LobbyClient::new(store, "uid-guest", "guest");
        let result = guest.connect("999999").await;
        assert!(matches!(result, Err(LobbyError::NotFound(_))));
    }

    #[tokio::test]
    async fn start_and_sync_update_the_record() {
        let store = Arc::new(MemoryLobbyStore::new());
        let host = LobbyClient::new(store.clone(), "uid-host", "host");
        let created = host.create(1_000).await.unwrap();

        host.start(&created.lobby_id).await.unwrap();

        let mut state = ChessState::new(10, host_players());
        game::reduce(
            &mut state,
            game::Action::Move {
                from: "e2".parse().unwrap(),
                to: "e4".parse().unwrap(),
                promotion: None,
                time: 2_000,
            },
        );
        host.sync(&created.lobby_id, &state, 3_000).await.unwrap();

        let stored = store.get(&created.lobby_id).await.unwrap().unwrap();
        assert!(stored.in_game);
        assert_eq!(stored.game.moves.len(), 1);
        assert_eq!(stored.last_access_time, 2_000);
    }

    fn host_players() -> BySide<Player> {
        BySide {
            white: Player {
                name: "host".into(),
                kind: PlayerKind::Local,
            },
            black: Player {
                name: "connecting".into(),
                kind: PlayerKind::Online,
            },
        }
    }
}
