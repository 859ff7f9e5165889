//! The remote lobby record and the store contract it lives behind.

use async_trait::async_trait;
use game::CommonState;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::LobbyError;

/// One participant as recorded in the lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyPlayer {
    pub name: String,
    pub uid: String,
}

/// Seat assignment. The host always holds the white seat; the black seat is
/// empty until an opponent connects.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LobbyRoster {
    pub white: Option<LobbyPlayer>,
    pub black: Option<LobbyPlayer>,
}

/// The remote-authoritative lobby record. Written by whichever side just
/// moved, read by every participant through a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbySnapshot {
    pub lobby_id: String,
    pub host_uid: String,
    pub players: LobbyRoster,
    pub spectators: Vec<LobbyPlayer>,
    pub game: CommonState,
    pub in_game: bool,
    pub last_access_time: u64,
}

/// Backend holding lobby records, keyed by lobby id.
#[async_trait]
pub trait LobbyStore: Send + Sync {
    async fn get(&self, lobby_id: &str) -> Result<Option<LobbySnapshot>, LobbyError>;

    async fn set(&self, lobby_id: &str, snapshot: &LobbySnapshot) -> Result<(), LobbyError>;

    /// Change feed for one lobby. Every successful `set` is broadcast to all
    /// current subscribers.
    async fn subscribe(
        &self,
        lobby_id: &str,
    ) -> Result<broadcast::Receiver<LobbySnapshot>, LobbyError>;
}

#[async_trait]
impl<T: LobbyStore + ?Sized> LobbyStore for std::sync::Arc<T> {
    async fn get(&self, lobby_id: &str) -> Result<Option<LobbySnapshot>, LobbyError> {
        self.as_ref().get(lobby_id).await
    }

    async fn set(&self, lobby_id: &str, snapshot: &LobbySnapshot) -> Result<(), LobbyError> {
        self.as_ref().set(lobby_id, snapshot).await
    }

    async fn subscribe(
        &self,
        lobby_id: &str,
    ) -> Result<broadcast::Receiver<LobbySnapshot>, LobbyError> {
        self.as_ref().subscribe(lobby_id).await
    }
}

/// Pick an unused 6-digit zero-padded lobby id by rejection sampling.
/// Gives up after a bounded number of collisions.
pub async fn generate_lobby_id<S: LobbyStore + ?Sized>(store: &S) -> Result<String, LobbyError> {
    const ATTEMPTS: usize = 10;
    for _ in 0..ATTEMPTS {
        let candidate = {
            let mut rng = rand::thread_rng();
            format!("{:06}", rng.gen_range(1..=999_998u32))
        };
        if store.get(&candidate).await?.is_none() {
            return Ok(candidate);
        }
        tracing::debug!(%candidate, "lobby id collision, retrying");
    }
    Err(LobbyError::IdExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use game::{BySide, ChessState, Player, PlayerKind};

    struct FullStore;

    #[async_trait]
    impl LobbyStore for FullStore {
        async fn get(&self, lobby_id: &str) -> Result<Option<LobbySnapshot>, LobbyError> {
            let state = ChessState::with_seed(
                10,
                BySide {
                    white: Player {
                        name: "WHITE".into(),
                        kind: PlayerKind::Local,
                    },
                    black: Player {
                        name: "BLACK".into(),
                        kind: PlayerKind::Local,
                    },
                },
                1,
            );
            Ok(Some(LobbySnapshot {
                lobby_id: lobby_id.to_string(),
                host_uid: "host".into(),
                players: LobbyRoster::default(),
                spectators: Vec::new(),
                game: state.common_state(),
                in_game: false,
                last_access_time: 0,
            }))
        }

        async fn set(&self, _: &str, _: &LobbySnapshot) -> Result<(), LobbyError> {
            Ok(())
        }

        async fn subscribe(
            &self,
            _: &str,
        ) -> Result<broadcast::Receiver<LobbySnapshot>, LobbyError> {
            let (tx, rx) = broadcast::channel(1);
            drop(tx);
            Ok(rx)
        }
    }

    #[tokio::test]
    async fn id_generation_gives_up_when_every_id_is_taken() {
        let result = generate_lobby_id(&FullStore).await;
        assert!(matches!(result, Err(LobbyError::IdExhausted)));
    }
}
