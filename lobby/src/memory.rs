//! In-process lobby store, used by tests and local multiplayer sessions.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};

use crate::error::LobbyError;
use crate::store::{LobbySnapshot, LobbyStore};

const CHANNEL_CAPACITY: usize = 16;

#[derive(Default)]
struct Inner {
    records: HashMap<String, serde_json::Value>,
    channels: HashMap<String, broadcast::Sender<LobbySnapshot>>,
}

/// Keeps every record as a JSON document, so values observe the same
/// serialization round trip they would over a real wire.
#[derive(Default)]
pub struct MemoryLobbyStore {
    inner: Mutex<Inner>,
}

impl MemoryLobbyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LobbyStore for MemoryLobbyStore {
    async fn get(&self, lobby_id: &str) -> Result<Option<LobbySnapshot>, LobbyError> {
        let inner = self.inner.lock().await;
        match inner.records.get(lobby_id) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| LobbyError::Store(e.to_string())),
            None => Ok(None),
        }
    }

    async fn set(&self, lobby_id: &str, snapshot: &LobbySnapshot) -> Result<(), LobbyError> {
        let value =
            serde_json::to_value(snapshot).map_err(|e| LobbyError::Store(e.to_string()))?;
        let mut inner = self.inner.lock().await;
        inner.records.insert(lobby_id.to_string(), value);
        if let Some(tx) = inner.channels.get(lobby_id) {
            // Nobody listening is fine; receivers come and go.
            let _ = tx.send(snapshot.clone());
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        lobby_id: &str,
    ) -> Result<broadcast::Receiver<LobbySnapshot>, LobbyError> {
        let mut inner = self.inner.lock().await;
        let tx = inner
            .channels
            .entry(lobby_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        Ok(tx.subscribe())
    }
}
