pub mod client;
pub mod error;
pub mod memory;
pub mod store;
pub mod sync;

pub use client::{anonymous_uid, LobbyClient};
pub use error::LobbyError;
pub use memory::MemoryLobbyStore;
pub use store::{generate_lobby_id, LobbyPlayer, LobbyRoster, LobbySnapshot, LobbyStore};
pub use sync::{reconcile, SyncConflict};
