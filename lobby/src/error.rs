use thiserror::Error;

#[derive(Debug, Error)]
pub enum LobbyError {
    #[error("lobby {0} does not exist")]
    NotFound(String),

    #[error("could not find a free lobby id")]
    IdExhausted,

    #[error("lobby store error: {0}")]
    Store(String),
}
