//! Out-of-band move selector. The game loop talks to it over channels so a
//! slow search never blocks state updates; a reply that arrives after the
//! position has changed simply fails the ordinary legality checks when it is
//! dispatched as a move.

pub mod minimax;

use chess::{MoveOracle, MoveRequest};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;

const CHANNEL_CAPACITY: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    GenerateMove { position: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotEvent {
    Move(MoveRequest),
    Failed,
}

#[derive(Debug, Error)]
pub enum BotError {
    #[error("bot worker closed")]
    Closed,
}

/// Handle on a spawned bot worker task.
pub struct BotHandle {
    command_tx: mpsc::Sender<BotCommand>,
    event_rx: mpsc::Receiver<BotEvent>,
}

impl BotHandle {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn() -> Self {
        let (command_tx, mut command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                let BotCommand::GenerateMove { position } = command;
                let event = generate(&position);
                if event_tx.send(event).await.is_err() {
                    break;
                }
            }
            tracing::debug!("bot worker shutting down");
        });

        Self {
            command_tx,
            event_rx,
        }
    }

    pub async fn send_command(&self, command: BotCommand) -> Result<(), BotError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| BotError::Closed)
    }

    pub async fn recv_event(&mut self) -> Result<BotEvent, BotError> {
        self.event_rx.recv().await.ok_or(BotError::Closed)
    }

    /// Non-blocking poll, for callers driving a UI tick.
    pub fn try_recv_event(&mut self) -> Option<BotEvent> {
        self.event_rx.try_recv().ok()
    }
}

fn generate(position: &str) -> BotEvent {
    let oracle = match MoveOracle::from_fen(position) {
        Ok(oracle) => oracle,
        Err(error) => {
            tracing::error!(%error, "bot received an unreadable position");
            return BotEvent::Failed;
        }
    };
    let started = Instant::now();
    match minimax::select_move(&oracle) {
        Some(request) => {
            tracing::debug!(elapsed = ?started.elapsed(), "bot selected a move");
            BotEvent::Move(request)
        }
        None => BotEvent::Failed,
    }
}
