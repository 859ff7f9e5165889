//! UI-facing session wrapper. Owns one [`ChessState`] and exposes the
//! operations a client needs, stamping actions with wall-clock time.

use std::time::{SystemTime, UNIX_EPOCH};

use chess::{PieceKind, PotentialMove, Square};

use crate::reducer::{reduce, Action};
use crate::state::{BySide, ChessState, Player, PlayerKind};

/// Configuration for a fresh game.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub white: PlayerKind,
    pub black: PlayerKind,
    pub clock_minutes: u64,
}

/// One live game, driven by a single UI session.
#[derive(Debug, Clone)]
pub struct GameSession {
    state: ChessState,
}

impl GameSession {
    pub fn new(config: GameConfig) -> Self {
        Self {
            state: ChessState::new(config.clock_minutes, default_players(&config)),
        }
    }

    /// Discard the current game and start over with the same kind of state.
    pub fn start_new_game(&mut self, config: GameConfig) {
        self.state = ChessState::new(config.clock_minutes, default_players(&config));
    }

    pub fn state(&self) -> &ChessState {
        &self.state
    }

    /// Adopt a state produced elsewhere (e.g. by the reconciler).
    pub fn replace_state(&mut self, state: ChessState) {
        self.state = state;
    }

    /// Attempt a non-promoting move. Returns whether it was accepted.
    pub fn make_move(&mut self, from: Square, to: Square) -> bool {
        reduce(
            &mut self.state,
            Action::Move {
                from,
                to,
                promotion: None,
                time: now_ms(),
            },
        );
        self.state.rejection.is_none()
    }

    /// Attempt a promoting move. Returns whether it was accepted.
    pub fn promote(&mut self, from: Square, to: Square, kind: PieceKind) -> bool {
        reduce(
            &mut self.state,
            Action::Move {
                from,
                to,
                promotion: Some(kind),
                time: now_ms(),
            },
        );
        self.state.rejection.is_none()
    }

    /// Legal destinations for the piece on `square`.
    pub fn potential_moves(&self, square: Square) -> Vec<PotentialMove> {
        self.state.oracle().moves_from(square)
    }

    /// Undo the last move. Returns whether the operation was permitted.
    pub fn undo(&mut self) -> bool {
        if self.has_online_player() {
            return false;
        }
        reduce(&mut self.state, Action::Undo { time: now_ms() });
        true
    }

    /// Redo the last undone move. Returns whether the operation was permitted.
    pub fn redo(&mut self) -> bool {
        if self.has_online_player() {
            return false;
        }
        reduce(&mut self.state, Action::Redo { time: now_ms() });
        true
    }

    /// Pause the game. Always refused, but goes through the reducer so the
    /// refusal is recorded rather than silently dropped.
    pub fn pause(&mut self) -> bool {
        if self.has_online_player() {
            return false;
        }
        reduce(
            &mut self.state,
            Action::Pause {
                time: Some(now_ms()),
            },
        );
        false
    }

    /// Settle the clocks; flags the game out-of-time if one has expired.
    pub fn on_clock_expire(&mut self) {
        reduce(&mut self.state, Action::CheckTimers { time: now_ms() });
    }

    fn has_online_player(&self) -> bool {
        self.state.players.white.kind == PlayerKind::Online
            || self.state.players.black.kind == PlayerKind::Online
    }
}

fn default_players(config: &GameConfig) -> BySide<Player> {
    BySide {
        white: Player {
            name: default_name(config.white, chess::Side::White),
            kind: config.white,
        },
        black: Player {
            name: default_name(config.black, chess::Side::Black),
            kind: config.black,
        },
    }
}

fn default_name(kind: PlayerKind, side: chess::Side) -> String {
    match kind {
        PlayerKind::Bot => "BOT".to_string(),
        _ => side.as_str().to_uppercase(),
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
