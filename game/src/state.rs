//! Game state aggregates: the locally owned `ChessState`, the synchronized
//! `CommonState` subset, and the small value types they are built from.

use chess::{MoveOracle, MoveRecord, PieceKind, Side, Square};
use serde::{Deserialize, Serialize};

use crate::identity::{IdentityMap, PieceId, TraceEntry};
use crate::valuation::Valuation;

/// A pair of values, one per side, indexable by [`Side`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BySide<T> {
    pub white: T,
    pub black: T,
}

impl<T> std::ops::Index<Side> for BySide<T> {
    type Output = T;

    fn index(&self, side: Side) -> &T {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }
}

impl<T> std::ops::IndexMut<Side> for BySide<T> {
    fn index_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::White => &mut self.white,
            Side::Black => &mut self.black,
        }
    }
}

/// Why a finished game is over. Multiple reasons can hold at once
/// (e.g. checkmate delivered as the clock falls).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionReason {
    Checkmate,
    Draw,
    ThreefoldRepetition,
    InsufficientMaterial,
    OutOfTime,
}

impl CompletionReason {
    const ALL: [CompletionReason; 5] = [
        CompletionReason::Checkmate,
        CompletionReason::Draw,
        CompletionReason::ThreefoldRepetition,
        CompletionReason::InsufficientMaterial,
        CompletionReason::OutOfTime,
    ];

    fn bit(self) -> u8 {
        match self {
            CompletionReason::Checkmate => 1 << 0,
            CompletionReason::Draw => 1 << 1,
            CompletionReason::ThreefoldRepetition => 1 << 2,
            CompletionReason::InsufficientMaterial => 1 << 3,
            CompletionReason::OutOfTime => 1 << 4,
        }
    }
}

/// Set of [`CompletionReason`]s. Empty means the game is still running.
/// The reducer only ever adds flags; a fresh game starts empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<CompletionReason>", into = "Vec<CompletionReason>")]
pub struct CompletionFlags(u8);

impl CompletionFlags {
    pub const EMPTY: CompletionFlags = CompletionFlags(0);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, reason: CompletionReason) -> bool {
        self.0 & reason.bit() != 0
    }

    pub fn insert(&mut self, reason: CompletionReason) {
        self.0 |= reason.bit();
    }

    pub fn union(self, other: CompletionFlags) -> CompletionFlags {
        CompletionFlags(self.0 | other.0)
    }

    pub fn iter(self) -> impl Iterator<Item = CompletionReason> {
        CompletionReason::ALL
            .into_iter()
            .filter(move |r| self.contains(*r))
    }
}

impl From<Vec<CompletionReason>> for CompletionFlags {
    fn from(reasons: Vec<CompletionReason>) -> Self {
        let mut flags = CompletionFlags::EMPTY;
        for reason in reasons {
            flags.insert(reason);
        }
        flags
    }
}

impl From<CompletionFlags> for Vec<CompletionReason> {
    fn from(flags: CompletionFlags) -> Self {
        flags.iter().collect()
    }
}

/// One side's clock. `started_at` is set (unix milliseconds) only while that
/// side's clock is running; at most one side runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clock {
    pub started_at: Option<u64>,
    pub remaining: f64,
}

impl Clock {
    pub fn new(remaining_seconds: f64) -> Self {
        Self {
            started_at: None,
            remaining: remaining_seconds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    Local,
    Bot,
    Online,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub kind: PlayerKind,
}

/// One occupied square in the derived board projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardPiece {
    pub kind: PieceKind,
    pub side: Side,
    pub id: PieceId,
    pub value: f64,
}

/// 8x8 projection of the position, row 0 being rank 8. Always derived from
/// the oracle plus the identity map, never a source of truth.
pub type BoardGrid = [[Option<BoardPiece>; 8]; 8];

/// Why the last action was refused.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("move is not legal")]
    Illegal,
    #[error("cannot capture a piece valued {defender:.2} with a piece valued {attacker:.2}")]
    ValueViolation { attacker: f64, defender: f64 },
    #[error("pause is not supported")]
    Unsupported,
}

/// The authoritative local game state. Owned by one session and mutated only
/// through [`crate::reducer::reduce`].
#[derive(Debug, Clone)]
pub struct ChessState {
    pub(crate) oracle: MoveOracle,
    pub board: BoardGrid,
    pub turn: Side,
    pub check: BySide<bool>,
    pub position: String,
    pub clocks: BySide<Clock>,
    pub captured: BySide<Vec<PieceKind>>,
    pub completion: CompletionFlags,
    pub moves: Vec<MoveRecord>,
    pub redo_stack: Vec<MoveRecord>,
    pub(crate) identities: IdentityMap,
    pub(crate) trace: Vec<TraceEntry>,
    pub players: BySide<Player>,
    pub paused: bool,
    pub(crate) valuation: Valuation,
    /// Why the most recent action was refused, if it was.
    pub rejection: Option<Rejection>,
}

/// The subset of [`ChessState`] that is synchronized through the lobby.
/// Redo, identity bookkeeping and player/pause metadata stay local.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonState {
    pub clocks: BySide<Clock>,
    pub moves: Vec<MoveRecord>,
    pub captured: BySide<Vec<PieceKind>>,
    pub board: BoardGrid,
    pub turn: Side,
    pub check: BySide<bool>,
    pub position: String,
    pub completion: CompletionFlags,
}

impl ChessState {
    /// Fresh game with `clock_minutes` on each clock.
    pub fn new(clock_minutes: u64, players: BySide<Player>) -> Self {
        Self::with_valuation(clock_minutes, players, Valuation::new())
    }

    /// Fresh game with a deterministic valuation seed (tests, replays).
    pub fn with_seed(clock_minutes: u64, players: BySide<Player>, seed: u64) -> Self {
        Self::with_valuation(clock_minutes, players, Valuation::seeded(seed))
    }

    fn with_valuation(clock_minutes: u64, players: BySide<Player>, mut valuation: Valuation) -> Self {
        let oracle = MoveOracle::new();
        let identities = IdentityMap::from_oracle(&oracle);
        let board = project_board(&oracle, &identities, &mut valuation);
        let position = oracle.to_position_string();
        let remaining = clock_minutes as f64 * 60.0;

        Self {
            oracle,
            board,
            turn: Side::White,
            check: BySide::default(),
            position,
            clocks: BySide {
                white: Clock::new(remaining),
                black: Clock::new(remaining),
            },
            captured: BySide::default(),
            completion: CompletionFlags::EMPTY,
            moves: Vec::new(),
            redo_stack: Vec::new(),
            identities,
            trace: Vec::new(),
            players,
            paused: false,
            valuation,
            rejection: None,
        }
    }

    /// Read access to the move oracle, for legal-move queries.
    pub fn oracle(&self) -> &MoveOracle {
        &self.oracle
    }

    /// The synchronized subset of this state.
    pub fn common_state(&self) -> CommonState {
        CommonState {
            clocks: self.clocks,
            moves: self.moves.clone(),
            captured: self.captured.clone(),
            board: self.board.clone(),
            turn: self.turn,
            check: self.check,
            position: self.position.clone(),
            completion: self.completion,
        }
    }

    /// Number of distinct piece identities still on the board.
    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }
}

/// Rebuild the board projection from the oracle position, the identity map
/// and the current valuation epoch.
pub(crate) fn project_board(
    oracle: &MoveOracle,
    identities: &IdentityMap,
    valuation: &mut Valuation,
) -> BoardGrid {
    let mut grid: BoardGrid = std::array::from_fn(|_| std::array::from_fn(|_| None));
    for square in Square::all() {
        if let Some((kind, side)) = oracle.piece_at(square) {
            let id = identities.get(square).unwrap_or_else(|| {
                tracing::error!(%square, "occupied square has no identity");
                PieceId(square.enumeration_index())
            });
            let value = valuation.value_of(id, side, kind);
            let row = 7 - square.rank() as usize;
            let col = square.file() as usize;
            grid[row][col] = Some(BoardPiece {
                kind,
                side,
                id,
                value,
            });
        }
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players() -> BySide<Player> {
        BySide {
            white: Player {
                name: "WHITE".into(),
                kind: PlayerKind::Local,
            },
            black: Player {
                name: "BLACK".into(),
                kind: PlayerKind::Local,
            },
        }
    }

    #[test]
    fn fresh_state_has_full_board_and_stopped_clocks() {
        let state = ChessState::with_seed(10, players(), 1);
        assert_eq!(state.identity_count(), 32);
        assert_eq!(state.clocks.white.remaining, 600.0);
        assert_eq!(state.clocks.white.started_at, None);
        assert_eq!(state.clocks.black.started_at, None);
        assert!(state.completion.is_empty());
        assert_eq!(state.turn, Side::White);

        let pieces: usize = state
            .board
            .iter()
            .flatten()
            .filter(|p| p.is_some())
            .count();
        assert_eq!(pieces, 32);
    }

    #[test]
    fn completion_flags_are_a_set() {
        let mut flags = CompletionFlags::EMPTY;
        assert!(flags.is_empty());
        flags.insert(CompletionReason::Checkmate);
        flags.insert(CompletionReason::OutOfTime);
        assert!(flags.contains(CompletionReason::Checkmate));
        assert!(flags.contains(CompletionReason::OutOfTime));
        assert!(!flags.contains(CompletionReason::Draw));

        let reasons: Vec<CompletionReason> = flags.iter().collect();
        assert_eq!(
            reasons,
            vec![CompletionReason::Checkmate, CompletionReason::OutOfTime]
        );
    }

    #[test]
    fn completion_flags_serialize_as_reason_list() {
        let mut flags = CompletionFlags::EMPTY;
        flags.insert(CompletionReason::OutOfTime);
        flags.insert(CompletionReason::Checkmate);
        let json = serde_json::to_string(&flags).unwrap();
        assert_eq!(json, r#"["checkmate","out-of-time"]"#);
        let back: CompletionFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flags);
    }

    #[test]
    fn common_state_round_trips_through_json() {
        let state = ChessState::with_seed(5, players(), 3);
        let common = state.common_state();
        let json = serde_json::to_string(&common).unwrap();
        let back: CommonState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, common);
    }

    #[test]
    fn by_side_indexes_by_side() {
        let mut pair = BySide {
            white: 1,
            black: 2,
        };
        assert_eq!(pair[Side::White], 1);
        pair[Side::Black] = 5;
        assert_eq!(pair.black, 5);
    }
}
