pub mod identity;
pub mod reducer;
pub mod session;
pub mod state;
pub mod valuation;

pub use identity::PieceId;
pub use reducer::{reduce, Action};
pub use session::{GameConfig, GameSession};
pub use state::{
    BoardGrid, BoardPiece, BySide, ChessState, Clock, CommonState, CompletionFlags,
    CompletionReason, Player, PlayerKind, Rejection,
};
pub use valuation::{Valuation, KING_VALUE};
