pub mod fen;
pub mod oracle;
pub mod types;

pub use fen::FenError;
pub use oracle::{MoveFlags, MoveOracle, MoveRecord, MoveRequest, PotentialMove};
pub use types::{PieceKind, Side, Square, SquareParseError};
