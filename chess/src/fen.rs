use cozy_chess::Board;

/// Parse a position string (FEN) into a Board.
pub fn parse_fen(fen: &str) -> Result<Board, FenError> {
    fen.parse().map_err(|_| FenError::InvalidFormat)
}

/// Format a Board as a FEN string.
pub fn format_fen(board: &Board) -> String {
    board.to_string()
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FenError {
    #[error("Invalid FEN format")]
    InvalidFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_position_round_trips() {
        let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let board = parse_fen(fen).unwrap();
        assert_eq!(format_fen(&board), fen);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_fen("").is_err());
        assert!(parse_fen("not a position").is_err());
    }
}
