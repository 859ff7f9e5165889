//! Move oracle wrapping cozy-chess.
//!
//! The rest of the project speaks standard notation (castling written as a
//! two-square king move, e.g. e1g1); cozy-chess encodes castling as
//! king-takes-rook. All conversion between the two happens here.

use cozy_chess::{Board, Piece};
use serde::{Deserialize, Serialize};

use crate::fen::{format_fen, parse_fen, FenError};
use crate::types::{PieceKind, Side, Square};

/// A move as requested by a caller, in standard notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

/// What a move does, beyond relocating a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MoveFlags {
    pub capture: bool,
    pub en_passant: bool,
    pub castle_kingside: bool,
    pub castle_queenside: bool,
    pub promotion: bool,
}

/// A legal destination for one piece, as reported by [`MoveOracle::moves_from`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PotentialMove {
    pub to: Square,
    pub flags: MoveFlags,
}

/// Record of an applied move, in standard notation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub from: Square,
    pub to: Square,
    pub piece: PieceKind,
    pub side: Side,
    pub captured: Option<PieceKind>,
    pub promotion: Option<PieceKind>,
    pub flags: MoveFlags,
    pub san: String,
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    mv: cozy_chess::Move,
    record: MoveRecord,
}

/// Legal-move oracle for one game. Owns the current position plus the move
/// history needed for undo and threefold-repetition detection.
#[derive(Debug, Clone)]
pub struct MoveOracle {
    board: Board,
    start: Board,
    history: Vec<HistoryEntry>,
    /// Position hash after every ply; index 0 is the start position.
    hashes: Vec<u64>,
}

impl MoveOracle {
    /// Oracle for the standard starting position.
    pub fn new() -> Self {
        Self::from_board(Board::default())
    }

    /// Oracle for an arbitrary position string.
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        Ok(Self::from_board(parse_fen(fen)?))
    }

    fn from_board(board: Board) -> Self {
        let hash = board.hash();
        Self {
            start: board.clone(),
            board,
            history: Vec::new(),
            hashes: vec![hash],
        }
    }

    /// Side to move.
    pub fn current_turn(&self) -> Side {
        self.board.side_to_move().into()
    }

    /// Piece occupying a square, if any.
    pub fn piece_at(&self, square: Square) -> Option<(PieceKind, Side)> {
        let sq: cozy_chess::Square = square.into();
        let piece = self.board.piece_on(sq)?;
        let color = self.board.color_on(sq)?;
        Some((piece.into(), color.into()))
    }

    /// Legal destinations for the piece on `square` (empty if none).
    /// Promotion moves are collapsed to a single entry per destination.
    pub fn moves_from(&self, square: Square) -> Vec<PotentialMove> {
        let from: cozy_chess::Square = square.into();
        let mut result: Vec<PotentialMove> = Vec::new();
        for mv in self.legal_cozy_moves() {
            if mv.from != from {
                continue;
            }
            let (to, flags, _) = self.classify(mv);
            if result.iter().any(|p| p.to == to) {
                continue;
            }
            result.push(PotentialMove { to, flags });
        }
        result
    }

    /// All legal moves in the current position, in standard notation.
    /// Promotions appear once per promotion piece.
    pub fn legal_moves(&self) -> Vec<MoveRequest> {
        self.legal_cozy_moves()
            .into_iter()
            .map(|mv| {
                let (to, _, _) = self.classify(mv);
                MoveRequest {
                    from: mv.from.into(),
                    to,
                    promotion: mv.promotion.map(Into::into),
                }
            })
            .collect()
    }

    /// Apply a move. Returns `None` (position unchanged) if the move is not
    /// legal in the current position.
    pub fn apply_move(&mut self, request: MoveRequest) -> Option<MoveRecord> {
        let mv = self.resolve_request(request)?;
        let (to, flags, captured) = self.classify(mv);
        let piece: PieceKind = self.board.piece_on(mv.from)?.into();
        let side: Side = self.board.side_to_move().into();
        let san = generate_san(piece, mv.from.into(), to, flags, mv.promotion.map(Into::into));

        let mut next = self.board.clone();
        if next.try_play(mv).is_err() {
            return None;
        }
        self.board = next;
        self.hashes.push(self.board.hash());

        let record = MoveRecord {
            from: mv.from.into(),
            to,
            piece,
            side,
            captured,
            promotion: mv.promotion.map(Into::into),
            flags,
            san,
        };
        self.history.push(HistoryEntry {
            mv,
            record: record.clone(),
        });
        Some(record)
    }

    /// Undo the last applied move. Returns `None` if there is nothing to undo.
    pub fn undo_last_move(&mut self) -> Option<MoveRecord> {
        let entry = self.history.pop()?;
        self.hashes.pop();
        self.rebuild();
        Some(entry.record)
    }

    /// True if the side to move is in check.
    pub fn is_in_check(&self) -> bool {
        !self.board.checkers().is_empty()
    }

    pub fn is_checkmate(&self) -> bool {
        !self.has_legal_move() && self.is_in_check()
    }

    /// Draw per the usual client rules: stalemate, fifty-move rule,
    /// insufficient material or threefold repetition.
    pub fn is_draw(&self) -> bool {
        self.is_stalemate()
            || self.board.halfmove_clock() >= 100
            || self.is_insufficient_material()
            || self.is_threefold_repetition()
    }

    pub fn is_insufficient_material(&self) -> bool {
        let kings = self.board.pieces(Piece::King);
        if (self.board.occupied() & !kings).is_empty() {
            return true;
        }
        let majors = self.board.pieces(Piece::Pawn)
            | self.board.pieces(Piece::Rook)
            | self.board.pieces(Piece::Queen);
        if !majors.is_empty() {
            return false;
        }
        let knights = self.board.pieces(Piece::Knight);
        let bishops = self.board.pieces(Piece::Bishop);
        if knights.len() + bishops.len() == 1 {
            return true;
        }
        if knights.is_empty() {
            // King and bishops vs king and bishops, all on one square color.
            let mut light = false;
            let mut dark = false;
            for sq in bishops {
                if (sq.file() as usize + sq.rank() as usize) % 2 == 0 {
                    dark = true;
                } else {
                    light = true;
                }
            }
            return !(light && dark);
        }
        false
    }

    pub fn is_threefold_repetition(&self) -> bool {
        let current = self.board.hash();
        self.hashes.iter().filter(|&&h| h == current).count() >= 3
    }

    /// Compact position string (FEN).
    pub fn to_position_string(&self) -> String {
        format_fen(&self.board)
    }

    fn is_stalemate(&self) -> bool {
        !self.has_legal_move() && !self.is_in_check()
    }

    fn has_legal_move(&self) -> bool {
        self.board.generate_moves(|_| true)
    }

    fn legal_cozy_moves(&self) -> Vec<cozy_chess::Move> {
        let mut moves = Vec::new();
        self.board.generate_moves(|mvs| {
            moves.extend(mvs);
            false
        });
        moves
    }

    /// Map a standard-notation request onto a legal cozy-chess move,
    /// translating two-square castling notation to king-takes-rook.
    fn resolve_request(&self, request: MoveRequest) -> Option<cozy_chess::Move> {
        let legal = self.legal_cozy_moves();
        let exact = cozy_chess::Move {
            from: request.from.into(),
            to: request.to.into(),
            promotion: request.promotion.map(Into::into),
        };
        if legal.contains(&exact) {
            return Some(exact);
        }

        let from = request.from;
        let to = request.to;
        let back_rank = from.rank() == 0 || from.rank() == 7;
        if request.promotion.is_none()
            && back_rank
            && from.rank() == to.rank()
            && from.file() == 4
            && (to.file() == 6 || to.file() == 2)
        {
            let rook_file = if to.file() == 6 { 7 } else { 0 };
            let converted = cozy_chess::Move {
                from: request.from.into(),
                to: Square::new(rook_file, from.rank()).into(),
                promotion: None,
            };
            if legal.contains(&converted) {
                return Some(converted);
            }
        }
        None
    }

    /// Derive the standard destination square, flags and captured piece for a
    /// legal cozy-chess move in the current position.
    fn classify(&self, mv: cozy_chess::Move) -> (Square, MoveFlags, Option<PieceKind>) {
        let mut flags = MoveFlags::default();
        let mut captured = None;
        let mut to: Square = mv.to.into();
        let from: Square = mv.from.into();

        let piece = self.board.piece_on(mv.from);
        let side = self.board.side_to_move();
        let castling = piece == Some(Piece::King)
            && self.board.piece_on(mv.to) == Some(Piece::Rook)
            && self.board.color_on(mv.to) == Some(side);

        if castling {
            if to.file() > from.file() {
                flags.castle_kingside = true;
                to = Square::new(6, from.rank());
            } else {
                flags.castle_queenside = true;
                to = Square::new(2, from.rank());
            }
        } else {
            if let Some(victim) = self.board.piece_on(mv.to) {
                flags.capture = true;
                captured = Some(victim.into());
            } else if piece == Some(Piece::Pawn) && from.file() != to.file() {
                flags.capture = true;
                flags.en_passant = true;
                captured = Some(PieceKind::Pawn);
            }
            flags.promotion = mv.promotion.is_some();
        }

        (to, flags, captured)
    }

    fn rebuild(&mut self) {
        let mut board = self.start.clone();
        for entry in &self.history {
            if board.try_play(entry.mv).is_err() {
                tracing::error!(san = %entry.record.san, "history replay failed during undo");
                break;
            }
        }
        self.board = board;
    }
}

impl Default for MoveOracle {
    fn default() -> Self {
        Self::new()
    }
}

/// Simplified SAN, without check/checkmate suffixes. Both sides of an online
/// game derive notation from this function, so it is canonical for history
/// comparison even where it differs from strict SAN disambiguation.
fn generate_san(
    piece: PieceKind,
    from: Square,
    to: Square,
    flags: MoveFlags,
    promotion: Option<PieceKind>,
) -> String {
    if flags.castle_kingside {
        return "O-O".to_string();
    }
    if flags.castle_queenside {
        return "O-O-O".to_string();
    }

    let mut san = String::new();
    match piece {
        PieceKind::Pawn => {
            if flags.capture {
                san.push((b'a' + from.file()) as char);
            }
        }
        other => san.push(other.to_char_upper()),
    }
    if flags.capture {
        san.push('x');
    }
    san.push_str(&to.to_string());
    if let Some(promo) = promotion {
        san.push('=');
        san.push(promo.to_char_upper());
    }
    san
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(from: &str, to: &str) -> MoveRequest {
        MoveRequest {
            from: from.parse().unwrap(),
            to: to.parse().unwrap(),
            promotion: None,
        }
    }

    fn play(oracle: &mut MoveOracle, moves: &[(&str, &str)]) {
        for (from, to) in moves {
            assert!(
                oracle.apply_move(mv(from, to)).is_some(),
                "move {from}{to} was rejected"
            );
        }
    }

    #[test]
    fn pawn_has_single_and_double_push() {
        let oracle = MoveOracle::new();
        let moves = oracle.moves_from("e2".parse().unwrap());
        let targets: Vec<String> = moves.iter().map(|m| m.to.to_string()).collect();
        assert_eq!(moves.len(), 2);
        assert!(targets.contains(&"e3".to_string()));
        assert!(targets.contains(&"e4".to_string()));
    }

    #[test]
    fn illegal_move_leaves_position_unchanged() {
        let mut oracle = MoveOracle::new();
        let before = oracle.to_position_string();
        assert!(oracle.apply_move(mv("e2", "e5")).is_none());
        assert_eq!(oracle.to_position_string(), before);
    }

    #[test]
    fn capture_is_flagged_and_recorded() {
        let mut oracle = MoveOracle::new();
        play(&mut oracle, &[("e2", "e4"), ("d7", "d5")]);
        let record = oracle.apply_move(mv("e4", "d5")).unwrap();
        assert!(record.flags.capture);
        assert_eq!(record.captured, Some(PieceKind::Pawn));
        assert_eq!(record.san, "exd5");
    }

    #[test]
    fn standard_castling_notation_is_accepted() {
        let mut oracle = MoveOracle::new();
        play(
            &mut oracle,
            &[("e2", "e4"), ("e7", "e5"), ("g1", "f3"), ("b8", "c6"), ("f1", "c4"), ("g8", "f6")],
        );
        let record = oracle.apply_move(mv("e1", "g1")).unwrap();
        assert!(record.flags.castle_kingside);
        assert_eq!(record.san, "O-O");
        assert_eq!(record.to, "g1".parse().unwrap());
        assert_eq!(
            oracle.piece_at("g1".parse().unwrap()),
            Some((PieceKind::King, Side::White))
        );
        assert_eq!(
            oracle.piece_at("f1".parse().unwrap()),
            Some((PieceKind::Rook, Side::White))
        );
    }

    #[test]
    fn moves_from_reports_castling_destination_in_standard_notation() {
        let mut oracle = MoveOracle::new();
        play(
            &mut oracle,
            &[("e2", "e4"), ("e7", "e5"), ("g1", "f3"), ("b8", "c6"), ("f1", "c4"), ("g8", "f6")],
        );
        let moves = oracle.moves_from("e1".parse().unwrap());
        let castle = moves
            .iter()
            .find(|m| m.flags.castle_kingside)
            .expect("castling should be available");
        assert_eq!(castle.to, "g1".parse().unwrap());
    }

    #[test]
    fn en_passant_is_flagged() {
        let mut oracle = MoveOracle::new();
        play(&mut oracle, &[("e2", "e4"), ("a7", "a6"), ("e4", "e5"), ("d7", "d5")]);
        let record = oracle.apply_move(mv("e5", "d6")).unwrap();
        assert!(record.flags.en_passant);
        assert!(record.flags.capture);
        assert_eq!(record.captured, Some(PieceKind::Pawn));
        // The captured pawn is gone from d5.
        assert_eq!(oracle.piece_at("d5".parse().unwrap()), None);
    }

    #[test]
    fn undo_restores_the_previous_position() {
        let mut oracle = MoveOracle::new();
        let start = oracle.to_position_string();
        play(&mut oracle, &[("e2", "e4"), ("e7", "e5")]);
        let after_first = {
            let record = oracle.undo_last_move().unwrap();
            assert_eq!(record.san, "e5");
            oracle.to_position_string()
        };
        assert!(after_first.contains("b KQkq") || after_first.contains(" b "));
        oracle.undo_last_move().unwrap();
        assert_eq!(oracle.to_position_string(), start);
        assert!(oracle.undo_last_move().is_none());
    }

    #[test]
    fn scholars_mate_is_checkmate() {
        let mut oracle = MoveOracle::new();
        play(
            &mut oracle,
            &[
                ("e2", "e4"),
                ("e7", "e5"),
                ("f1", "c4"),
                ("b8", "c6"),
                ("d1", "h5"),
                ("g8", "f6"),
                ("h5", "f7"),
            ],
        );
        assert!(oracle.is_checkmate());
        assert!(oracle.is_in_check());
        assert!(!oracle.has_legal_move());
    }

    #[test]
    fn knight_shuffle_reaches_threefold_repetition() {
        let mut oracle = MoveOracle::new();
        let shuffle = [("g1", "f3"), ("g8", "f6"), ("f3", "g1"), ("f6", "g8")];
        play(&mut oracle, &shuffle);
        assert!(!oracle.is_threefold_repetition());
        play(&mut oracle, &shuffle);
        assert!(oracle.is_threefold_repetition());
        assert!(oracle.is_draw());
    }

    #[test]
    fn bare_kings_are_insufficient_material() {
        let oracle = MoveOracle::from_fen("k7/8/8/8/8/8/8/K7 w - - 0 1").unwrap();
        assert!(oracle.is_insufficient_material());
        let oracle = MoveOracle::from_fen("k7/8/8/8/8/8/8/KN6 w - - 0 1").unwrap();
        assert!(oracle.is_insufficient_material());
        let oracle = MoveOracle::from_fen("k7/8/8/8/8/8/8/KR6 w - - 0 1").unwrap();
        assert!(!oracle.is_insufficient_material());
    }

    #[test]
    fn promotion_moves_are_deduplicated_per_destination() {
        let oracle = MoveOracle::from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let moves = oracle.moves_from("a7".parse().unwrap());
        assert_eq!(moves.len(), 1);
        assert!(moves[0].flags.promotion);
    }

    #[test]
    fn promotion_requires_a_piece_choice() {
        let mut oracle = MoveOracle::from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(oracle.apply_move(mv("a7", "a8")).is_none());
        let record = oracle
            .apply_move(MoveRequest {
                from: "a7".parse().unwrap(),
                to: "a8".parse().unwrap(),
                promotion: Some(PieceKind::Queen),
            })
            .unwrap();
        assert_eq!(record.san, "a8=Q");
        assert_eq!(
            oracle.piece_at("a8".parse().unwrap()),
            Some((PieceKind::Queen, Side::White))
        );
    }

    #[test]
    fn move_record_round_trips_through_json() {
        let mut oracle = MoveOracle::new();
        let record = oracle.apply_move(mv("g1", "f3")).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        let back: MoveRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
