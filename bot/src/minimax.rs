//! Alpha-beta minimax over material balance.

use chess::{MoveOracle, MoveRequest, PieceKind, Side, Square};

const SEARCH_DEPTH: u32 = 3;
const MATE_SCORE: i32 = 1_000_000;

fn piece_score(kind: PieceKind) -> i32 {
    match kind {
        PieceKind::Pawn => 10,
        PieceKind::Knight => 30,
        PieceKind::Bishop => 30,
        PieceKind::Rook => 50,
        PieceKind::Queen => 90,
        PieceKind::King => 900,
    }
}

/// Material balance from `side`'s point of view.
fn evaluate(oracle: &MoveOracle, side: Side) -> i32 {
    let mut score = 0;
    for square in Square::all() {
        if let Some((kind, owner)) = oracle.piece_at(square) {
            if owner == side {
                score += piece_score(kind);
            } else {
                score -= piece_score(kind);
            }
        }
    }
    score
}

fn minimax(
    oracle: &MoveOracle,
    side: Side,
    depth: u32,
    mut alpha: i32,
    mut beta: i32,
    maximizing: bool,
) -> i32 {
    let moves = oracle.legal_moves();
    if moves.is_empty() {
        if oracle.is_checkmate() {
            // The side to move is mated; good for us iff it was their turn.
            return if maximizing { -MATE_SCORE } else { MATE_SCORE };
        }
        return 0;
    }
    if depth == 0 {
        return evaluate(oracle, side);
    }

    if maximizing {
        let mut best = i32::MIN;
        for request in moves {
            let mut next = oracle.clone();
            if next.apply_move(request).is_none() {
                continue;
            }
            best = best.max(minimax(&next, side, depth - 1, alpha, beta, false));
            alpha = alpha.max(best);
            if beta <= alpha {
                break;
            }
        }
        best
    } else {
        let mut best = i32::MAX;
        for request in moves {
            let mut next = oracle.clone();
            if next.apply_move(request).is_none() {
                continue;
            }
            best = best.min(minimax(&next, side, depth - 1, alpha, beta, true));
            beta = beta.min(best);
            if beta <= alpha {
                break;
            }
        }
        best
    }
}

/// Best move for the side to move, or `None` if the position is terminal.
pub fn select_move(oracle: &MoveOracle) -> Option<MoveRequest> {
    let side = oracle.current_turn();
    let mut best: Option<(i32, MoveRequest)> = None;
    for request in oracle.legal_moves() {
        let mut next = oracle.clone();
        if next.apply_move(request).is_none() {
            continue;
        }
        let score = minimax(&next, side, SEARCH_DEPTH - 1, i32::MIN, i32::MAX, false);
        if best.map(|(s, _)| score > s).unwrap_or(true) {
            best = Some((score, request));
        }
    }
    best.map(|(_, request)| request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_a_legal_opening_move() {
        let oracle = MoveOracle::new();
        let request = select_move(&oracle).expect("opening position has moves");
        assert!(oracle.legal_moves().contains(&request));
    }

    #[test]
    fn captures_a_hanging_queen() {
        // Black queen on d4 is free for the rook on d1.
        let oracle = MoveOracle::from_fen("4k3/8/8/8/3q4/8/8/3RK3 w - - 0 1").unwrap();
        let request = select_move(&oracle).unwrap();
        assert_eq!(request.from, "d1".parse().unwrap());
        assert_eq!(request.to, "d4".parse().unwrap());
    }

    #[test]
    fn terminal_position_yields_no_move() {
        // Scholar's mate final position, black to move.
        let oracle = MoveOracle::from_fen(
            "r1bqkb1r/pppp1Qpp/2n2n2/4p3/2B1P3/8/PPPP1PPP/RNB1K1NR b KQkq - 0 4",
        )
        .unwrap();
        assert!(oracle.is_checkmate());
        assert!(select_move(&oracle).is_none());
    }
}
