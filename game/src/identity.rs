//! Stable identities for physical pieces.
//!
//! The oracle addresses pieces by square; the UI wants to address the piece
//! itself (for animation and selection), so every piece gets a surrogate id
//! at game start and the map from square to id is maintained across moves,
//! captures, castling and undo.

use std::collections::HashMap;

use chess::{MoveOracle, MoveRecord, Square};
use serde::{Deserialize, Serialize};

/// Surrogate key for one physical piece, stable for the whole game.
/// Assigned from the square's enumeration index at game start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PieceId(pub u8);

impl std::fmt::Display for PieceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Square -> identity mapping. Invariant: one identity per occupied square,
/// all identities distinct, consistent with the oracle board after every
/// reducer transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityMap {
    map: HashMap<Square, PieceId>,
}

/// One entry per applied move: the identity removed by a capture, so undo
/// can restore it exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TraceEntry {
    pub taken: Option<PieceId>,
}

impl IdentityMap {
    /// Assign identities by enumerating the oracle board in board order
    /// (rank 8 to rank 1, file a to h).
    pub fn from_oracle(oracle: &MoveOracle) -> Self {
        let mut map = HashMap::new();
        for square in Square::all() {
            if oracle.piece_at(square).is_some() {
                map.insert(square, PieceId(square.enumeration_index()));
            }
        }
        Self { map }
    }

    pub fn get(&self, square: Square) -> Option<PieceId> {
        self.map.get(&square).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Move the identity on `from` to `to`, returning the identity that was
    /// previously on `to` (the captured piece), if any.
    fn transfer(&mut self, from: Square, to: Square) -> Option<PieceId> {
        match self.map.remove(&from) {
            Some(id) => self.map.insert(to, id),
            None => {
                tracing::error!(%from, %to, "no identity on source square");
                self.map.remove(&to)
            }
        }
    }

    fn remove(&mut self, square: Square) -> Option<PieceId> {
        self.map.remove(&square)
    }

    fn restore(&mut self, square: Square, id: PieceId) {
        self.map.insert(square, id);
    }
}

/// Square holding the pawn captured en passant: same file as the
/// destination, same rank as the capturing pawn's origin.
fn en_passant_victim(record: &MoveRecord) -> Square {
    Square::new(record.to.file(), record.from.rank())
}

/// Update identities for an applied move. Castling relocates both the king
/// and the rook in one step; captures record the replaced identity for undo.
pub(crate) fn apply_move_identities(map: &mut IdentityMap, record: &MoveRecord) -> TraceEntry {
    let mut taken = None;
    let rank = record.from.rank();

    if record.flags.castle_kingside {
        map.transfer(record.from, record.to);
        map.transfer(Square::new(7, rank), Square::new(5, rank));
    } else if record.flags.castle_queenside {
        map.transfer(record.from, record.to);
        map.transfer(Square::new(0, rank), Square::new(3, rank));
    } else if record.flags.en_passant {
        taken = map.remove(en_passant_victim(record));
        map.transfer(record.from, record.to);
    } else if record.flags.capture {
        taken = map.transfer(record.from, record.to);
    } else {
        map.transfer(record.from, record.to);
    }

    TraceEntry { taken }
}

/// Exact inverse of [`apply_move_identities`]. A missing trace entry means
/// the tracker lost a captured identity; the orphaned mapping is dropped
/// rather than invented.
pub(crate) fn undo_move_identities(
    map: &mut IdentityMap,
    record: &MoveRecord,
    entry: Option<TraceEntry>,
) {
    let taken = entry.and_then(|e| e.taken);
    let rank = record.from.rank();

    if record.flags.castle_kingside {
        map.transfer(record.to, record.from);
        map.transfer(Square::new(5, rank), Square::new(7, rank));
    } else if record.flags.castle_queenside {
        map.transfer(record.to, record.from);
        map.transfer(Square::new(3, rank), Square::new(0, rank));
    } else if record.flags.en_passant {
        map.transfer(record.to, record.from);
        match taken {
            Some(id) => map.restore(en_passant_victim(record), id),
            None => tracing::error!("identity trace lost an en passant capture"),
        }
    } else if record.flags.capture {
        map.transfer(record.to, record.from);
        match taken {
            Some(id) => map.restore(record.to, id),
            None => tracing::error!("identity trace lost a capture"),
        }
    } else {
        map.transfer(record.to, record.from);
    }
}
