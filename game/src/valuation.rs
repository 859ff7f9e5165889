//! Simulated market values for pieces.
//!
//! Every side's six piece kinds get an independently jittered base value at
//! game start, and individual pieces re-draw their value once per epoch
//! (one epoch per half-move). The reducer consults these values when gating
//! captures: a piece may not capture anything worth more than itself.

use std::collections::HashMap;

use chess::{PieceKind, Side};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::identity::PieceId;
use crate::state::BySide;

/// Stand-in for an infinite king value that still serializes as JSON.
pub const KING_VALUE: f64 = 1.0e9;

const JITTER_LOW: f64 = 0.85;
const JITTER_HIGH: f64 = 1.15;

/// Classic material values the jitter is centered on.
fn table_value(kind: PieceKind) -> f64 {
    match kind {
        PieceKind::Pawn => 1.0,
        PieceKind::Knight => 3.0,
        PieceKind::Bishop => 3.0,
        PieceKind::Rook => 5.0,
        PieceKind::Queen => 9.0,
        PieceKind::King => KING_VALUE,
    }
}

fn kind_index(kind: PieceKind) -> usize {
    match kind {
        PieceKind::Pawn => 0,
        PieceKind::Knight => 1,
        PieceKind::Bishop => 2,
        PieceKind::Rook => 3,
        PieceKind::Queen => 4,
        PieceKind::King => 5,
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedValue {
    epoch: u64,
    value: f64,
}

/// Per-game value state. Lives inside `ChessState` so concurrent games never
/// share a refresh toggle.
#[derive(Debug, Clone)]
pub struct Valuation {
    base: BySide<[f64; 6]>,
    cache: HashMap<PieceId, CachedValue>,
    epoch: u64,
    rng: StdRng,
}

impl Valuation {
    pub fn new() -> Self {
        Self::seeded(rand::random())
    }

    /// Deterministic valuation for tests.
    pub fn seeded(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let base = BySide {
            white: jittered_table(&mut rng),
            black: jittered_table(&mut rng),
        };
        Self {
            base,
            cache: HashMap::new(),
            epoch: 0,
            rng,
        }
    }

    /// Advance the refresh epoch. Called once per completed half-move;
    /// values stay stable within an epoch and drift between them.
    pub fn advance_epoch(&mut self) {
        self.epoch += 1;
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Current value of one piece instance. Cached per identity for the
    /// duration of the epoch; redrawn around the side's base on first use in
    /// a new epoch. Kings are priceless.
    pub fn value_of(&mut self, id: PieceId, side: Side, kind: PieceKind) -> f64 {
        if kind == PieceKind::King {
            return KING_VALUE;
        }
        if let Some(cached) = self.cache.get(&id) {
            if cached.epoch == self.epoch {
                return cached.value;
            }
        }
        let base = self.base[side][kind_index(kind)];
        let value = base * self.rng.gen_range(JITTER_LOW..=JITTER_HIGH);
        self.cache.insert(
            id,
            CachedValue {
                epoch: self.epoch,
                value,
            },
        );
        value
    }

    /// Force a piece's value for the current epoch (test hook).
    #[cfg(test)]
    pub(crate) fn pin_value(&mut self, id: PieceId, value: f64) {
        self.cache.insert(
            id,
            CachedValue {
                epoch: self.epoch,
                value,
            },
        );
    }
}

impl Default for Valuation {
    fn default() -> Self {
        Self::new()
    }
}

fn jittered_table(rng: &mut StdRng) -> [f64; 6] {
    let mut table = [0.0; 6];
    for kind in [
        PieceKind::Pawn,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
        PieceKind::King,
    ] {
        table[kind_index(kind)] = if kind == PieceKind::King {
            KING_VALUE
        } else {
            table_value(kind) * rng.gen_range(JITTER_LOW..=JITTER_HIGH)
        };
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_stable_within_an_epoch() {
        let mut valuation = Valuation::seeded(7);
        let id = PieceId(10);
        let first = valuation.value_of(id, Side::White, PieceKind::Queen);
        let second = valuation.value_of(id, Side::White, PieceKind::Queen);
        assert_eq!(first, second);
    }

    #[test]
    fn values_stay_within_jitter_bounds() {
        let mut valuation = Valuation::seeded(42);
        for ply in 0..20 {
            let value = valuation.value_of(PieceId(ply), Side::Black, PieceKind::Rook);
            assert!(value >= 5.0 * JITTER_LOW * JITTER_LOW);
            assert!(value <= 5.0 * JITTER_HIGH * JITTER_HIGH);
            valuation.advance_epoch();
        }
    }

    #[test]
    fn kings_are_priceless_and_uncached() {
        let mut valuation = Valuation::seeded(1);
        assert_eq!(
            valuation.value_of(PieceId(4), Side::White, PieceKind::King),
            KING_VALUE
        );
        valuation.advance_epoch();
        assert_eq!(
            valuation.value_of(PieceId(4), Side::White, PieceKind::King),
            KING_VALUE
        );
    }

    #[test]
    fn seeded_valuations_are_reproducible() {
        let mut a = Valuation::seeded(99);
        let mut b = Valuation::seeded(99);
        for i in 0..10 {
            assert_eq!(
                a.value_of(PieceId(i), Side::White, PieceKind::Knight),
                b.value_of(PieceId(i), Side::White, PieceKind::Knight)
            );
        }
    }
}
