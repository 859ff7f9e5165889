//! The state-transition core. Every mutation of a [`ChessState`] goes
//! through [`reduce`]; the session layer and the reconciler both drive the
//! game exclusively with [`Action`]s.

use chess::{MoveRequest, PieceKind, Square};

use crate::identity::{apply_move_identities, undo_move_identities};
use crate::state::{
    project_board, BySide, ChessState, CompletionFlags, CompletionReason, Rejection,
};

/// A reducer action. Timestamps are unix milliseconds supplied by the
/// caller, so transitions replay deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Move {
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
        time: u64,
    },
    Undo {
        time: u64,
    },
    Redo {
        time: u64,
    },
    Pause {
        time: Option<u64>,
    },
    CheckTimers {
        time: u64,
    },
}

/// Apply one action to the state. Refused actions leave the state unchanged
/// apart from `state.rejection`, which reports why; the previous rejection
/// is cleared on every dispatch.
pub fn reduce(state: &mut ChessState, action: Action) {
    state.rejection = None;
    match action {
        Action::Move {
            from,
            to,
            promotion,
            time,
        } => apply_move(state, from, to, promotion, time),
        Action::Undo { time } => apply_undo(state, time),
        Action::Redo { time } => apply_redo(state, time),
        Action::Pause { .. } => {
            tracing::warn!("pause requested but not supported");
            state.rejection = Some(Rejection::Unsupported);
        }
        Action::CheckTimers { time } => check_timers(state, time),
    }
}

fn apply_move(
    state: &mut ChessState,
    from: Square,
    to: Square,
    promotion: Option<PieceKind>,
    time: u64,
) {
    check_timers(state, time);
    if !state.completion.is_empty() {
        return;
    }
    state.redo_stack.clear();

    if let Err(rejection) = value_gate(state, from, to) {
        tracing::debug!(%from, %to, %rejection, "move refused by value gate");
        state.rejection = Some(rejection);
        return;
    }

    let request = MoveRequest {
        from,
        to,
        promotion,
    };
    let Some(record) = state.oracle.apply_move(request) else {
        state.rejection = Some(Rejection::Illegal);
        return;
    };

    let entry = apply_move_identities(&mut state.identities, &record);
    state.trace.push(entry);
    if let Some(kind) = record.captured {
        state.captured[record.side].push(kind);
    }
    state.moves.push(record);
    end_move(state, time);
}

/// The capture-legality rule layered on top of ordinary chess legality: a
/// piece may not capture one whose current simulated value is strictly
/// greater than its own. Evaluated before the oracle is touched, so a
/// refused capture never disturbs the position.
fn value_gate(state: &mut ChessState, from: Square, to: Square) -> Result<(), Rejection> {
    let Some(potential) = state
        .oracle
        .moves_from(from)
        .into_iter()
        .find(|p| p.to == to)
    else {
        // Not a legal destination; the oracle reports that itself.
        return Ok(());
    };
    if !potential.flags.capture {
        return Ok(());
    }
    let defender_square = if potential.flags.en_passant {
        Square::new(to.file(), from.rank())
    } else {
        to
    };
    let (Some((attacker_kind, attacker_side)), Some((defender_kind, defender_side))) =
        (state.oracle.piece_at(from), state.oracle.piece_at(defender_square))
    else {
        return Ok(());
    };
    let (Some(attacker_id), Some(defender_id)) = (
        state.identities.get(from),
        state.identities.get(defender_square),
    ) else {
        return Ok(());
    };

    let attacker = state
        .valuation
        .value_of(attacker_id, attacker_side, attacker_kind);
    let defender = state
        .valuation
        .value_of(defender_id, defender_side, defender_kind);
    if defender > attacker {
        return Err(Rejection::ValueViolation { attacker, defender });
    }
    Ok(())
}

fn apply_undo(state: &mut ChessState, time: u64) {
    check_timers(state, time);
    if !state.completion.is_empty() {
        return;
    }
    let Some(record) = state.oracle.undo_last_move() else {
        return;
    };
    state.moves.pop();
    let entry = state.trace.pop();
    undo_move_identities(&mut state.identities, &record, entry);
    if let Some(kind) = record.captured {
        let list = &mut state.captured[record.side];
        if let Some(index) = list.iter().rposition(|k| *k == kind) {
            list.remove(index);
        }
    }
    state.redo_stack.push(record);
    end_move(state, time);
}

fn apply_redo(state: &mut ChessState, time: u64) {
    check_timers(state, time);
    if !state.completion.is_empty() {
        return;
    }
    let Some(record) = state.redo_stack.pop() else {
        return;
    };
    // `apply_move` clears the redo stack; stash the remainder and put it back
    // afterwards so repeated redos stay possible.
    let saved = std::mem::take(&mut state.redo_stack);
    let before = state.moves.len();
    apply_move(state, record.from, record.to, record.promotion, time);
    state.redo_stack = saved;
    if state.moves.len() == before {
        // Replay was refused; keep the record so the state is unchanged.
        state.redo_stack.push(record);
    }
}

/// If the running side's clock has run out, flag the game out-of-time
/// (together with whatever terminal predicate the oracle reports) and stop
/// both clocks. Otherwise a no-op, as are all later calls once the clocks
/// are frozen.
fn check_timers(state: &mut ChessState, time: u64) {
    let expired = [chess::Side::White, chess::Side::Black]
        .into_iter()
        .any(|side| {
            let clock = state.clocks[side];
            match clock.started_at {
                Some(started) => {
                    let elapsed = time.saturating_sub(started) as f64 / 1000.0;
                    elapsed >= clock.remaining
                }
                None => false,
            }
        });
    if !expired {
        return;
    }

    for side in [chess::Side::White, chess::Side::Black] {
        let clock = &mut state.clocks[side];
        if clock.started_at.take().is_some() {
            clock.remaining = 0.0;
        }
    }
    state.completion = state
        .completion
        .union(terminal_flags(&state.oracle));
    state.completion.insert(CompletionReason::OutOfTime);
}

/// Shared tail of `move`, `undo` and `redo`: swap the running clock,
/// recompute turn, check and completion from the oracle, advance the
/// valuation epoch and rebuild the board projection.
fn end_move(state: &mut ChessState, time: u64) {
    state.turn = state.oracle.current_turn();
    let mover = state.turn.opponent();

    if let Some(started) = state.clocks[mover].started_at.take() {
        let elapsed = time.saturating_sub(started) as f64 / 1000.0;
        let clock = &mut state.clocks[mover];
        clock.remaining = (clock.remaining - elapsed).max(0.0);
    }

    state.valuation.advance_epoch();

    state.check = BySide::default();
    state.check[state.turn] = state.oracle.is_in_check();
    state.completion = state.completion.union(terminal_flags(&state.oracle));

    if state.completion.is_empty() {
        state.clocks[state.turn].started_at = Some(time);
    }

    state.position = state.oracle.to_position_string();
    state.board = project_board(&state.oracle, &state.identities, &mut state.valuation);
}

fn terminal_flags(oracle: &chess::MoveOracle) -> CompletionFlags {
    let mut flags = CompletionFlags::EMPTY;
    if oracle.is_checkmate() {
        flags.insert(CompletionReason::Checkmate);
    }
    if oracle.is_draw() {
        flags.insert(CompletionReason::Draw);
    }
    if oracle.is_threefold_repetition() {
        flags.insert(CompletionReason::ThreefoldRepetition);
    }
    if oracle.is_insufficient_material() {
        flags.insert(CompletionReason::InsufficientMaterial);
    }
    flags
}
