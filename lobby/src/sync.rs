//! Reconciliation of a local game against the remote lobby record.
//!
//! The remote snapshot is authoritative for the roster and the clocks; the
//! local oracle is authoritative for legality. Any disagreement about the
//! move history itself is treated as tampering and reported instead of
//! applied, so a corrupted or hostile remote can never advance local state.

use game::{reduce, Action, ChessState, CommonState, Player, PlayerKind};
use thiserror::Error;

use crate::store::{LobbyPlayer, LobbySnapshot};

/// A detected divergence between local and remote state. The consumer must
/// stop trusting further snapshots until the conflict is acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncConflict {
    #[error("remote history has {remote} moves but local has {local}")]
    MoveCount { local: usize, remote: usize },

    #[error("move history diverged: local played {local}, remote claims {remote}")]
    HistoryTampered { local: String, remote: String },

    #[error(
        "remote move {san} could not be replayed locally (history tampering, \
         or the two clients drew diverging piece values)"
    )]
    InvalidMove { san: String },

    #[error("captured piece lists diverged after replaying {san}")]
    CapturedMismatch { san: String },

    #[error("check flags diverged after replaying {san}")]
    CheckMismatch { san: String },

    #[error("completion flags diverged after replaying {san}")]
    CompletionMismatch { san: String },
}

/// Fold a remote snapshot into a copy of the local state. Returns the
/// updated state, or a conflict report with the caller's state untouched.
///
/// Stale and repeated snapshots are safe no-ops: if the remote turn matches
/// the local one, or the histories are already equal, the roster-refreshed
/// local state comes straight back.
pub fn reconcile(
    local: &ChessState,
    snapshot: &LobbySnapshot,
    local_uid: &str,
    now: u64,
) -> Result<ChessState, SyncConflict> {
    let mut state = local.clone();
    refresh_roster(&mut state, snapshot, local_uid);
    let remote = &snapshot.game;

    if state.moves.is_empty() {
        state.clocks = remote.clocks;
        // Joining mid-setup: catch up on everything that already happened.
        if remote.moves.len() > 1 {
            for record in &remote.moves {
                apply_remote_move(&mut state, record, now)?;
            }
            state.clocks = remote.clocks;
            return Ok(state);
        }
    }

    if state.turn == remote.turn {
        return Ok(state);
    }

    let local_count = state.moves.len();
    let remote_count = remote.moves.len();
    if remote_count != local_count && remote_count != local_count + 1 {
        return Err(SyncConflict::MoveCount {
            local: local_count,
            remote: remote_count,
        });
    }

    for (ours, theirs) in state.moves.iter().zip(remote.moves.iter()) {
        if ours.san != theirs.san {
            return Err(SyncConflict::HistoryTampered {
                local: ours.san.clone(),
                remote: theirs.san.clone(),
            });
        }
    }

    if remote_count == local_count {
        return Ok(state);
    }

    let incoming = &remote.moves[local_count];
    apply_remote_move(&mut state, incoming, now)?;
    verify_replay(&state, remote, &incoming.san)?;

    // Remote is authoritative for wall-clock accounting; it reflects the
    // other participant's send time.
    state.clocks = remote.clocks;
    Ok(state)
}

fn refresh_roster(state: &mut ChessState, snapshot: &LobbySnapshot, local_uid: &str) {
    state.players.white = seat_player(snapshot.players.white.as_ref(), local_uid);
    state.players.black = seat_player(snapshot.players.black.as_ref(), local_uid);
}

fn seat_player(seat: Option<&LobbyPlayer>, local_uid: &str) -> Player {
    match seat {
        Some(p) => Player {
            name: p.name.clone(),
            kind: if p.uid == local_uid {
                PlayerKind::Local
            } else {
                PlayerKind::Online
            },
        },
        None => Player {
            name: "connecting".to_string(),
            kind: PlayerKind::Online,
        },
    }
}

fn apply_remote_move(
    state: &mut ChessState,
    record: &chess::MoveRecord,
    now: u64,
) -> Result<(), SyncConflict> {
    let before = state.moves.len();
    reduce(
        state,
        Action::Move {
            from: record.from,
            to: record.to,
            promotion: record.promotion,
            time: now,
        },
    );
    if state.moves.len() != before + 1 {
        tracing::warn!(san = %record.san, rejection = ?state.rejection, "remote move refused");
        return Err(SyncConflict::InvalidMove {
            san: record.san.clone(),
        });
    }
    Ok(())
}

/// Independent cross-check after replaying the trailing remote move.
fn verify_replay(
    state: &ChessState,
    remote: &CommonState,
    san: &str,
) -> Result<(), SyncConflict> {
    if state.moves.len() != remote.moves.len() {
        return Err(SyncConflict::MoveCount {
            local: state.moves.len(),
            remote: remote.moves.len(),
        });
    }
    if state.captured != remote.captured {
        return Err(SyncConflict::CapturedMismatch {
            san: san.to_string(),
        });
    }
    if state.check != remote.check {
        return Err(SyncConflict::CheckMismatch {
            san: san.to_string(),
        });
    }
    if state.completion != remote.completion {
        return Err(SyncConflict::CompletionMismatch {
            san: san.to_string(),
        });
    }
    Ok(())
}
