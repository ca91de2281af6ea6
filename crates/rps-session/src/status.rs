use rps_core::{Address, Role};

use crate::phase::Phase;
use crate::session::{PendingStatus, Session};

/// Which controls the UI may enable right now.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnabledActions {
    pub start_game: bool,
    pub join_game: bool,
    pub reveal: bool,
    pub claim_timeout: bool,
    pub attach: bool,
}

/// Evaluate every guard without side effects.
pub fn enabled_actions(session: &Session, local: &Address, now: u64, timeout_secs: u64) -> EnabledActions {
    EnabledActions {
        start_game: session.check_start().is_ok(),
        join_game: session.check_join(local).is_ok(),
        reveal: session.check_reveal(local).is_ok()
            && session.local_move.is_some()
            && session.salt.is_some()
            && session.commitment.is_some(),
        claim_timeout: session.check_timeout(local, now, timeout_secs).is_ok(),
        attach: session.check_attach().is_ok(),
    }
}

/// A short human-readable line describing the session from `local`'s seat.
pub fn status_label(session: &Session, local: &Address) -> String {
    if let Some(pending) = session.pending {
        match pending.status {
            PendingStatus::InFlight => return format!("Sending {}", pending.action),
            PendingStatus::AwaitingConfirmation => {
                return format!("Waiting for {} to confirm", pending.action)
            }
            PendingStatus::Unknown => {
                return format!("Could not reach the ledger; retry {}", pending.action)
            }
        }
    }

    let role = session.role_of(local);
    match (session.phase, role) {
        (Phase::Empty, _) => "No game".to_owned(),
        (Phase::Committed, Some(Role::Challenger)) => "Your turn: play a move".to_owned(),
        (Phase::Committed, _) => "Waiting for player 2".to_owned(),
        (Phase::Challenged, Some(Role::Committer)) => "Your turn: reveal your move".to_owned(),
        (Phase::Challenged, _) => "Waiting for player 1 to reveal".to_owned(),
        (Phase::Settled, _) => "Game ended".to_owned(),
    }
}
