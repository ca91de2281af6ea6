use std::fmt;

use crate::gateway::LedgerSnapshot;

/// Where a game stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// No contract yet.
    #[default]
    Empty,
    /// Deployed with a commitment; waiting for the challenger.
    Committed,
    /// The challenger played; waiting for the reveal.
    Challenged,
    /// Solved or timed out. Terminal.
    Settled,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        self == Phase::Settled
    }

    /// Position along the only path a game can take. Never decreases on the
    /// ledger.
    pub fn progress(self) -> u8 {
        match self {
            Phase::Empty => 0,
            Phase::Committed => 1,
            Phase::Challenged => 2,
            Phase::Settled => 3,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Empty => "Empty",
            Phase::Committed => "Committed",
            Phase::Challenged => "Challenged",
            Phase::Settled => "Settled",
        })
    }
}

/// Operations a user can ask the controller for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    StartGame,
    JoinGame,
    Reveal,
    ClaimTimeout,
    Attach,
    Refresh,
}

impl Action {
    /// Actions that send a transaction and must never overlap.
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            Action::StartGame | Action::JoinGame | Action::Reveal | Action::ClaimTimeout
        )
    }

    /// Phase the ledger reaches once this action lands.
    pub fn target_phase(self) -> Option<Phase> {
        match self {
            Action::StartGame => Some(Phase::Committed),
            Action::JoinGame => Some(Phase::Challenged),
            Action::Reveal | Action::ClaimTimeout => Some(Phase::Settled),
            Action::Attach | Action::Refresh => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::StartGame => "startGame",
            Action::JoinGame => "joinGame",
            Action::Reveal => "reveal",
            Action::ClaimTimeout => "claimTimeout",
            Action::Attach => "attach",
            Action::Refresh => "refresh",
        })
    }
}

/// Phase implied by a ledger read.
///
/// The stake only drops to zero when the game pays out, through a reveal or
/// either timeout, so a zero stake is settled whatever the challenger slot
/// holds. Otherwise a filled slot means the challenger played.
pub fn derive_phase(snapshot: &LedgerSnapshot) -> Phase {
    if snapshot.stake == 0 {
        Phase::Settled
    } else if snapshot.challenger_slot_empty() {
        Phase::Committed
    } else {
        Phase::Challenged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rps_core::{Address, Move};

    fn snapshot(stake: u128, challenger_move: Move) -> LedgerSnapshot {
        LedgerSnapshot {
            participant1: Address::from_bytes([1; 20]),
            participant2: Address::from_bytes([2; 20]),
            last_activity: 1_000,
            stake,
            challenger_move,
        }
    }

    #[test]
    fn empty_slot_is_committed() {
        assert_eq!(derive_phase(&snapshot(100, Move::None)), Phase::Committed);
    }

    #[test]
    fn filled_slot_with_stake_is_challenged() {
        assert_eq!(derive_phase(&snapshot(200, Move::Paper)), Phase::Challenged);
    }

    #[test]
    fn zero_stake_is_settled() {
        assert_eq!(derive_phase(&snapshot(0, Move::Lizard)), Phase::Settled);
        // committer took the stake back after the challenger never played
        assert_eq!(derive_phase(&snapshot(0, Move::None)), Phase::Settled);
    }

    #[test]
    fn progress_follows_the_game() {
        let order = [Phase::Empty, Phase::Committed, Phase::Challenged, Phase::Settled];
        for pair in order.windows(2) {
            assert!(pair[0].progress() < pair[1].progress());
        }
    }

    #[test]
    fn target_phases() {
        assert_eq!(Action::StartGame.target_phase(), Some(Phase::Committed));
        assert_eq!(Action::JoinGame.target_phase(), Some(Phase::Challenged));
        assert_eq!(Action::Reveal.target_phase(), Some(Phase::Settled));
        assert_eq!(Action::ClaimTimeout.target_phase(), Some(Phase::Settled));
        assert!(!Action::Refresh.is_mutating());
        assert!(!Action::Attach.is_mutating());
    }
}
