use rps_core::{Address, Commitment, ContractRef, Move, Role, Salt};

use crate::error::{Result, SessionError};
use crate::gateway::LedgerSnapshot;
use crate::phase::{derive_phase, Action, Phase};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingStatus {
    /// The gateway call has not returned yet.
    InFlight,
    /// Accepted by the ledger, waiting for a read to show its effect.
    AwaitingConfirmation,
    /// The call failed in transport; it may or may not have landed.
    Unknown,
}

/// A mutating action whose outcome is not settled by a read yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pending {
    pub action: Action,
    pub status: PendingStatus,
    /// Reads since submission that did not show the action's effect.
    pub unconfirmed_reads: u32,
}

impl Pending {
    pub fn in_flight(action: Action) -> Self {
        Pending {
            action,
            status: PendingStatus::InFlight,
            unconfirmed_reads: 0,
        }
    }

    pub fn with_status(action: Action, status: PendingStatus) -> Self {
        Pending {
            status,
            ..Pending::in_flight(action)
        }
    }

    /// Blocks further mutating actions.
    pub fn is_outstanding(&self) -> bool {
        matches!(
            self.status,
            PendingStatus::InFlight | PendingStatus::AwaitingConfirmation
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Participant {
    pub address: Address,
    pub role: Role,
}

/// The local view of one game.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub contract: Option<ContractRef>,
    /// The committer.
    pub participant1: Option<Address>,
    /// The challenger.
    pub participant2: Option<Address>,
    pub stake: u128,
    /// This player's own move. For the committer it stays secret until the reveal.
    pub local_move: Option<Move>,
    pub salt: Option<Salt>,
    pub commitment: Option<Commitment>,
    /// The challenger's move slot as last read.
    pub challenger_move: Move,
    /// Phase shown to the user, possibly optimistic.
    pub phase: Phase,
    /// Phase derived from the last successful read.
    pub confirmed_phase: Phase,
    pub pending: Option<Pending>,
    pub last_activity: Option<u64>,
    pub last_failure: Option<SessionError>,
}

impl Session {
    pub fn participant(&self, role: Role) -> Option<Participant> {
        let address = match role {
            Role::Committer => self.participant1?,
            Role::Challenger => self.participant2?,
        };
        Some(Participant { address, role })
    }

    pub fn role_of(&self, address: &Address) -> Option<Role> {
        if self.participant1.as_ref() == Some(address) {
            Some(Role::Committer)
        } else if self.participant2.as_ref() == Some(address) {
            Some(Role::Challenger)
        } else {
            None
        }
    }

    /// Phase that guards are evaluated against.
    ///
    /// After a transport failure the optimistic phase is unproven, so the
    /// last authoritative phase is used and the action can be retried.
    pub fn guard_phase(&self) -> Phase {
        match self.pending {
            Some(Pending {
                status: PendingStatus::Unknown,
                ..
            }) => self.confirmed_phase,
            _ => self.phase,
        }
    }

    pub fn outstanding(&self) -> Option<Action> {
        self.pending
            .filter(Pending::is_outstanding)
            .map(|pending| pending.action)
    }

    pub fn clear_secrets(&mut self) {
        self.salt = None;
        self.local_move = None;
    }

    /// Count a read that could not show the submitted action.
    pub fn note_unconfirmed_read(&mut self) {
        if let Some(pending) = self.pending.as_mut() {
            if pending.status == PendingStatus::AwaitingConfirmation {
                pending.unconfirmed_reads += 1;
            }
        }
    }

    /// After `limit` reads without its effect, a submitted action is treated
    /// as lost: its outcome becomes unknown and it can be sent again.
    /// Returns the action if it was given up on.
    pub fn expire_unconfirmed(&mut self, limit: u32) -> Option<Action> {
        let pending = self.pending.as_mut()?;
        if pending.status == PendingStatus::AwaitingConfirmation && pending.unconfirmed_reads >= limit {
            pending.status = PendingStatus::Unknown;
            Some(pending.action)
        } else {
            None
        }
    }

    // -----------------------------------------------------------------------
    // Guards
    // -----------------------------------------------------------------------

    pub fn ensure_idle(&self) -> Result<()> {
        match self.outstanding() {
            Some(action) => Err(SessionError::OperationInProgress(action)),
            None => Ok(()),
        }
    }

    fn contract_ref(&self) -> Result<ContractRef> {
        self.contract
            .ok_or_else(|| SessionError::Malformed("no game contract is attached".into()))
    }

    fn illegal(&self, action: Action, reason: &'static str) -> SessionError {
        SessionError::IllegalTransition {
            action,
            phase: self.guard_phase(),
            reason,
        }
    }

    pub fn check_start(&self) -> Result<()> {
        self.ensure_idle()?;
        match self.guard_phase() {
            Phase::Empty | Phase::Settled => Ok(()),
            _ => Err(self.illegal(Action::StartGame, "a game is already running")),
        }
    }

    /// Returns the contract and the stake the challenger has to match.
    pub fn check_join(&self, local: &Address) -> Result<(ContractRef, u128)> {
        self.ensure_idle()?;
        if self.guard_phase() != Phase::Committed {
            return Err(self.illegal(Action::JoinGame, "no open game to join"));
        }
        if self.role_of(local) != Some(Role::Challenger) {
            return Err(self.illegal(Action::JoinGame, "only the challenger can play"));
        }
        let contract = self.contract_ref()?;
        if self.stake == 0 {
            return Err(SessionError::Malformed("the game's stake is unknown".into()));
        }
        Ok((contract, self.stake))
    }

    pub fn check_reveal(&self, local: &Address) -> Result<ContractRef> {
        self.ensure_idle()?;
        if self.guard_phase() != Phase::Challenged {
            return Err(self.illegal(Action::Reveal, "the challenger has not played"));
        }
        if self.role_of(local) != Some(Role::Committer) {
            return Err(self.illegal(Action::Reveal, "only the committer can reveal"));
        }
        self.contract_ref()
    }

    /// Returns the contract and the party that stalled.
    pub fn check_timeout(
        &self,
        local: &Address,
        now: u64,
        timeout_secs: u64,
    ) -> Result<(ContractRef, Role)> {
        self.ensure_idle()?;
        let stalled = match self.guard_phase() {
            Phase::Committed => Role::Challenger,
            Phase::Challenged => Role::Committer,
            _ => return Err(self.illegal(Action::ClaimTimeout, "no game is waiting on anyone")),
        };
        if self.role_of(local) != Some(stalled.opponent()) {
            return Err(self.illegal(
                Action::ClaimTimeout,
                "only the waiting party can claim a timeout",
            ));
        }
        let last = self.last_activity.ok_or_else(|| {
            self.illegal(Action::ClaimTimeout, "no ledger activity has been observed yet")
        })?;
        if now.saturating_sub(last) <= timeout_secs {
            return Err(self.illegal(Action::ClaimTimeout, "timeout window has not elapsed"));
        }
        Ok((self.contract_ref()?, stalled))
    }

    pub fn check_attach(&self) -> Result<()> {
        self.ensure_idle()?;
        match self.guard_phase() {
            Phase::Empty | Phase::Settled => Ok(()),
            _ => Err(self.illegal(Action::Attach, "finish the current game first")),
        }
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Fold a ledger read into this session.
    ///
    /// The read overwrites participants, stake and activity time, and its
    /// derived phase replaces any optimistic one. A read older than the
    /// activity already held is refused with `StaleRead`, and so is a read
    /// at the same activity time that shows less progress: `solve` and the
    /// timeouts settle without touching the activity time.
    pub fn reconcile(&self, snapshot: &LedgerSnapshot) -> Result<Session> {
        let derived = derive_phase(snapshot);
        if let Some(held) = self.last_activity {
            let behind = snapshot.last_activity == held
                && derived.progress() < self.confirmed_phase.progress();
            if snapshot.last_activity < held || behind {
                return Err(SessionError::StaleRead {
                    held,
                    observed: snapshot.last_activity,
                });
            }
        }

        let mut next = self.clone();
        next.participant1 = Some(snapshot.participant1);
        next.participant2 = Some(snapshot.participant2);
        next.last_activity = Some(snapshot.last_activity);
        next.stake = snapshot.stake;
        next.challenger_move = snapshot.challenger_move;
        next.phase = derived;
        next.confirmed_phase = derived;

        if let Some(pending) = next.pending {
            let reached = derived == Phase::Settled || pending.action.target_phase() == Some(derived);
            if reached && pending.status != PendingStatus::InFlight {
                next.pending = None;
            } else if !reached {
                next.note_unconfirmed_read();
            }
        }
        if derived == Phase::Settled {
            next.clear_secrets();
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    fn contract() -> ContractRef {
        ContractRef::new(addr(0xC0))
    }

    fn snapshot(ts: u64, stake: u128, mv: Move) -> LedgerSnapshot {
        LedgerSnapshot {
            participant1: addr(1),
            participant2: addr(2),
            last_activity: ts,
            stake,
            challenger_move: mv,
        }
    }

    fn committed() -> Session {
        Session {
            contract: Some(contract()),
            ..Session::default()
        }
        .reconcile(&snapshot(1_000, 100, Move::None))
        .unwrap()
    }

    #[test]
    fn reconcile_overwrites_ledger_fields() {
        let s = committed();
        assert_eq!(s.participant1, Some(addr(1)));
        assert_eq!(s.participant2, Some(addr(2)));
        assert_eq!(s.stake, 100);
        assert_eq!(s.last_activity, Some(1_000));
        assert_eq!(s.phase, Phase::Committed);
        assert_eq!(s.confirmed_phase, Phase::Committed);
    }

    #[test]
    fn older_read_is_stale_and_equal_read_is_idempotent() {
        let s = committed();
        assert_eq!(
            s.reconcile(&snapshot(999, 100, Move::None)),
            Err(SessionError::StaleRead {
                held: 1_000,
                observed: 999
            })
        );
        assert_eq!(s.reconcile(&snapshot(1_000, 100, Move::None)).unwrap(), s);
    }

    #[test]
    fn read_overrides_optimistic_phase() {
        let mut s = committed();
        s.phase = Phase::Challenged;
        s.pending = Some(Pending::in_flight(Action::JoinGame));
        let next = s.reconcile(&snapshot(1_000, 100, Move::None)).unwrap();
        assert_eq!(next.phase, Phase::Committed);
        // still in flight: the call has not returned
        assert_eq!(next.outstanding(), Some(Action::JoinGame));
    }

    #[test]
    fn read_reaching_target_clears_awaiting_confirmation() {
        let mut s = committed();
        s.phase = Phase::Challenged;
        s.pending = Some(Pending::with_status(
            Action::JoinGame,
            PendingStatus::AwaitingConfirmation,
        ));
        let next = s.reconcile(&snapshot(1_010, 100, Move::Paper)).unwrap();
        assert_eq!(next.phase, Phase::Challenged);
        assert_eq!(next.pending, None);
    }

    #[test]
    fn settled_read_drops_secrets() {
        let mut s = committed();
        s.local_move = Some(Move::Rock);
        s.salt = Some(Salt::from_u64(42));
        let next = s.reconcile(&snapshot(1_010, 0, Move::Paper)).unwrap();
        assert_eq!(next.phase, Phase::Settled);
        assert_eq!(next.salt, None);
        assert_eq!(next.local_move, None);
    }

    #[test]
    fn unknown_pending_guards_on_confirmed_phase() {
        let mut s = committed();
        s.phase = Phase::Challenged;
        s.pending = Some(Pending::with_status(Action::JoinGame, PendingStatus::Unknown));
        assert_eq!(s.guard_phase(), Phase::Committed);
        assert!(s.check_join(&addr(2)).is_ok());
    }

    #[test]
    fn outstanding_pending_blocks_every_guard() {
        let mut s = committed();
        s.pending = Some(Pending::in_flight(Action::Reveal));
        let busy = Err(SessionError::OperationInProgress(Action::Reveal));
        assert_eq!(s.check_start(), busy);
        assert_eq!(s.check_attach(), busy);
        assert_eq!(s.check_join(&addr(2)).map(|_| ()), busy);
    }

    #[test]
    fn join_requires_challenger() {
        let s = committed();
        assert!(matches!(
            s.check_join(&addr(1)),
            Err(SessionError::IllegalTransition { .. })
        ));
        assert_eq!(s.check_join(&addr(2)), Ok((contract(), 100)));
    }

    #[test]
    fn timeout_direction_and_window() {
        let s = committed();
        // challenger stalled: only the committer may claim, and only after 300s
        assert!(s.check_timeout(&addr(2), 2_000, 300).is_err());
        assert!(s.check_timeout(&addr(1), 1_300, 300).is_err());
        assert_eq!(
            s.check_timeout(&addr(1), 1_301, 300),
            Ok((contract(), Role::Challenger))
        );

        let challenged = s.reconcile(&snapshot(1_100, 100, Move::Spock)).unwrap();
        assert_eq!(
            challenged.check_timeout(&addr(2), 1_401, 300),
            Ok((contract(), Role::Committer))
        );
        assert!(challenged.check_timeout(&addr(1), 1_401, 300).is_err());
    }

    #[test]
    fn role_lookup() {
        let s = committed();
        assert_eq!(s.role_of(&addr(1)), Some(Role::Committer));
        assert_eq!(s.role_of(&addr(2)), Some(Role::Challenger));
        assert_eq!(s.role_of(&addr(3)), None);
        assert_eq!(
            s.participant(Role::Challenger),
            Some(Participant {
                address: addr(2),
                role: Role::Challenger
            })
        );
    }

    #[test]
    fn settled_view_survives_a_late_read_at_the_same_time() {
        let mut s = committed()
            .reconcile(&snapshot(1_010, 100, Move::Paper))
            .unwrap();
        s.local_move = Some(Move::Rock);
        s.salt = Some(Salt::from_u64(42));
        let settled = s.reconcile(&snapshot(1_010, 0, Move::Paper)).unwrap();

        // issued before the solve, answered after it
        assert_eq!(
            settled.reconcile(&snapshot(1_010, 100, Move::Paper)),
            Err(SessionError::StaleRead {
                held: 1_010,
                observed: 1_010
            })
        );
        // and the refunded-timeout case, where the slot stays empty
        let refunded = committed().reconcile(&snapshot(1_000, 0, Move::None)).unwrap();
        assert_eq!(refunded.phase, Phase::Settled);
        assert!(refunded.reconcile(&snapshot(1_000, 100, Move::None)).is_err());
    }

    fn orderings(reads: &[LedgerSnapshot]) -> Vec<Vec<LedgerSnapshot>> {
        if reads.len() <= 1 {
            return vec![reads.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..reads.len() {
            let mut rest = reads.to_vec();
            let first = rest.remove(i);
            for mut tail in orderings(&rest) {
                tail.insert(0, first);
                out.push(tail);
            }
        }
        out
    }

    fn fold(reads: &[LedgerSnapshot]) -> Session {
        let fresh = Session {
            contract: Some(contract()),
            ..Session::default()
        };
        reads
            .iter()
            .fold(fresh, |s, read| s.reconcile(read).unwrap_or(s))
    }

    #[test]
    fn arrival_order_does_not_change_the_outcome() {
        let histories = [
            // played and revealed
            vec![
                snapshot(1_000, 100, Move::None),
                snapshot(1_010, 100, Move::Paper),
                snapshot(1_010, 0, Move::Paper),
            ],
            // committer reclaimed an unanswered game
            vec![
                snapshot(1_000, 100, Move::None),
                snapshot(1_000, 100, Move::None),
                snapshot(1_000, 0, Move::None),
            ],
            // still running
            vec![
                snapshot(1_000, 100, Move::None),
                snapshot(1_020, 100, Move::Spock),
            ],
        ];
        for history in &histories {
            let expected = fold(history);
            for order in orderings(history) {
                assert_eq!(fold(&order), expected, "order {order:?}");
            }
        }
    }

    #[derive(Clone, Copy, Debug)]
    enum Op {
        Start,
        Join,
        Reveal,
        TimeoutBy(Role),
    }

    const OPS: [Op; 5] = [
        Op::Start,
        Op::Join,
        Op::Reveal,
        Op::TimeoutBy(Role::Committer),
        Op::TimeoutBy(Role::Challenger),
    ];

    /// Guard then apply the optimistic transition, as the controller does.
    fn apply(s: &mut Session, op: Op) -> bool {
        let seat = |role| match role {
            Role::Committer => addr(1),
            Role::Challenger => addr(2),
        };
        let outcome = match op {
            Op::Start => s.check_start().map(|()| {
                *s = Session {
                    contract: Some(contract()),
                    participant1: Some(addr(1)),
                    participant2: Some(addr(2)),
                    stake: 100,
                    last_activity: Some(1_000),
                    phase: Phase::Committed,
                    ..Session::default()
                }
            }),
            Op::Join => s
                .check_join(&addr(2))
                .map(|_| s.phase = Phase::Challenged),
            Op::Reveal => s.check_reveal(&addr(1)).map(|_| s.phase = Phase::Settled),
            Op::TimeoutBy(role) => s
                .check_timeout(&seat(role), 5_000, 300)
                .map(|_| s.phase = Phase::Settled),
        };
        outcome.is_ok()
    }

    #[test]
    fn every_operation_sequence_passes_through_committed() {
        let len = 5;
        for n in 0..OPS.len().pow(len) {
            let mut s = Session::default();
            let mut seen_committed = false;
            let mut code = n;
            for _ in 0..len {
                let op = OPS[code % OPS.len()];
                code /= OPS.len();

                let before = s.phase;
                let applied = apply(&mut s, op);
                if before == Phase::Settled && !matches!(op, Op::Start) {
                    assert!(!applied, "{op:?} left a settled game");
                }
                match s.phase {
                    Phase::Committed => seen_committed = true,
                    Phase::Challenged | Phase::Settled => {
                        assert!(seen_committed, "sequence {n} skipped Committed")
                    }
                    Phase::Empty => {}
                }
            }
        }
    }
}
