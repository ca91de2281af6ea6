use rps_core::{codec, Address, ContractRef, Move, Role, Salt};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::gateway::{Deployment, GatewayError, LedgerCall, LedgerGateway, LedgerSnapshot, TxStatus};
use crate::phase::{Action, Phase};
use crate::session::{Pending, PendingStatus, Session};
use crate::status::{self, EnabledActions};
use crate::store::SessionStore;

/// Drives one game session against a [`LedgerGateway`].
///
/// Every mutation of the session goes through the guarded operations below.
/// Reads may run while a write is outstanding; a second write may not.
pub struct SessionController<G, C = SystemClock> {
    gateway: G,
    clock: C,
    local: Address,
    config: SessionConfig,
    store: SessionStore,
}

impl<G: LedgerGateway> SessionController<G, SystemClock> {
    pub fn new(gateway: G, local: Address, config: SessionConfig) -> Self {
        SessionController::with_clock(gateway, SystemClock, local, config)
    }
}

impl<G: LedgerGateway, C: Clock> SessionController<G, C> {
    pub fn with_clock(gateway: G, clock: C, local: Address, config: SessionConfig) -> Self {
        SessionController {
            gateway,
            clock,
            local,
            config,
            store: SessionStore::default(),
        }
    }

    // -----------------------------------------------------------------------
    // UI surface
    // -----------------------------------------------------------------------

    pub fn session(&self) -> Session {
        self.store.get()
    }

    pub fn phase(&self) -> Phase {
        self.store.get().phase
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.store.subscribe()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn local(&self) -> Address {
        self.local
    }

    /// Whether `address` is the connected account.
    pub fn is_local(&self, address: &Address) -> bool {
        *address == self.local
    }

    pub fn local_role(&self) -> Option<Role> {
        self.store.get().role_of(&self.local)
    }

    pub fn status(&self) -> String {
        status::status_label(&self.store.get(), &self.local)
    }

    pub fn enabled_actions(&self) -> EnabledActions {
        status::enabled_actions(
            &self.store.get(),
            &self.local,
            self.clock.now(),
            self.config.timeout_secs,
        )
    }

    // -----------------------------------------------------------------------
    // Mutating operations
    // -----------------------------------------------------------------------

    /// Deploy a new game against `challenger`, committing to `mv` under `salt`.
    ///
    /// Starting from a settled game discards it first.
    #[instrument(skip_all, fields(%challenger, stake = stake))]
    pub async fn start_game(
        &self,
        challenger: Address,
        stake: u128,
        mv: Move,
        salt: Salt,
    ) -> Result<ContractRef> {
        let mv = mv.playable()?;
        if challenger.is_zero() {
            return Err(SessionError::Malformed("challenger is the zero address".into()));
        }
        if challenger == self.local {
            return Err(SessionError::Malformed("cannot challenge yourself".into()));
        }
        if stake == 0 {
            return Err(SessionError::Malformed("stake must be greater than zero".into()));
        }
        let commitment = codec::commit(mv, &salt)?;

        let local = self.local;
        self.store.try_update(|s| {
            s.check_start()?;
            *s = Session {
                participant1: Some(local),
                participant2: Some(challenger),
                stake,
                local_move: Some(mv),
                salt: Some(salt),
                commitment: Some(commitment),
                phase: Phase::Committed,
                pending: Some(Pending::in_flight(Action::StartGame)),
                ..Session::default()
            };
            Ok::<_, SessionError>(())
        })?;

        info!(%commitment, "deploying game");
        match self.gateway.deploy(commitment, challenger, stake).await {
            Ok(Deployment { contract, status }) => {
                if !matches!(status, TxStatus::Reverted(_)) {
                    self.store.update(|s| s.contract = Some(contract));
                }
                self.finish_write(Action::StartGame, status).await?;
                Ok(contract)
            }
            Err(err) => Err(self.fail_write(Action::StartGame, err)),
        }
    }

    /// Answer the open game with `mv`, matching its stake.
    #[instrument(skip_all, fields(%mv))]
    pub async fn join_game(&self, mv: Move) -> Result<()> {
        let mv = mv.playable()?;
        let local = self.local;
        let (contract, stake) = self.store.try_update(|s| {
            let checked = s.check_join(&local)?;
            s.local_move = Some(mv);
            s.phase = Phase::Challenged;
            s.pending = Some(Pending::in_flight(Action::JoinGame));
            s.last_failure = None;
            Ok::<_, SessionError>(checked)
        })?;

        info!(%contract, stake, "playing");
        let outcome = self.gateway.write(contract, LedgerCall::Play(mv), stake).await;
        self.settle(Action::JoinGame, outcome).await
    }

    /// Reveal the move and salt held since `start_game`.
    pub async fn reveal(&self) -> Result<()> {
        self.reveal_inner(None).await
    }

    /// Reveal with a move and salt supplied by the user.
    pub async fn reveal_with(&self, mv: Move, salt: Salt) -> Result<()> {
        self.reveal_inner(Some((mv, salt))).await
    }

    #[instrument(skip_all)]
    async fn reveal_inner(&self, secrets: Option<(Move, Salt)>) -> Result<()> {
        let local = self.local;
        let (contract, mv, salt) = self.store.try_update(|s| {
            let contract = s.check_reveal(&local)?;
            let (mv, salt) = match secrets {
                Some(explicit) => explicit,
                None => match (s.local_move, s.salt) {
                    (Some(mv), Some(salt)) => (mv, salt),
                    _ => {
                        return Err(SessionError::Malformed(
                            "no move and salt are held for this game".into(),
                        ))
                    }
                },
            };
            let mv = mv.playable()?;
            let commitment = s.commitment.ok_or_else(|| {
                SessionError::Malformed("no commitment is held to check the reveal against".into())
            })?;
            if !codec::verify(mv, &salt, &commitment) {
                return Err(SessionError::Malformed(
                    "move and salt do not match the commitment".into(),
                ));
            }
            s.phase = Phase::Settled;
            s.pending = Some(Pending::in_flight(Action::Reveal));
            s.last_failure = None;
            Ok::<_, SessionError>((contract, mv, salt))
        })?;

        info!(%contract, "solving");
        let outcome = self
            .gateway
            .write(contract, LedgerCall::Solve { mv, salt }, 0)
            .await;
        self.settle(Action::Reveal, outcome).await
    }

    /// Collect the pot from a participant who stopped playing.
    #[instrument(skip_all)]
    pub async fn claim_timeout(&self) -> Result<()> {
        let local = self.local;
        let now = self.clock.now();
        let window = self.config.timeout_secs;
        let (contract, stalled) = self.store.try_update(|s| {
            let checked = s.check_timeout(&local, now, window)?;
            s.pending = Some(Pending::in_flight(Action::ClaimTimeout));
            s.last_failure = None;
            Ok::<_, SessionError>(checked)
        })?;

        info!(%contract, ?stalled, "claiming timeout");
        let outcome = self
            .gateway
            .write(contract, LedgerCall::Timeout { stalled }, 0)
            .await;
        self.settle(Action::ClaimTimeout, outcome).await
    }

    /// Replace the local session with the game at `contract`.
    #[instrument(skip_all, fields(%contract))]
    pub async fn attach(&self, contract: ContractRef) -> Result<Session> {
        self.store.get().check_attach()?;
        let snapshot = match self.read_with_retry(contract).await {
            Ok(snapshot) => snapshot,
            Err(err) => return Err(self.record_failure(err)),
        };

        let session = self.store.try_update(|s| {
            s.check_attach()?;
            let fresh = Session {
                contract: Some(contract),
                ..Session::default()
            };
            *s = fresh.reconcile(&snapshot)?;
            Ok::<_, SessionError>(s.clone())
        })?;
        info!(phase = %session.phase, "attached");
        Ok(session)
    }

    /// Read the contract again and fold the result in.
    #[instrument(skip_all)]
    pub async fn refresh(&self) -> Result<Session> {
        let contract = self
            .store
            .get()
            .contract
            .ok_or_else(|| SessionError::Malformed("no game contract is attached".into()))?;
        let snapshot = match self.read_with_retry(contract).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                // a deploy that never landed leaves nothing to read
                if matches!(err, SessionError::ReadFailed(_)) {
                    let limit = self.config.unconfirmed_read_limit;
                    let expired = self.store.update(|s| {
                        s.note_unconfirmed_read();
                        s.expire_unconfirmed(limit)
                    });
                    self.log_expired(expired);
                }
                return Err(self.record_failure(err));
            }
        };
        self.apply_read(contract, &snapshot);
        Ok(self.store.get())
    }

    /// Fold a read obtained elsewhere into the session. Returns whether it
    /// was applied; stale reads are dropped.
    pub fn apply_snapshot(&self, snapshot: &LedgerSnapshot) -> bool {
        match self.store.get().contract {
            Some(contract) => self.apply_read(contract, snapshot),
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn apply_read(&self, contract: ContractRef, snapshot: &LedgerSnapshot) -> bool {
        let limit = self.config.unconfirmed_read_limit;
        let mut expired = None;
        let outcome = self.store.try_update(|s| {
            if s.contract != Some(contract) {
                return Ok(false);
            }
            *s = s.reconcile(snapshot)?;
            expired = s.expire_unconfirmed(limit);
            Ok::<_, SessionError>(true)
        });
        self.log_expired(expired);
        match outcome {
            Ok(true) => {
                debug!(%contract, last_activity = snapshot.last_activity, "reconciled read");
                true
            }
            Ok(false) => {
                debug!(%contract, "dropping read for a detached contract");
                false
            }
            Err(SessionError::StaleRead { held, observed }) => {
                warn!(%contract, held, observed, "discarding stale read");
                false
            }
            Err(err) => {
                warn!(%contract, %err, "discarding read");
                false
            }
        }
    }

    fn log_expired(&self, expired: Option<Action>) {
        if let Some(action) = expired {
            warn!(%action, "submitted transaction never showed up; it may be sent again");
        }
    }

    async fn read_with_retry(&self, contract: ContractRef) -> Result<LedgerSnapshot> {
        let attempts = self.config.read_attempts();
        let mut attempt = 1;
        loop {
            match self.gateway.read(contract).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(GatewayError::Unreachable(detail)) if attempt < attempts => {
                    warn!(%contract, attempt, %detail, "ledger unreachable; retrying read");
                    attempt += 1;
                    tokio::time::sleep(self.config.read_backoff()).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn settle(
        &self,
        action: Action,
        outcome: std::result::Result<TxStatus, GatewayError>,
    ) -> Result<()> {
        match outcome {
            Ok(status) => self.finish_write(action, status).await,
            Err(err) => Err(self.fail_write(action, err)),
        }
    }

    async fn finish_write(&self, action: Action, status: TxStatus) -> Result<()> {
        match status {
            TxStatus::Confirmed => {
                info!(%action, "transaction confirmed");
                self.store.update(|s| {
                    if s.pending.map(|p| p.action) == Some(action) {
                        s.pending = None;
                    }
                    // a receipt is as authoritative as a read
                    if let Some(target) = action.target_phase() {
                        s.phase = target;
                        s.confirmed_phase = target;
                    }
                    if matches!(action, Action::Reveal | Action::ClaimTimeout) {
                        s.clear_secrets();
                    }
                });
                if self.config.confirm_after_write {
                    if let Err(err) = self.refresh().await {
                        warn!(%action, %err, "confirming read failed");
                    }
                }
                Ok(())
            }
            TxStatus::Submitted => {
                info!(%action, "transaction submitted; awaiting confirmation");
                self.store.update(|s| {
                    if let Some(pending) = s.pending.as_mut() {
                        if pending.action == action {
                            pending.status = PendingStatus::AwaitingConfirmation;
                        }
                    }
                });
                Ok(())
            }
            TxStatus::Reverted(reason) => Err(self.fail_write(action, GatewayError::Rejected(reason))),
        }
    }

    /// Rejections roll back to the last authoritative phase; transport
    /// failures leave the optimistic state in place for a retry.
    fn fail_write(&self, action: Action, err: GatewayError) -> SessionError {
        let rejected = matches!(err, GatewayError::Rejected(_));
        let err = SessionError::from(err);
        if rejected {
            error!(%action, %err, "transaction rejected; rolling back");
            self.store.update(|s| {
                if s.pending.map(|p| p.action) == Some(action) {
                    s.pending = None;
                }
                match action {
                    Action::StartGame if s.confirmed_phase == Phase::Empty => *s = Session::default(),
                    Action::JoinGame => s.local_move = None,
                    _ => {}
                }
                s.phase = s.confirmed_phase;
                s.last_failure = Some(err.clone());
            });
        } else {
            warn!(%action, %err, "transaction outcome unknown");
            self.store.update(|s| {
                if let Some(pending) = s.pending.as_mut() {
                    if pending.action == action {
                        pending.status = PendingStatus::Unknown;
                    }
                }
                s.last_failure = Some(err.clone());
            });
        }
        err
    }

    fn record_failure(&self, err: SessionError) -> SessionError {
        warn!(%err, "read failed");
        self.store.update(|s| s.last_failure = Some(err.clone()));
        err
    }
}
