//! An in-process ledger that behaves like the deployed game contract from
//! the outside: same fields, same reverts, same timeout rule.
//!
//! Each [`LedgerHandle`] acts for one account, so two handles on one
//! [`InMemoryLedger`] stand in for two browsers sharing a chain.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use rps_core::abi::CallData;
use rps_core::{codec, Address, Commitment, ContractRef, Move, Role};
use tokio::sync::Notify;
use tracing::debug;

use crate::clock::Clock;
use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::gateway::{Deployment, GatewayError, LedgerCall, LedgerGateway, LedgerSnapshot, TxStatus};

#[derive(Clone, Debug)]
struct Game {
    j1: Address,
    j2: Address,
    c1_hash: Commitment,
    c2: Move,
    stake: u128,
    last_action: u64,
}

struct LedgerState {
    games: HashMap<ContractRef, Game>,
    deployed: u64,
    timeout_secs: u64,
    reachable: bool,
    reads_fail: bool,
    submit_only: bool,
    drop_writes: bool,
    reject_next: Option<String>,
    write_gate: Option<Arc<Notify>>,
    reads: u64,
    writes: u64,
    last_call: Option<CallData>,
}

#[derive(Clone)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryLedger {
    pub fn new(clock: impl Clock + 'static) -> Self {
        InMemoryLedger {
            state: Arc::new(Mutex::new(LedgerState {
                games: HashMap::new(),
                deployed: 0,
                timeout_secs: DEFAULT_TIMEOUT_SECS,
                reachable: true,
                reads_fail: false,
                submit_only: false,
                drop_writes: false,
                reject_next: None,
                write_gate: None,
                reads: 0,
                writes: 0,
                last_call: None,
            })),
            clock: Arc::new(clock),
        }
    }

    /// A gateway acting as `account`.
    pub fn connect(&self, account: Address) -> LedgerHandle {
        LedgerHandle {
            ledger: self.clone(),
            account,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_timeout_secs(&self, secs: u64) {
        self.lock().timeout_secs = secs;
    }

    /// While unreachable every call fails with `Unreachable` and has no effect.
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    pub fn set_reads_fail(&self, fail: bool) {
        self.lock().reads_fail = fail;
    }

    /// Writes take effect but report `Submitted` instead of `Confirmed`.
    pub fn set_submit_only(&self, submit_only: bool) {
        self.lock().submit_only = submit_only;
    }

    /// Deploys and writes report `Submitted` but never land, like a
    /// transaction dropped from the mempool.
    pub fn set_drop_writes(&self, drop: bool) {
        self.lock().drop_writes = drop;
    }

    /// The next deploy or write is refused with `Rejected`.
    pub fn reject_next(&self, reason: impl Into<String>) {
        self.lock().reject_next = Some(reason.into());
    }

    /// Hold every deploy and write until the returned handle is notified,
    /// one permit per call.
    pub fn gate_writes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().write_gate = Some(gate.clone());
        gate
    }

    pub fn ungate_writes(&self) {
        self.lock().write_gate = None;
    }

    pub fn snapshot(&self, contract: &ContractRef) -> Option<LedgerSnapshot> {
        self.lock().games.get(contract).map(Game::snapshot)
    }

    /// Packed arguments of the last call that reached the contract.
    pub fn last_call(&self) -> Option<CallData> {
        self.lock().last_call.clone()
    }

    pub fn reads(&self) -> u64 {
        self.lock().reads
    }

    pub fn writes(&self) -> u64 {
        self.lock().writes
    }

    async fn wait_gate(&self) {
        let gate = self.lock().write_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    fn precheck(state: &mut LedgerState) -> Result<(), GatewayError> {
        if !state.reachable {
            return Err(GatewayError::Unreachable("connection refused".into()));
        }
        state.writes += 1;
        if let Some(reason) = state.reject_next.take() {
            return Err(GatewayError::Rejected(reason));
        }
        Ok(())
    }
}

impl Game {
    fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            participant1: self.j1,
            participant2: self.j2,
            last_activity: self.last_action,
            stake: self.stake,
            challenger_move: self.c2,
        }
    }

    fn apply(
        &mut self,
        sender: Address,
        call: LedgerCall,
        value: u128,
        now: u64,
        timeout_secs: u64,
    ) -> Result<(), String> {
        let timed_out = now > self.last_action.saturating_add(timeout_secs);
        match call {
            LedgerCall::Play(mv) => {
                require(self.c2 == Move::None, "already played")?;
                require(mv != Move::None, "invalid move")?;
                require(value == self.stake, "stake mismatch")?;
                require(sender == self.j2, "only j2 can play")?;
                self.c2 = mv;
                self.last_action = now;
            }
            LedgerCall::Solve { mv, salt } => {
                require(mv != Move::None, "invalid move")?;
                require(self.c2 != Move::None, "j2 has not played")?;
                require(sender == self.j1, "only j1 can solve")?;
                require(self.stake > 0, "game already settled")?;
                require(codec::verify(mv, &salt, &self.c1_hash), "commitment mismatch")?;
                self.stake = 0;
            }
            LedgerCall::Timeout { stalled } => {
                let open = self.c2 == Move::None;
                match stalled {
                    Role::Committer => require(!open, "j2 has not played")?,
                    Role::Challenger => require(open, "j2 already played")?,
                }
                require(self.stake > 0, "game already settled")?;
                require(timed_out, "timeout not reached")?;
                self.stake = 0;
            }
        }
        Ok(())
    }
}

fn require(condition: bool, reason: &str) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(reason.to_owned())
    }
}

pub struct LedgerHandle {
    ledger: InMemoryLedger,
    account: Address,
}

impl LedgerHandle {
    pub fn account(&self) -> Address {
        self.account
    }

    pub fn ledger(&self) -> &InMemoryLedger {
        &self.ledger
    }
}

impl LedgerGateway for LedgerHandle {
    async fn deploy(
        &self,
        commitment: Commitment,
        challenger: Address,
        value: u128,
    ) -> Result<Deployment, GatewayError> {
        self.ledger.wait_gate().await;
        let now = self.ledger.clock.now();
        let mut state = self.ledger.lock();
        InMemoryLedger::precheck(&mut state)?;

        state.deployed += 1;
        let mut bytes = [0u8; 20];
        bytes[0] = 0xC0;
        bytes[12..].copy_from_slice(&state.deployed.to_be_bytes());
        let contract = ContractRef::new(Address::from_bytes(bytes));
        if state.drop_writes {
            debug!(%contract, "deploy dropped");
            return Ok(Deployment {
                contract,
                status: TxStatus::Submitted,
            });
        }
        state.games.insert(
            contract,
            Game {
                j1: self.account,
                j2: challenger,
                c1_hash: commitment,
                c2: Move::None,
                stake: value,
                last_action: now,
            },
        );
        debug!(%contract, deployer = %self.account, value, "deployed");
        let status = if state.submit_only {
            TxStatus::Submitted
        } else {
            TxStatus::Confirmed
        };
        Ok(Deployment { contract, status })
    }

    async fn write(
        &self,
        contract: ContractRef,
        call: LedgerCall,
        value: u128,
    ) -> Result<TxStatus, GatewayError> {
        self.ledger.wait_gate().await;
        let now = self.ledger.clock.now();
        let mut state = self.ledger.lock();
        InMemoryLedger::precheck(&mut state)?;

        let data = match call.call_data() {
            Ok(data) => data,
            Err(err) => return Ok(TxStatus::Reverted(err.to_string())),
        };
        let call = match LedgerCall::from_call_data(&data) {
            Ok(call) => call,
            Err(err) => return Ok(TxStatus::Reverted(err.to_string())),
        };
        let function = data.function.name();
        state.last_call = Some(data);
        if state.drop_writes {
            debug!(%contract, function, "write dropped");
            return Ok(TxStatus::Submitted);
        }

        let timeout_secs = state.timeout_secs;
        let submit_only = state.submit_only;
        let Some(game) = state.games.get_mut(&contract) else {
            return Ok(TxStatus::Reverted(format!("no contract at {contract}")));
        };
        if let Err(reason) = game.apply(self.account, call, value, now, timeout_secs) {
            debug!(%contract, function, %reason, "reverted");
            return Ok(TxStatus::Reverted(reason));
        }
        debug!(%contract, function, "executed");
        Ok(if submit_only {
            TxStatus::Submitted
        } else {
            TxStatus::Confirmed
        })
    }

    async fn read(&self, contract: ContractRef) -> Result<LedgerSnapshot, GatewayError> {
        let mut state = self.ledger.lock();
        if !state.reachable {
            return Err(GatewayError::Unreachable("connection refused".into()));
        }
        state.reads += 1;
        if state.reads_fail {
            return Err(GatewayError::ReadFailed("stake: execution reverted".into()));
        }
        state
            .games
            .get(&contract)
            .map(Game::snapshot)
            .ok_or_else(|| GatewayError::ReadFailed(format!("no contract at {contract}")))
    }
}
