//! The boundary to the remote settlement contract.
//!
//! Signing, transport and the contract's own settlement rules live behind
//! [`LedgerGateway`]. The session only sees typed calls, transaction statuses
//! and the contract's five observable fields.

use std::future::Future;

use rps_core::abi::{self, CallData, Function};
use rps_core::{Address, CodecError, Commitment, ContractRef, Move, Role, Salt};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The remote call reverted.
    #[error("{0}")]
    Rejected(String),
    /// Transport failure or timeout; nothing is known about the outcome.
    #[error("{0}")]
    Unreachable(String),
    /// At least one field of a read could not be fetched.
    #[error("{0}")]
    ReadFailed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxStatus {
    /// Included and executed successfully.
    Confirmed,
    /// Accepted for inclusion; the receipt is not available yet.
    Submitted,
    /// Included but reverted.
    Reverted(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deployment {
    pub contract: ContractRef,
    pub status: TxStatus,
}

/// A post-deployment contract call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerCall {
    Play(Move),
    Solve { mv: Move, salt: Salt },
    Timeout { stalled: Role },
}

impl LedgerCall {
    pub fn function(&self) -> Function {
        match self {
            LedgerCall::Play(_) => Function::Play,
            LedgerCall::Solve { .. } => Function::Solve,
            LedgerCall::Timeout { stalled } => Function::timeout_for(*stalled),
        }
    }

    /// Packed arguments in the contract's wire layout, the bytes a gateway
    /// puts on the ledger.
    pub fn call_data(&self) -> Result<CallData, CodecError> {
        match self {
            LedgerCall::Play(mv) => abi::play(*mv),
            LedgerCall::Solve { mv, salt } => abi::solve(*mv, salt),
            LedgerCall::Timeout { stalled } => Ok(abi::timeout(*stalled)),
        }
    }

    /// Recover the call from packed arguments, as the contract dispatches it.
    pub fn from_call_data(data: &CallData) -> Result<LedgerCall, CodecError> {
        Ok(match data.function {
            Function::Play => LedgerCall::Play(abi::word_move(data.arg(0)?)?),
            Function::Solve => LedgerCall::Solve {
                mv: abi::word_move(data.arg(0)?)?,
                salt: abi::word_salt(data.arg(1)?),
            },
            Function::J1Timeout => LedgerCall::Timeout {
                stalled: Role::Committer,
            },
            Function::J2Timeout => LedgerCall::Timeout {
                stalled: Role::Challenger,
            },
        })
    }
}

/// The contract's observable fields, read all-or-nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub participant1: Address,
    pub participant2: Address,
    pub last_activity: u64,
    pub stake: u128,
    /// The challenger's move slot; `Move::None` until `play` lands.
    pub challenger_move: Move,
}

impl LedgerSnapshot {
    pub fn challenger_slot_empty(&self) -> bool {
        self.challenger_move == Move::None
    }
}

pub trait LedgerGateway: Send + Sync {
    /// Deploy a new game holding `commitment`, funded with `value`.
    fn deploy(
        &self,
        commitment: Commitment,
        challenger: Address,
        value: u128,
    ) -> impl Future<Output = Result<Deployment, GatewayError>> + Send;

    fn write(
        &self,
        contract: ContractRef,
        call: LedgerCall,
        value: u128,
    ) -> impl Future<Output = Result<TxStatus, GatewayError>> + Send;

    fn read(
        &self,
        contract: ContractRef,
    ) -> impl Future<Output = Result<LedgerSnapshot, GatewayError>> + Send;
}
