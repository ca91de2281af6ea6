//! Client-side session state for a commit-reveal rock-paper-scissors-lizard-spock
//! game settled by a ledger contract.
//!
//! A [`SessionController`] owns one [`Session`], guards every action against
//! its phase, talks to the ledger through a [`LedgerGateway`] and folds ledger
//! reads back in. [`InMemoryLedger`] plays the contract's part in tests and
//! local runs.

pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod phase;
pub mod session;
pub mod status;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SessionConfig;
pub use controller::SessionController;
pub use error::{Result, SessionError};
pub use gateway::{Deployment, GatewayError, LedgerCall, LedgerGateway, LedgerSnapshot, TxStatus};
pub use memory::{InMemoryLedger, LedgerHandle};
pub use phase::{derive_phase, Action, Phase};
pub use session::{Participant, Pending, PendingStatus, Session};
pub use status::EnabledActions;
pub use store::SessionStore;
