//! Value types and the commitment codec shared by every rps client.
//!
//! Nothing in this crate performs I/O. The byte layouts here are the ones the
//! deployed settlement contract hashes and decodes, so they are fixed.

pub mod abi;
pub mod address;
pub mod codec;
pub mod error;
pub mod types;

pub use address::{Address, ContractRef};
pub use codec::{commit, verify};
pub use error::CodecError;
pub use types::{Commitment, Move, Role, Salt};
