use rps_core::CodecError;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::phase::{Action, Phase};

pub type Result<T, E = SessionError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("move must be one of rock, paper, scissors, spock or lizard")]
    InvalidMove,
    #[error("{action} is not allowed while {phase}: {reason}")]
    IllegalTransition {
        action: Action,
        phase: Phase,
        reason: &'static str,
    },
    #[error("{0} is already awaiting confirmation")]
    OperationInProgress(Action),
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("transaction rejected: {0}")]
    Rejected(String),
    #[error("ledger unreachable: {0}")]
    Unreachable(String),
    #[error("contract read failed: {0}")]
    ReadFailed(String),
    /// Internal; `refresh` swallows it.
    #[error("stale read: held activity {held}, observed {observed}")]
    StaleRead { held: u64, observed: u64 },
}

impl SessionError {
    /// Caught before anything was sent to the ledger.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            SessionError::InvalidMove
                | SessionError::IllegalTransition { .. }
                | SessionError::OperationInProgress(_)
                | SessionError::Malformed(_)
        )
    }

    /// The same call may succeed if tried again unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::Unreachable(_))
    }
}

impl From<CodecError> for SessionError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::InvalidMove => SessionError::InvalidMove,
            other => SessionError::Malformed(other.to_string()),
        }
    }
}

impl From<GatewayError> for SessionError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected(detail) => SessionError::Rejected(detail),
            GatewayError::Unreachable(detail) => SessionError::Unreachable(detail),
            GatewayError::ReadFailed(detail) => SessionError::ReadFailed(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_errors_map_onto_taxonomy() {
        assert_eq!(SessionError::from(CodecError::InvalidMove), SessionError::InvalidMove);
        assert!(matches!(
            SessionError::from(CodecError::MalformedAddress("0x1".into())),
            SessionError::Malformed(_)
        ));
    }

    #[test]
    fn classification() {
        assert!(SessionError::Malformed("x".into()).is_local());
        assert!(SessionError::OperationInProgress(Action::Reveal).is_local());
        assert!(!SessionError::Rejected("x".into()).is_local());
        assert!(SessionError::Unreachable("x".into()).is_retryable());
        assert!(!SessionError::ReadFailed("x".into()).is_retryable());
    }

    #[test]
    fn illegal_transition_message_names_action_and_phase() {
        let err = SessionError::IllegalTransition {
            action: Action::ClaimTimeout,
            phase: Phase::Committed,
            reason: "timeout window has not elapsed",
        };
        assert_eq!(
            err.to_string(),
            "claimTimeout is not allowed while Committed: timeout window has not elapsed"
        );
    }
}
