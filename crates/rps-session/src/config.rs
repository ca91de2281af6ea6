use std::time::Duration;

use serde::Deserialize;

/// Seconds of inactivity after which the waiting party may claim the pot.
/// Matches the deployed contract's `TIMEOUT` (5 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Contract-defined inactivity window, in seconds.
    pub timeout_secs: u64,
    /// Total attempts for a read when the gateway is unreachable.
    pub read_attempts: u32,
    /// Delay between read attempts.
    pub read_backoff_ms: u64,
    /// Refresh from the ledger once a write is confirmed.
    pub confirm_after_write: bool,
    /// Reads that may miss a submitted write before it is treated as lost
    /// and may be sent again.
    pub unconfirmed_read_limit: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            read_attempts: 3,
            read_backoff_ms: 250,
            confirm_after_write: true,
            unconfirmed_read_limit: 3,
        }
    }
}

impl SessionConfig {
    pub fn read_backoff(&self) -> Duration {
        Duration::from_millis(self.read_backoff_ms)
    }

    /// Always at least one attempt.
    pub fn read_attempts(&self) -> u32 {
        self.read_attempts.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.timeout_secs, 300);
        assert!(cfg.confirm_after_write);
        assert_eq!(cfg.read_backoff(), Duration::from_millis(250));
        assert_eq!(cfg.unconfirmed_read_limit, 3);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: SessionConfig = serde_json::from_str(r#"{ "read_attempts": 0 }"#).unwrap();
        assert_eq!(cfg.read_attempts, 0);
        assert_eq!(cfg.read_attempts(), 1);
        assert_eq!(cfg.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }
}
