use core::fmt;

use crate::error::CodecError;

/// A hand. Discriminants match the deployed contract's `Move` enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Move {
    #[default]
    None = 0,
    Rock = 1,
    Paper = 2,
    Scissors = 3,
    Spock = 4,
    Lizard = 5,
}

impl Move {
    /// Every move that may be committed or played.
    pub const PLAYABLE: [Move; 5] = [
        Move::Rock,
        Move::Paper,
        Move::Scissors,
        Move::Spock,
        Move::Lizard,
    ];

    pub fn is_playable(self) -> bool {
        self != Move::None
    }

    /// Returns the move back if it is playable, `InvalidMove` otherwise.
    pub fn playable(self) -> Result<Move, CodecError> {
        if self.is_playable() {
            Ok(self)
        } else {
            Err(CodecError::InvalidMove)
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Move::None => "None",
            Move::Rock => "Rock",
            Move::Paper => "Paper",
            Move::Scissors => "Scissors",
            Move::Spock => "Spock",
            Move::Lizard => "Lizard",
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A 256-bit unsigned salt, stored big-endian.
///
/// The value stays local until the reveal; `Debug` never prints it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Salt([u8; 32]);

impl Salt {
    pub const LEN: usize = 32;

    pub const fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Salt(bytes)
    }

    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Salt(bytes)
    }

    pub fn from_u128(value: u128) -> Self {
        let mut bytes = [0u8; 32];
        bytes[16..].copy_from_slice(&value.to_be_bytes());
        Salt(bytes)
    }

    pub const fn to_be_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Draw a fresh salt from the thread-local CSPRNG.
    #[cfg(feature = "random-salt")]
    pub fn random() -> Self {
        use rand::RngCore;

        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Salt(bytes)
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(<redacted>)")
    }
}

/// Keccak-256 digest binding a move and a salt.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Commitment([u8; 32]);

impl Commitment {
    pub const LEN: usize = 32;

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Commitment(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", self.to_hex())
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Which side of the game a participant plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Player 1: deploys the contract with a hashed move and the stake.
    Committer,
    /// Player 2: answers with a plain move and a matching stake.
    Challenger,
}

impl Role {
    pub fn opponent(self) -> Role {
        match self {
            Role::Committer => Role::Challenger,
            Role::Challenger => Role::Committer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_not_playable() {
        assert!(!Move::None.is_playable());
        assert_eq!(Move::None.playable(), Err(CodecError::InvalidMove));
        for mv in Move::PLAYABLE {
            assert_eq!(mv.playable(), Ok(mv));
        }
    }

    #[test]
    fn salt_from_u64_is_right_aligned() {
        let salt = Salt::from_u64(42);
        let bytes = salt.to_be_bytes();
        assert!(bytes[..31].iter().all(|b| *b == 0));
        assert_eq!(bytes[31], 0x2A);
        assert_eq!(Salt::from_u128(42), salt);
    }

    #[test]
    fn salt_debug_is_redacted() {
        let rendered = format!("{:?}", Salt::from_u64(0xDEAD_BEEF));
        assert!(!rendered.to_lowercase().contains("deadbeef"));
        assert!(rendered.contains("redacted"));
    }

    #[cfg(feature = "random-salt")]
    #[test]
    fn random_salts_differ() {
        assert_ne!(Salt::random(), Salt::random());
    }

    #[test]
    fn role_opponent_flips() {
        assert_eq!(Role::Committer.opponent(), Role::Challenger);
        assert_eq!(Role::Challenger.opponent(), Role::Committer);
    }
}
