use tiny_keccak::{Hasher, Keccak};

use crate::error::CodecError;
use crate::types::{Commitment, Move, Salt};

/// Version of the preimage layout below. Deployed contracts hash exactly this
/// layout; any change to a field width needs a new version.
pub const LAYOUT_VERSION: u8 = 1;

/// Width of the encoded move in the preimage.
pub const MOVE_WIDTH: usize = 1;

/// `move (1 byte) || salt (32 bytes, big-endian)`
pub const PREIMAGE_LEN: usize = MOVE_WIDTH + Salt::LEN;

/// Keccak-256 digest width.
pub const COMMITMENT_LEN: usize = Commitment::LEN;

/// Encode a move as its one-byte contract value.
/// Range [1, 5]; `None` is rejected.
pub fn encode_move(mv: Move) -> Result<u8, CodecError> {
    Ok(mv.playable()? as u8)
}

/// Decode a one-byte contract value back into a move.
/// Input range: [0, 5]; 0 decodes to `Move::None` (an empty slot).
pub fn decode_move(value: u8) -> Result<Move, CodecError> {
    match value {
        0 => Ok(Move::None),
        1 => Ok(Move::Rock),
        2 => Ok(Move::Paper),
        3 => Ok(Move::Scissors),
        4 => Ok(Move::Spock),
        5 => Ok(Move::Lizard),
        other => Err(CodecError::InvalidEncoding(other)),
    }
}

/// The exact bytes the contract hashes.
pub fn preimage(mv: Move, salt: &Salt) -> Result<[u8; PREIMAGE_LEN], CodecError> {
    let mut out = [0u8; PREIMAGE_LEN];
    out[0] = encode_move(mv)?;
    out[MOVE_WIDTH..].copy_from_slice(&salt.to_be_bytes());
    Ok(out)
}

/// `keccak256(move || salt)`
pub fn commit(mv: Move, salt: &Salt) -> Result<Commitment, CodecError> {
    let bytes = preimage(mv, salt)?;
    Ok(Commitment::from_bytes(keccak256(&bytes)))
}

/// Recompute the commitment and compare. An unplayable move never verifies.
pub fn verify(mv: Move, salt: &Salt, commitment: &Commitment) -> bool {
    match commit(mv, salt) {
        Ok(computed) => computed == *commitment,
        Err(_) => false,
    }
}

fn keccak256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(bytes);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}
