use crate::codec::{decode_move, encode_move};
use crate::error::CodecError;
use crate::types::{Move, Role, Salt};

/// One 32-byte big-endian argument slot.
pub type Word = [u8; 32];

/// Contract entry points a participant can call after deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Function {
    Play,
    Solve,
    /// The committer stopped responding; called by the challenger.
    J1Timeout,
    /// The challenger stopped responding; called by the committer.
    J2Timeout,
}

impl Function {
    pub fn name(self) -> &'static str {
        match self {
            Function::Play => "play",
            Function::Solve => "solve",
            Function::J1Timeout => "j1Timeout",
            Function::J2Timeout => "j2Timeout",
        }
    }

    /// The timeout entry point that pays out when `stalled` stopped playing.
    pub fn timeout_for(stalled: Role) -> Function {
        match stalled {
            Role::Committer => Function::J1Timeout,
            Role::Challenger => Function::J2Timeout,
        }
    }
}

/// A function name plus its packed arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallData {
    pub function: Function,
    pub args: Vec<Word>,
}

impl CallData {
    /// Flatten the argument words into one byte string.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.args.iter().flat_map(|w| w.iter().copied()).collect()
    }

    pub fn arg(&self, index: usize) -> Result<&Word, CodecError> {
        self.args.get(index).ok_or(CodecError::MissingArgument {
            function: self.function.name(),
            index,
        })
    }
}

pub fn move_word(mv: Move) -> Result<Word, CodecError> {
    let mut word = [0u8; 32];
    word[31] = encode_move(mv)?;
    Ok(word)
}

pub fn salt_word(salt: &Salt) -> Word {
    salt.to_be_bytes()
}

/// Inverse of [`move_word`]; the upper 31 bytes must be zero.
pub fn word_move(word: &Word) -> Result<Move, CodecError> {
    if word[..31].iter().any(|b| *b != 0) {
        return Err(CodecError::WordOverflow);
    }
    decode_move(word[31])
}

pub fn word_salt(word: &Word) -> Salt {
    Salt::from_be_bytes(*word)
}

/// `play(uint8 move)`
pub fn play(mv: Move) -> Result<CallData, CodecError> {
    Ok(CallData {
        function: Function::Play,
        args: vec![move_word(mv)?],
    })
}

/// `solve(uint8 move, uint256 salt)`
pub fn solve(mv: Move, salt: &Salt) -> Result<CallData, CodecError> {
    Ok(CallData {
        function: Function::Solve,
        args: vec![move_word(mv)?, salt_word(salt)],
    })
}

/// `j1Timeout()` / `j2Timeout()`
pub fn timeout(stalled: Role) -> CallData {
    CallData {
        function: Function::timeout_for(stalled),
        args: Vec::new(),
    }
}
