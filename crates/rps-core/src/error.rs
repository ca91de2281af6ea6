use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("move must be one of rock, paper, scissors, spock or lizard")]
    InvalidMove,
    #[error("invalid move encoding: {0}")]
    InvalidEncoding(u8),
    #[error("argument word does not fit in a uint8")]
    WordOverflow,
    #[error("{function} is missing argument {index}")]
    MissingArgument { function: &'static str, index: usize },
    #[error("malformed address {0:?}: expected 0x followed by 40 hex digits")]
    MalformedAddress(String),
}
