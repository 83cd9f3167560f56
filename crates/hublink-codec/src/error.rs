/// Errors that can occur while packing or unpacking arguments.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A format token is not a recognized type letter / repeat count.
    #[error("invalid format token {token:?}")]
    InvalidToken { token: String },

    /// The number of values does not match the number of format tokens.
    #[error("format expects {expected} values, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    /// A value's type does not match its format token.
    #[error("value at position {index} does not match token (expected {expected})")]
    TypeMismatch {
        expected: &'static str,
        index: usize,
    },

    /// A counted token's list value has the wrong number of elements.
    #[error("counted token expects {expected} elements, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    /// A char value is outside the single-byte Latin-1 range.
    #[error("char {value:?} is outside the Latin-1 range")]
    CharOutOfRange { value: char },

    /// The payload ended before the format was fully consumed.
    #[error("payload exhausted (needed {needed} more bytes, {remaining} left)")]
    ShortBuffer { needed: usize, remaining: usize },
}

pub type Result<T> = std::result::Result<T, CodecError>;
