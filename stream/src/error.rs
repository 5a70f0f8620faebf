use std::io;

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, self::Error>;

/// How a failure of a stream is classified. Chosen by whoever opens the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ErrorKind {
    ParseError,
    Fail,
    StreamError,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Side {
    Input,
    Output,
    Judge,
}

#[derive(Debug, thiserror::Error)]
pub enum Cause {
    #[error("no line found")]
    NoLine,

    #[error("no token found")]
    NoToken,

    #[error("expected {expected}, found {found}")]
    NoChar { expected: String, found: String },

    #[error("token length {len} not in {allowed}")]
    TokenLength { len: usize, allowed: String },

    #[error("extra characters found at the end")]
    ExtraChars,

    #[error("trailing line terminator not found")]
    MissingTerminator,

    #[error("invalid {what} literal {token:?}")]
    InvalidLiteral { what: &'static str, token: String },

    #[error("{value} not in range {allowed}")]
    OutOfRange { value: String, allowed: String },

    #[error("a checkpoint is already open")]
    CheckpointOpen,

    #[error("no checkpoint is open")]
    NoCheckpoint,

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("{side} line {line} col {col}: {cause}")]
pub struct Error {
    pub kind: ErrorKind,
    pub side: Side,
    pub line: usize,
    pub col: usize,
    /// Set when the read failed because the input ran out.
    pub exhausted: bool,
    #[source]
    pub cause: Cause,
}

impl Error {
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// True when nothing matched at the cursor; the stream is left untouched.
    pub fn is_no_match(&self) -> bool {
        matches!(
            self.cause,
            Cause::NoLine | Cause::NoToken | Cause::NoChar { .. }
        )
    }
}
