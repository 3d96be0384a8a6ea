// model = "claude-opus-4-5"
// created = "2026-10-19"
// modified = "2026-10-19"
// driver = "Isaac Clayton"

//! Error types surfaced by the engine.

use std::sync::Arc;

use crate::crdt::store::GapError;
use crate::types::TypeKind;

/// Errors produced when decoding updates or state vectors.
///
/// Decoding never touches a document, so any of these means nothing was
/// applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEnd(usize),

    #[error("variable-length integer overflows at byte {0}")]
    VarIntOverflow(usize),

    #[error("invalid utf-8 in string at byte {0}")]
    InvalidUtf8(usize),

    #[error("unknown content tag {0}")]
    UnknownContentTag(u8),

    #[error("unknown value tag {0}")]
    UnknownValueTag(u8),

    #[error("block length {declared} does not match its content length {actual}")]
    LengthMismatch { declared: u32, actual: u32 },

    #[error("malformed block: {0}")]
    Malformed(&'static str),

    #[error("{0} trailing bytes after the payload")]
    TrailingBytes(usize),
}

/// Errors returned by document and transaction operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("index {index} out of bounds for length {len}")]
    InvalidIndex { index: u32, len: u32 },

    #[error("transaction has already been committed")]
    UseAfterCommit,

    #[error("root `{name}` is a {found:?}, not a {expected:?}")]
    TypeMismatch {
        name: Arc<str>,
        expected: TypeKind,
        found: TypeKind,
    },

    /// A local append found the store out of step with its own clock.
    #[error(transparent)]
    Gap(#[from] GapError),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
