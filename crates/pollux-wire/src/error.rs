//! Wire protocol error types.

use thiserror::Error;

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors that can occur while decoding records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// The tag byte names no known record.
    #[error("unknown record tag: {0:#04x}")]
    UnknownTag(u8),

    /// A known record arrived on the wrong side of the connection.
    #[error("unexpected {tag} record, expected {expected}")]
    UnexpectedRecord {
        tag: &'static str,
        expected: &'static str,
    },
}
