//! Worker error types.

use pollux_wire::WireError;
use thiserror::Error;

/// Result type for worker operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in a sampling worker.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to reach the coordinator.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// Wire protocol error.
    #[error("wire protocol error: {0}")]
    Wire(#[from] WireError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The coordinator closed the connection before registering the worker.
    #[error("connection closed")]
    ConnectionClosed,

    /// The coordinator sent a record out of protocol order.
    #[error("unexpected record: {0}")]
    UnexpectedRecord(String),
}
