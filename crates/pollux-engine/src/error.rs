//! Engine error types.

use pollux_types::ParamsError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised when setting up a verification run.
///
/// Once a run has started nothing fails: testers only take longer near the
/// threshold, and truncated paths count as unsatisfied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Invalid model checking parameters.
    #[error("invalid parameters: {0}")]
    Params(#[from] ParamsError),

    /// Interval estimation needs a positive half-width.
    #[error("estimation needs a positive delta, got {0}")]
    EstimationWithoutDelta(f64),
}
