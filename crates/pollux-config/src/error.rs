//! Configuration error types

use pollux_types::ParamsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid model checking parameters: {0}")]
    Params(#[from] ParamsError),

    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}
