//! Error types for qdq-restrict

use thiserror::Error;

use crate::config::ValidationError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Bit width cannot be None")]
    MissingBitWidth,

    #[error("Only 8b bit width supported, got {0}")]
    UnsupportedBitWidth(u32),

    #[error("Caching of outputs is required to export {0}")]
    CachingRequired(String),

    #[error("Missing {0} scale")]
    MissingScale(&'static str),

    #[error("{0} is not implemented for this handler")]
    NotImplemented(&'static str),

    #[error("Handler used before prepare_for_symbolic_execution")]
    NotPrepared,

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;
