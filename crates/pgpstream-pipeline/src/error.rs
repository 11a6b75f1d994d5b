//! Error types for the streaming pipeline.

use pgpstream_core::CoreError;
use thiserror::Error;

/// Errors that can occur while opening, feeding or closing a stage chain.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Key, cipher or wrapping failure from the core crate.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The output sink failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation not allowed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Chain options out of range.
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl PipelineError {
    /// Whether this is a cipher setup failure (session key, cipher or wrapping).
    pub fn is_cipher_init(&self) -> bool {
        matches!(self, Self::Core(CoreError::CipherInit(_)))
    }

    /// Whether the output sink failed.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Core(CoreError::Io(_)))
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
