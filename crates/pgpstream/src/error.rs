//! Error types for the encoder.

use pgpstream_core::CoreError;
use pgpstream_pipeline::PipelineError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while configuring or running an encoder.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// The configuration is missing a field or has one out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The key ring could not be read, parsed, or has no usable key.
    #[error("key ring {}: {source}", .path.display())]
    KeyRing {
        path: PathBuf,
        #[source]
        source: CoreError,
    },

    /// Core error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Pipeline error.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Host output failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl EncoderError {
    /// Whether no key in the ring matched the configured name.
    pub fn is_key_not_found(&self) -> bool {
        matches!(
            self,
            Self::KeyRing {
                source: CoreError::KeyNotFound { .. },
                ..
            } | Self::Core(CoreError::KeyNotFound { .. })
        )
    }

    /// Whether the key ring itself is malformed.
    pub fn is_key_ring_parse(&self) -> bool {
        matches!(
            self,
            Self::KeyRing {
                source: CoreError::KeyRingParse(_),
                ..
            } | Self::Core(CoreError::KeyRingParse(_))
        )
    }

    /// Whether a session key or cipher could not be set up.
    pub fn is_cipher_init(&self) -> bool {
        match self {
            Self::Core(CoreError::CipherInit(_)) => true,
            Self::Pipeline(e) => e.is_cipher_init(),
            _ => false,
        }
    }
}

/// Result type for encoder operations.
pub type Result<T> = std::result::Result<T, EncoderError>;
