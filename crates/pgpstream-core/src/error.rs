//! Error types for the pgpstream core.

use thiserror::Error;

/// Errors that can occur while parsing keys or preparing encryption.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The key ring bytes are not a well-formed key ring encoding, armored or
    /// binary.
    #[error("malformed key ring: {0}")]
    KeyRingParse(String),

    /// No key satisfied the capability and identity filter.
    #[error("no encryption key matching {filter:?} found in key ring")]
    KeyNotFound { filter: String },

    /// The symmetric key or the cipher for the recipient could not be set up.
    #[error("cipher initialization failed: {0}")]
    CipherInit(String),

    /// A packet header or body is truncated or inconsistent.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// Underlying reader or writer failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
