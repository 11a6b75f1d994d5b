//! Encoder configuration.
//!
//! ```json
//! {
//!   "public_key_ring": "/etc/keys/pubring.gpg",
//!   "key_name": "ops@example.com",
//!   "file_name": "result",
//!   "compression": "zip",
//!   "compression_level": 6,
//!   "chunk_size": 4096
//! }
//! ```
//!
//! Only `public_key_ring` is required.

use pgpstream_pipeline::{ChainOptions, CompressionAlgorithm, DEFAULT_CHUNK_SIZE, DEFAULT_LABEL};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{EncoderError, Result};

fn default_file_name() -> String {
    DEFAULT_LABEL.to_string()
}

fn default_compression() -> String {
    CompressionAlgorithm::default().name().to_string()
}

fn default_compression_level() -> u32 {
    pgpstream_pipeline::compress::DEFAULT_COMPRESSION_LEVEL
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

/// Configuration for an [`Encoder`](crate::Encoder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Path of the public key ring, binary or armored.
    pub public_key_ring: PathBuf,
    /// Substring of the recipient's first identity; empty takes the first
    /// encryption key in the ring.
    #[serde(default)]
    pub key_name: String,
    /// Name stored in the literal packet.
    #[serde(default = "default_file_name")]
    pub file_name: String,
    /// `"uncompressed"`, `"zip"` or `"zlib"`.
    #[serde(default = "default_compression")]
    pub compression: String,
    /// Deflate level, 0-9.
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
    /// Partial body chunk size: a power of two, at least 512.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            public_key_ring: PathBuf::new(),
            key_name: String::new(),
            file_name: default_file_name(),
            compression: default_compression(),
            compression_level: default_compression_level(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl EncoderConfig {
    /// Defaults with the given key ring path.
    pub fn new(public_key_ring: impl Into<PathBuf>) -> Self {
        Self {
            public_key_ring: public_key_ring.into(),
            ..Self::default()
        }
    }

    /// Set the recipient filter.
    pub fn with_key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = key_name.into();
        self
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EncoderError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field.
    pub fn validate(&self) -> Result<()> {
        if self.public_key_ring.as_os_str().is_empty() {
            return Err(EncoderError::Config(
                "public_key_ring must not be empty".into(),
            ));
        }
        self.chain_options()?;
        Ok(())
    }

    /// The chain options these settings describe.
    pub fn chain_options(&self) -> Result<ChainOptions> {
        let compression: CompressionAlgorithm = self
            .compression
            .parse()
            .map_err(|e: pgpstream_pipeline::PipelineError| EncoderError::Config(e.to_string()))?;
        let options = ChainOptions {
            compression,
            compression_level: self.compression_level,
            chunk_size: self.chunk_size,
            modification_time: None,
        };
        options
            .validate()
            .map_err(|e| EncoderError::Config(e.to_string()))?;
        Ok(options)
    }
}
