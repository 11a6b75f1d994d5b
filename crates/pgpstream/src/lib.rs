//! # pgpstream
//!
//! Streaming OpenPGP encryption for output files: each file a host writes is
//! encrypted to a single recipient from a public key ring.
//!
//! ## Overview
//!
//! - **Configuration**: [`EncoderConfig`], read from JSON
//! - **Key resolution**: the recipient is selected once per [`Encoder`]
//! - **Adapter**: [`EncryptingFileOutput`] turns every host file into one
//!   encrypted message (PKESK, then SEIPD around compressed literal data)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pgpstream::{DirectoryFileOutput, Encoder, EncoderConfig};
//! use std::io::Write;
//!
//! let config = EncoderConfig::from_json(
//!     r#"{"public_key_ring": "pubring.asc", "key_name": "ops@example.com"}"#,
//! )
//! .unwrap();
//! let encoder = Encoder::new(config).unwrap();
//!
//! let mut output = encoder.open(DirectoryFileOutput::new("out", "part-", ".gpg"));
//! output.open_next().unwrap().write_all(b"first file").unwrap();
//! output.open_next().unwrap().write_all(b"second file").unwrap();
//! output.finish().unwrap();
//! output.close().unwrap();
//! ```
//!
//! ## Re-exports
//!
//! - `pgpstream::core` - OpenPGP primitives and key rings
//! - `pgpstream::pipeline` - The stage chain and sessions

pub mod adapter;
pub mod config;
pub mod error;
pub mod resolver;

pub use pgpstream_core as core;
pub use pgpstream_pipeline as pipeline;

pub use adapter::{DirectoryFileOutput, Encoder, EncryptingFileOutput, FileOutput};
pub use config::EncoderConfig;
pub use error::{EncoderError, Result};
pub use resolver::resolve_key;

pub use pgpstream_core::{Fingerprint, KeyId, PublicKey};
pub use pgpstream_pipeline::{
    encrypt_to_vec, ChainOptions, CompressionAlgorithm, EncryptionSession, PayloadSink,
    SessionState,
};
