//! # pgpstream Pipeline
//!
//! Streaming OpenPGP encryption as a chain of stages:
//!
//! ```text
//! payload -> LiteralFramer -> Compressor -> SymmetricEncryptor -> sink
//!                                        KeyWrapper (at open) ----^
//! ```
//!
//! Stages open in the order KeyWrapper, SymmetricEncryptor, Compressor,
//! LiteralFramer and close in exact reverse. The sink is never closed by the
//! chain; whoever supplied it owns it.
//!
//! ## Key Types
//!
//! - [`StageChain`] - The layered pipeline over a sink
//! - [`EncryptionSession`] - One message: start, write, close
//! - [`PayloadSink`] - Where plaintext is written
//! - [`StageObserver`] - Hook for stage open/close events
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pgpstream_core::select_encryption_key;
//! use pgpstream_pipeline::EncryptionSession;
//! use std::io::Write;
//!
//! let ring = std::fs::File::open("pubring.gpg").unwrap();
//! let recipient = select_encryption_key(ring, "alice@example.com").unwrap();
//!
//! let out = std::fs::File::create("message.gpg").unwrap();
//! let mut session = EncryptionSession::new(out);
//! session.start(&recipient).unwrap().write_all(b"hello").unwrap();
//! session.finish().unwrap();
//! ```

pub mod chain;
pub mod compress;
pub mod encrypt;
pub mod error;
pub mod framing;
pub mod keywrap;
pub mod literal;
pub mod observer;
pub mod session;
pub mod stage;

pub use chain::{ChainOptions, ChainState, StageChain};
pub use compress::{CompressionAlgorithm, Compressor};
pub use encrypt::SymmetricEncryptor;
pub use error::{PipelineError, Result};
pub use framing::{PartialBodyWriter, DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE};
pub use keywrap::KeyWrapper;
pub use literal::LiteralFramer;
pub use observer::{NoopObserver, StageObserver};
pub use session::{encrypt_to_vec, EncryptionSession, PayloadSink, SessionState, DEFAULT_LABEL};
pub use stage::{Stage, StageKind};
