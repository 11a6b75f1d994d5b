//! # pgpstream Testkit
//!
//! Testing utilities for pgpstream.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: Key pairs of every supported algorithm, generated with rPGP, and a key ring builder
//! - **Reader**: A reference decryptor that checks every layer of a message
//! - **Sinks**: Failing and shared sinks, and a recording stage observer
//! - **Golden vectors**: Exact bytes of the deterministic framing layers
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Round Trips
//!
//! ```rust
//! use pgpstream_pipeline::encrypt_to_vec;
//! use pgpstream_testkit::fixtures::{seed, KeyFixture, DEFAULT_CREATED};
//! use pgpstream_testkit::reader::decrypt;
//!
//! let key = KeyFixture::x25519(seed(1), DEFAULT_CREATED);
//! let message = encrypt_to_vec(&key.public_key(), "report.csv", b"a,b\n").unwrap();
//! assert_eq!(decrypt(&message, &key).unwrap().data, b"a,b\n");
//! ```
//!
//! ## Golden Vectors
//!
//! ```rust
//! use pgpstream_testkit::vectors::verify_all_vectors;
//!
//! for (name, passed, msg) in verify_all_vectors() {
//!     assert!(passed, "{}: {}", name, msg);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use pgpstream_testkit::generators::{chain_options, payload};
//!
//! proptest! {
//!     #[test]
//!     fn round_trips(data in payload(4096), options in chain_options()) {
//!         // encrypt with `options`, decrypt, compare
//!     }
//! }
//! ```
//!
//! ## Key Rings
//!
//! ```rust
//! use pgpstream_testkit::fixtures::{seed, KeyFixture, KeyRingBuilder, DEFAULT_CREATED};
//!
//! let primary = KeyFixture::ed25519(seed(1), DEFAULT_CREATED);
//! let sub = KeyFixture::x25519(seed(2), DEFAULT_CREATED);
//! let ring = KeyRingBuilder::new()
//!     .primary(&primary)
//!     .user_id("Alice <alice@example.com>")
//!     .signature()
//!     .subkey(&sub)
//!     .signature()
//!     .build_armored();
//! ```

pub mod fixtures;
pub mod generators;
pub mod reader;
pub mod sinks;
pub mod vectors;

pub use fixtures::{
    armor_public_keys, seed, single_key_ring, KeyFixture, KeyRingBuilder, Secret, DEFAULT_CREATED,
};
pub use reader::{decrypt, DecryptedMessage};
pub use sinks::{FailingSink, RecordingObserver, SharedSink, StageEvent};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
