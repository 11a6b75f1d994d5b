//! # pgpstream Core
//!
//! OpenPGP primitives for pgpstream: packet framing, public keys, key rings
//! and session-key wrapping.
//!
//! Parsing, armor and public-key encryption come from rPGP (`pgp`); this crate
//! narrows them to what an encrypting writer needs. It holds no streaming
//! state and performs no logging. The streaming stages that build on it live
//! in `pgpstream-pipeline`.
//!
//! ## Key Types
//!
//! - [`PublicKey`] - A parsed public key or subkey
//! - [`KeyRingCollection`] - Ordered key rings parsed from binary or armored input
//! - [`SessionKey`] - A random symmetric key, zeroized on drop
//! - [`EncryptedSessionKey`] - A session key wrapped for one recipient
//!
//! ## Key Selection
//!
//! ```rust,no_run
//! use pgpstream_core::KeyRingCollection;
//!
//! let bytes = std::fs::read("pubring.gpg").unwrap();
//! let rings = KeyRingCollection::from_bytes(&bytes).unwrap();
//! let key = rings.select("alice@example.com").unwrap();
//! println!("encrypting to {}", key.fingerprint());
//! ```

pub mod crypto;
pub mod error;
pub mod key;
pub mod keyring;
pub mod packet;
pub mod wrap;

pub use crypto::{CfbDecryptor, CfbEncryptor, SessionKey, SymmetricAlgorithm};
pub use error::{CoreError, Result};
pub use key::{Fingerprint, KeyId, PublicKey, PublicKeyAlgorithm};
pub use keyring::{select_encryption_key, KeyRing, KeyRingCollection};
pub use packet::{PacketParser, Tag};
pub use wrap::{encrypt_session_key, EncryptedSessionKey};
