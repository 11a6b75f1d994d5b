//! Symmetric side of a message: session keys and OpenPGP CFB.
//!
//! OpenPGP's CFB runs with an all-zero IV and is fed in arbitrary pieces as
//! the stream is written, so the buffered CFB modes of `cfb-mode` are used
//! directly over the `aes` block ciphers.

use aes::{Aes128, Aes192, Aes256};
use cfb_mode::cipher::KeyIvInit;
use cfb_mode::{BufDecryptor, BufEncryptor};
use pgp::crypto::sym::SymmetricKeyAlgorithm;
use rand::{rngs::OsRng, RngCore};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::{CoreError, Result};

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

const ZERO_IV: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

/// Symmetric algorithms this crate encrypts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SymmetricAlgorithm {
    /// AES-128 (7).
    Aes128,
    /// AES-192 (8).
    Aes192,
    /// AES-256 (9).
    #[default]
    Aes256,
}

impl SymmetricAlgorithm {
    /// The wire identifier.
    pub fn id(self) -> u8 {
        match self {
            Self::Aes128 => 7,
            Self::Aes192 => 8,
            Self::Aes256 => 9,
        }
    }

    /// Look up a wire identifier.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            7 => Some(Self::Aes128),
            8 => Some(Self::Aes192),
            9 => Some(Self::Aes256),
            _ => None,
        }
    }

    /// Key size in bytes.
    pub fn key_size(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }

    /// The matching rPGP identifier.
    pub fn to_pgp(self) -> SymmetricKeyAlgorithm {
        match self {
            Self::Aes128 => SymmetricKeyAlgorithm::AES128,
            Self::Aes192 => SymmetricKeyAlgorithm::AES192,
            Self::Aes256 => SymmetricKeyAlgorithm::AES256,
        }
    }
}

/// Fill a fresh buffer from the OS random source.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| CoreError::CipherInit(format!("random source unavailable: {}", e)))?;
    Ok(buf)
}

/// A per-message symmetric key. Zeroized on drop.
pub struct SessionKey {
    algorithm: SymmetricAlgorithm,
    key: Zeroizing<Vec<u8>>,
}

impl SessionKey {
    /// Generate a random key for `algorithm`.
    pub fn generate(algorithm: SymmetricAlgorithm) -> Result<Self> {
        Ok(Self {
            algorithm,
            key: Zeroizing::new(random_bytes(algorithm.key_size())?),
        })
    }

    /// Wrap existing key bytes, checking the length.
    pub fn from_bytes(algorithm: SymmetricAlgorithm, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != algorithm.key_size() {
            return Err(CoreError::CipherInit(format!(
                "session key of {} bytes does not fit {:?}",
                bytes.len(),
                algorithm
            )));
        }
        Ok(Self {
            algorithm,
            key: Zeroizing::new(bytes.to_vec()),
        })
    }

    /// The algorithm this key is for.
    pub fn algorithm(&self) -> SymmetricAlgorithm {
        self.algorithm
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    /// Two-octet checksum: the sum of the key octets modulo 65536.
    pub fn checksum(&self) -> u16 {
        self.key
            .iter()
            .fold(0u16, |sum, &b| sum.wrapping_add(b as u16))
    }

    /// Start a CFB stream keyed with this session key.
    pub fn encryptor(&self) -> Result<CfbEncryptor> {
        CfbEncryptor::new(self.algorithm, &self.key)
    }

    /// Start the inverse CFB stream.
    pub fn decryptor(&self) -> Result<CfbDecryptor> {
        CfbDecryptor::new(self.algorithm, &self.key)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("algorithm", &self.algorithm)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

fn bad_key(algorithm: SymmetricAlgorithm, len: usize) -> CoreError {
    CoreError::CipherInit(format!("invalid key length {} for {:?}", len, algorithm))
}

/// OpenPGP CFB encryption with a zero IV, fed in arbitrary pieces.
pub enum CfbEncryptor {
    Aes128(BufEncryptor<Aes128>),
    Aes192(BufEncryptor<Aes192>),
    Aes256(BufEncryptor<Aes256>),
}

impl CfbEncryptor {
    /// Key a stream. Fails with `CipherInit` on a wrong key length.
    pub fn new(algorithm: SymmetricAlgorithm, key: &[u8]) -> Result<Self> {
        let err = |_| bad_key(algorithm, key.len());
        Ok(match algorithm {
            SymmetricAlgorithm::Aes128 => {
                Self::Aes128(BufEncryptor::new_from_slices(key, &ZERO_IV).map_err(err)?)
            }
            SymmetricAlgorithm::Aes192 => {
                Self::Aes192(BufEncryptor::new_from_slices(key, &ZERO_IV).map_err(err)?)
            }
            SymmetricAlgorithm::Aes256 => {
                Self::Aes256(BufEncryptor::new_from_slices(key, &ZERO_IV).map_err(err)?)
            }
        })
    }

    /// Encrypt `data` in place.
    pub fn encrypt(&mut self, data: &mut [u8]) {
        match self {
            Self::Aes128(c) => c.encrypt(data),
            Self::Aes192(c) => c.encrypt(data),
            Self::Aes256(c) => c.encrypt(data),
        }
    }
}

impl fmt::Debug for CfbEncryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Aes128(_) => "Aes128",
            Self::Aes192(_) => "Aes192",
            Self::Aes256(_) => "Aes256",
        };
        write!(f, "CfbEncryptor({})", name)
    }
}

/// Inverse of [`CfbEncryptor`].
pub enum CfbDecryptor {
    Aes128(BufDecryptor<Aes128>),
    Aes192(BufDecryptor<Aes192>),
    Aes256(BufDecryptor<Aes256>),
}

impl CfbDecryptor {
    /// Key a stream. Fails with `CipherInit` on a wrong key length.
    pub fn new(algorithm: SymmetricAlgorithm, key: &[u8]) -> Result<Self> {
        let err = |_| bad_key(algorithm, key.len());
        Ok(match algorithm {
            SymmetricAlgorithm::Aes128 => {
                Self::Aes128(BufDecryptor::new_from_slices(key, &ZERO_IV).map_err(err)?)
            }
            SymmetricAlgorithm::Aes192 => {
                Self::Aes192(BufDecryptor::new_from_slices(key, &ZERO_IV).map_err(err)?)
            }
            SymmetricAlgorithm::Aes256 => {
                Self::Aes256(BufDecryptor::new_from_slices(key, &ZERO_IV).map_err(err)?)
            }
        })
    }

    /// Decrypt `data` in place.
    pub fn decrypt(&mut self, data: &mut [u8]) {
        match self {
            Self::Aes128(c) => c.decrypt(data),
            Self::Aes192(c) => c.decrypt(data),
            Self::Aes256(c) => c.decrypt(data),
        }
    }
}

impl fmt::Debug for CfbDecryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Aes128(_) => "Aes128",
            Self::Aes192(_) => "Aes192",
            Self::Aes256(_) => "Aes256",
        };
        write!(f, "CfbDecryptor({})", name)
    }
}
