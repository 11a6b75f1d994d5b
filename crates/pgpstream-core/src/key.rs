//! Public keys: identity, fingerprints and capability.
//!
//! Key packets are decoded by rPGP. This module adds what the encryptor needs
//! on top of them: whether a session key can be wrapped for the key, the
//! identities bound to a primary key, and fingerprints printed the way key
//! tooling prints them.

use chrono::{DateTime, Utc};
use pgp::crypto::ecc_curve::ECCCurve;
use pgp::crypto::hash::HashAlgorithm;
use pgp::crypto::sym::SymmetricKeyAlgorithm;
use pgp::packet::{PublicKey as PrimaryKeyPacket, PublicSubkey as SubkeyPacket};
use pgp::types::{
    EcdhPublicParams, EskType, KeyVersion, PkeskBytes, PublicKeyTrait, PublicParams,
    SignatureBytes, Version,
};
use rand::{CryptoRng, Rng};
use std::{fmt, io};

use crate::error::{CoreError, Result};

pub use pgp::crypto::public_key::PublicKeyAlgorithm;

/// Key packet version written by current tooling.
pub const KEY_VERSION: u8 = 4;

/// A key fingerprint; 20 bytes for v4 keys.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(pgp::types::Fingerprint);

impl Fingerprint {
    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Upper-case hex, the way key tooling prints fingerprints.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0.as_bytes())
    }
}

impl From<pgp::types::Fingerprint> for Fingerprint {
    fn from(fingerprint: pgp::types::Fingerprint) -> Self {
        Self(fingerprint)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A 64-bit key ID.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId([u8; 8]);

impl KeyId {
    /// Wrap raw key ID bytes.
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Upper-case hex.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl From<&pgp::types::KeyId> for KeyId {
    fn from(id: &pgp::types::KeyId) -> Self {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(id.as_ref());
        Self(bytes)
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", self.to_hex())
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

macro_rules! with_packet {
    ($key:expr, $packet:ident => $body:expr) => {
        match &$key.packet {
            KeyPacket::Primary($packet) => $body,
            KeyPacket::Subkey($packet) => $body,
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyPacket {
    Primary(PrimaryKeyPacket),
    Subkey(SubkeyPacket),
}

/// A public key or subkey taken from a key ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    packet: KeyPacket,
    user_ids: Vec<String>,
}

impl PublicKey {
    /// Parse a public key or public subkey packet body.
    pub fn parse(body: &[u8], is_subkey: bool) -> Result<Self> {
        let packet = if is_subkey {
            SubkeyPacket::from_slice(Version::New, body).map(KeyPacket::Subkey)
        } else {
            PrimaryKeyPacket::from_slice(Version::New, body).map(KeyPacket::Primary)
        };
        packet
            .map(Self::with_packet)
            .map_err(|e| CoreError::KeyRingParse(format!("bad key packet: {}", e)))
    }

    /// Wrap a primary key packet rPGP has already parsed or generated.
    pub fn from_primary(packet: PrimaryKeyPacket) -> Self {
        Self::with_packet(KeyPacket::Primary(packet))
    }

    /// Wrap a subkey packet.
    pub fn from_subkey(packet: SubkeyPacket) -> Self {
        Self::with_packet(KeyPacket::Subkey(packet))
    }

    fn with_packet(packet: KeyPacket) -> Self {
        Self {
            packet,
            user_ids: Vec::new(),
        }
    }

    /// Key packet version.
    pub fn version(&self) -> u8 {
        let version = with_packet!(self, key => key.version());
        version.into()
    }

    /// Creation time, seconds since the Unix epoch.
    pub fn created(&self) -> u32 {
        let created = with_packet!(self, key => key.created_at().timestamp());
        u32::try_from(created).unwrap_or(0)
    }

    /// The public key algorithm.
    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        with_packet!(self, key => key.algorithm())
    }

    /// The algorithm-specific public parameters.
    pub fn params(&self) -> &PublicParams {
        with_packet!(self, key => key.public_params())
    }

    /// The key fingerprint.
    pub fn fingerprint(&self) -> Fingerprint {
        let fingerprint = with_packet!(self, key => key.fingerprint());
        Fingerprint(fingerprint)
    }

    /// The key ID.
    pub fn key_id(&self) -> KeyId {
        let id = with_packet!(self, key => key.key_id());
        KeyId::from(&id)
    }

    /// Identities bound to this key, in stored order. Subkeys have none.
    pub fn user_ids(&self) -> &[String] {
        &self.user_ids
    }

    /// The first bound identity, if any.
    pub fn first_user_id(&self) -> Option<&str> {
        self.user_ids.first().map(String::as_str)
    }

    /// Whether this is a subkey.
    pub fn is_subkey(&self) -> bool {
        matches!(self.packet, KeyPacket::Subkey(_))
    }

    /// Whether a session key can be wrapped for this key in a v3 PKESK.
    ///
    /// Version 6 keys are never selected: they require v6 session key packets.
    pub fn is_encryption_key(&self) -> bool {
        let version_ok = matches!(
            with_packet!(self, key => key.version()),
            KeyVersion::V2 | KeyVersion::V3 | KeyVersion::V4
        );
        version_ok && can_wrap(self.algorithm(), self.params())
    }

    pub(crate) fn push_user_id(&mut self, user_id: String) {
        self.user_ids.push(user_id);
    }
}

// Lets rPGP wrap session keys for a selected key directly.
impl PublicKeyTrait for PublicKey {
    fn version(&self) -> KeyVersion {
        with_packet!(self, key => key.version())
    }

    fn fingerprint(&self) -> pgp::types::Fingerprint {
        with_packet!(self, key => key.fingerprint())
    }

    fn key_id(&self) -> pgp::types::KeyId {
        with_packet!(self, key => key.key_id())
    }

    fn algorithm(&self) -> PublicKeyAlgorithm {
        with_packet!(self, key => key.algorithm())
    }

    fn created_at(&self) -> &DateTime<Utc> {
        with_packet!(self, key => key.created_at())
    }

    fn expiration(&self) -> Option<u16> {
        with_packet!(self, key => key.expiration())
    }

    fn verify_signature(
        &self,
        hash: HashAlgorithm,
        data: &[u8],
        sig: &SignatureBytes,
    ) -> pgp::errors::Result<()> {
        with_packet!(self, key => key.verify_signature(hash, data, sig))
    }

    fn encrypt<R: CryptoRng + Rng>(
        &self,
        rng: R,
        plain: &[u8],
        typ: EskType,
    ) -> pgp::errors::Result<PkeskBytes> {
        with_packet!(self, key => key.encrypt(rng, plain, typ))
    }

    fn serialize_for_hashing(&self, writer: &mut impl io::Write) -> pgp::errors::Result<()> {
        with_packet!(self, key => key.serialize_for_hashing(writer))
    }

    fn public_params(&self) -> &PublicParams {
        with_packet!(self, key => key.public_params())
    }
}

fn can_wrap(algorithm: PublicKeyAlgorithm, params: &PublicParams) -> bool {
    match params {
        PublicParams::RSA { .. } => matches!(
            algorithm,
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt
        ),
        // rPGP names the encrypt-only ElGamal identifier (16) `ElgamalSign`.
        PublicParams::Elgamal { .. } => matches!(
            algorithm,
            PublicKeyAlgorithm::ElgamalSign | PublicKeyAlgorithm::Elgamal
        ),
        PublicParams::ECDH(EcdhPublicParams::Known {
            curve,
            hash,
            alg_sym,
            ..
        }) => {
            matches!(
                curve,
                ECCCurve::Curve25519 | ECCCurve::P256 | ECCCurve::P384 | ECCCurve::P521
            ) && matches!(
                hash,
                HashAlgorithm::SHA2_256 | HashAlgorithm::SHA2_384 | HashAlgorithm::SHA2_512
            ) && matches!(
                alg_sym,
                SymmetricKeyAlgorithm::AES128
                    | SymmetricKeyAlgorithm::AES192
                    | SymmetricKeyAlgorithm::AES256
            )
        }
        PublicParams::X25519 { .. } | PublicParams::X448 { .. } => true,
        _ => false,
    }
}
