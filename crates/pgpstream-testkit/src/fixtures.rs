//! Key fixtures and key ring construction.
//!
//! Key material comes from rPGP's key generation, driven by a seeded RNG so
//! that a seed and a creation time always give the same key. Every fixture
//! keeps its secret half so the reference decryptor can open what the
//! pipeline produced.

use chrono::{DateTime, Utc};
use num_bigint_dig::{BigUint, RandBigInt, RandPrime};
use pgp::armor::{self, BlockType};
use pgp::crypto::ecc_curve::ECCCurve;
use pgp::packet::{PublicKey as KeyPacket, SecretKey};
use pgp::ser::Serialize;
use pgp::types::{KeyVersion, PublicParams, SecretParams, Version};
use pgp::KeyType;
use pgpstream_core::packet::{write_header, Tag};
use pgpstream_core::{Fingerprint, KeyId, PublicKey, PublicKeyAlgorithm};
use rand::rngs::{OsRng, StdRng};
use rand::SeedableRng;
use std::fmt;
use std::sync::OnceLock;

/// Creation time stamped on fixtures that do not pick one.
pub const DEFAULT_CREATED: u32 = 1_700_000_000;

/// Bits of the shared ElGamal prime.
pub const ELGAMAL_BITS: usize = 1024;

/// A v4 signature packet body that parses but verifies nothing.
pub const PLACEHOLDER_SIGNATURE: &[u8] = &[4, 0x13, 1, 8, 0, 0, 0, 0, 0xab, 0xcd, 0, 1, 1];

/// The secret half of a fixture.
#[derive(Clone)]
pub enum Secret {
    /// An rPGP secret key packet: RSA, ECDH, X25519 or Ed25519.
    Key(SecretKey),
    /// ElGamal private exponent with its prime.
    Elgamal {
        /// The prime modulus.
        p: BigUint,
        /// The private exponent.
        x: BigUint,
    },
}

/// A key pair.
#[derive(Clone)]
pub struct KeyFixture {
    packet: KeyPacket,
    secret: Secret,
}

fn created_at(created: u32) -> DateTime<Utc> {
    DateTime::from_timestamp(i64::from(created), 0).expect("u32 timestamps are in range")
}

fn shared_rsa_params() -> &'static (PublicParams, SecretParams) {
    static PARAMS: OnceLock<(PublicParams, SecretParams)> = OnceLock::new();
    PARAMS.get_or_init(|| {
        KeyType::Rsa(2048)
            .generate(OsRng)
            .expect("RSA key generation")
    })
}

fn shared_elgamal_group() -> &'static (BigUint, BigUint) {
    static GROUP: OnceLock<(BigUint, BigUint)> = OnceLock::new();
    GROUP.get_or_init(|| (OsRng.gen_prime(ELGAMAL_BITS), BigUint::from(2u32)))
}

impl KeyFixture {
    fn from_params(
        algorithm: PublicKeyAlgorithm,
        created: u32,
        params: PublicParams,
        secret_params: SecretParams,
    ) -> Self {
        let packet = KeyPacket::new(
            Version::New,
            KeyVersion::V4,
            algorithm,
            created_at(created),
            None,
            params,
        )
        .expect("fixture key packet");
        Self {
            secret: Secret::Key(SecretKey::new(packet.clone(), secret_params)),
            packet,
        }
    }

    fn generated(key_type: KeyType, algorithm: PublicKeyAlgorithm, seed: [u8; 32], created: u32) -> Self {
        let (params, secret_params) = key_type
            .generate(StdRng::from_seed(seed))
            .expect("fixture key generation");
        Self::from_params(algorithm, created, params, secret_params)
    }

    /// RSA 2048 (algorithm 1). The key material is generated once per process
    /// and shared; `created` makes the fingerprint distinct.
    pub fn rsa(created: u32) -> Self {
        let (params, secret_params) = shared_rsa_params().clone();
        Self::from_params(PublicKeyAlgorithm::RSA, created, params, secret_params)
    }

    /// RSA with freshly generated material of `bits` bits.
    pub fn rsa_fresh(bits: u32, created: u32) -> Self {
        let (params, secret_params) = KeyType::Rsa(bits)
            .generate(OsRng)
            .expect("RSA key generation");
        Self::from_params(PublicKeyAlgorithm::RSA, created, params, secret_params)
    }

    /// Legacy ECDH over Curve25519 (algorithm 18).
    pub fn cv25519(seed: [u8; 32], created: u32) -> Self {
        Self::generated(
            KeyType::ECDH(ECCCurve::Curve25519),
            PublicKeyAlgorithm::ECDH,
            seed,
            created,
        )
    }

    /// ECDH over NIST P-256 (algorithm 18).
    pub fn nist_p256(seed: [u8; 32], created: u32) -> Self {
        Self::generated(
            KeyType::ECDH(ECCCurve::P256),
            PublicKeyAlgorithm::ECDH,
            seed,
            created,
        )
    }

    /// ECDH over NIST P-384 (algorithm 18).
    pub fn nist_p384(seed: [u8; 32], created: u32) -> Self {
        Self::generated(
            KeyType::ECDH(ECCCurve::P384),
            PublicKeyAlgorithm::ECDH,
            seed,
            created,
        )
    }

    /// Native X25519 (algorithm 25).
    pub fn x25519(seed: [u8; 32], created: u32) -> Self {
        Self::generated(KeyType::X25519, PublicKeyAlgorithm::X25519, seed, created)
    }

    /// Ed25519 (algorithm 27): signing only, never selected for encryption.
    pub fn ed25519(seed: [u8; 32], created: u32) -> Self {
        Self::generated(KeyType::Ed25519, PublicKeyAlgorithm::Ed25519, seed, created)
    }

    /// ElGamal (algorithm 16) over a prime shared by the whole process.
    pub fn elgamal(seed: [u8; 32], created: u32) -> Self {
        let (p, g) = shared_elgamal_group();
        let x = StdRng::from_seed(seed).gen_biguint_range(&BigUint::from(2u32), p);
        let y = g.modpow(&x, p);
        let packet = KeyPacket::new(
            Version::New,
            KeyVersion::V4,
            PublicKeyAlgorithm::ElgamalSign,
            created_at(created),
            None,
            PublicParams::Elgamal {
                p: p.into(),
                g: g.into(),
                y: (&y).into(),
            },
        )
        .expect("fixture key packet");
        Self {
            packet,
            secret: Secret::Elgamal { p: p.clone(), x },
        }
    }

    /// The public key packet body.
    pub fn body(&self) -> Vec<u8> {
        self.packet.to_bytes().expect("fixture key serializes")
    }

    /// The rPGP public key packet.
    pub fn packet(&self) -> &KeyPacket {
        &self.packet
    }

    /// The secret half.
    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    /// The public half as a primary key without identities.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_primary(self.packet.clone())
    }

    /// The fingerprint.
    pub fn fingerprint(&self) -> Fingerprint {
        self.public_key().fingerprint()
    }

    /// The key ID.
    pub fn key_id(&self) -> KeyId {
        self.public_key().key_id()
    }
}

impl fmt::Debug for KeyFixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KeyFixture({:?} {})",
            self.public_key().algorithm(),
            self.fingerprint()
        )
    }
}

/// A seed with `i` in its second byte, for families of distinct keys.
pub fn seed(i: u8) -> [u8; 32] {
    let mut seed = [0x5eu8; 32];
    seed[1] = i;
    seed
}

/// Raw bytes handed to rPGP's armor writer.
struct Unframed<'a>(&'a [u8]);

impl Serialize for Unframed<'_> {
    fn to_writer<W: std::io::Write>(&self, writer: &mut W) -> pgp::errors::Result<()> {
        writer.write_all(self.0)?;
        Ok(())
    }
}

/// Armor `bytes` as a public key block.
pub fn armor_public_keys(bytes: &[u8]) -> String {
    let mut out = Vec::new();
    armor::write(&Unframed(bytes), BlockType::PublicKey, &mut out, None, true)
        .expect("armoring to a Vec");
    String::from_utf8(out).expect("armor is ASCII")
}

/// Builds key ring bytes packet by packet.
#[derive(Debug, Default, Clone)]
pub struct KeyRingBuilder {
    bytes: Vec<u8>,
}

impl KeyRingBuilder {
    /// Start an empty ring.
    pub fn new() -> Self {
        Self::default()
    }

    fn packet(mut self, tag: Tag, body: &[u8]) -> Self {
        write_header(&mut self.bytes, tag, body.len() as u32);
        self.bytes.extend_from_slice(body);
        self
    }

    /// Start a new ring with `key` as its primary key.
    pub fn primary(self, key: &KeyFixture) -> Self {
        self.packet(Tag::PublicKey, &key.body())
    }

    /// Primary key with an old-format (two-octet length) header, the way
    /// older tools export it.
    pub fn primary_old_format(mut self, key: &KeyFixture) -> Self {
        let body = key.body();
        self.bytes.push(0x80 | (u8::from(Tag::PublicKey) << 2) | 0x01);
        self.bytes.extend_from_slice(&(body.len() as u16).to_be_bytes());
        self.bytes.extend_from_slice(&body);
        self
    }

    /// Bind an identity to the current primary key.
    pub fn user_id(self, user_id: &str) -> Self {
        self.packet(Tag::UserId, user_id.as_bytes())
    }

    /// Append a subkey to the current ring.
    pub fn subkey(self, key: &KeyFixture) -> Self {
        self.packet(Tag::PublicSubkey, &key.body())
    }

    /// A placeholder signature packet; key rings carry these after every
    /// identity and subkey, and parsing skips them.
    pub fn signature(self) -> Self {
        self.packet(Tag::Signature, PLACEHOLDER_SIGNATURE)
    }

    /// A trust packet.
    pub fn trust(self) -> Self {
        self.packet(Tag::Trust, &[0x00, 0x00])
    }

    /// Any packet, for malformed-ring tests.
    pub fn raw(self, tag: Tag, body: &[u8]) -> Self {
        self.packet(tag, body)
    }

    /// The binary ring.
    pub fn build(self) -> Vec<u8> {
        self.bytes
    }

    /// The ring in ASCII armor.
    pub fn build_armored(self) -> String {
        armor_public_keys(&self.bytes)
    }
}

/// A single ring: `key` as primary with one identity and its signature.
pub fn single_key_ring(key: &KeyFixture, user_id: &str) -> Vec<u8> {
    KeyRingBuilder::new()
        .primary(key)
        .user_id(user_id)
        .signature()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgpstream_core::KeyRingCollection;

    #[test]
    fn test_fixture_keys_parse() {
        let keys = [
            (KeyFixture::cv25519(seed(1), DEFAULT_CREATED), PublicKeyAlgorithm::ECDH, true),
            (KeyFixture::nist_p256(seed(1), DEFAULT_CREATED), PublicKeyAlgorithm::ECDH, true),
            (KeyFixture::x25519(seed(2), DEFAULT_CREATED), PublicKeyAlgorithm::X25519, true),
            (KeyFixture::ed25519(seed(3), DEFAULT_CREATED), PublicKeyAlgorithm::Ed25519, false),
            (KeyFixture::elgamal(seed(4), DEFAULT_CREATED), PublicKeyAlgorithm::ElgamalSign, true),
        ];
        for (fixture, algorithm, encrypts) in keys {
            let key = PublicKey::parse(&fixture.body(), false).unwrap();
            assert_eq!(key.algorithm(), algorithm);
            assert_eq!(key.is_encryption_key(), encrypts);
            assert_eq!(key.fingerprint(), fixture.fingerprint());
        }
    }

    #[test]
    fn test_seeds_give_distinct_keys() {
        let keys: Vec<_> = (0..4)
            .map(|i| KeyFixture::x25519(seed(i), DEFAULT_CREATED).body())
            .collect();
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(
            KeyFixture::x25519(seed(7), DEFAULT_CREATED).body(),
            KeyFixture::x25519(seed(7), DEFAULT_CREATED).body()
        );
    }

    #[test]
    fn test_creation_time_changes_fingerprint() {
        let a = KeyFixture::x25519(seed(1), 1);
        let b = KeyFixture::x25519(seed(1), 2);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_builder_layout() {
        let primary = KeyFixture::ed25519(seed(1), DEFAULT_CREATED);
        let sub = KeyFixture::x25519(seed(2), DEFAULT_CREATED);
        let bytes = KeyRingBuilder::new()
            .primary_old_format(&primary)
            .user_id("Carol <carol@example.com>")
            .signature()
            .trust()
            .subkey(&sub)
            .signature()
            .build();

        let rings = KeyRingCollection::from_bytes(&bytes).unwrap();
        assert_eq!(rings.len(), 1);
        let ring = &rings.rings()[0];
        assert_eq!(ring.primary().fingerprint(), primary.fingerprint());
        assert_eq!(ring.subkeys()[0].fingerprint(), sub.fingerprint());
        assert_eq!(ring.primary().first_user_id(), Some("Carol <carol@example.com>"));

        let armored = KeyRingBuilder::new()
            .primary(&primary)
            .user_id("Carol <carol@example.com>")
            .signature()
            .build_armored();
        assert!(armored.starts_with("-----BEGIN PGP PUBLIC KEY BLOCK-----"));
        assert_eq!(KeyRingCollection::from_bytes(armored.as_bytes()).unwrap().len(), 1);
    }
}
