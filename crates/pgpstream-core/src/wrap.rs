//! Session-key wrapping for one recipient (the v3 PKESK packet).
//!
//! RSA, ECDH (Curve25519 and the NIST curves) and X25519 go through rPGP's
//! public-key encryption. rPGP cannot encrypt to ElGamal, so that path is
//! done here: EME-PKCS1-v1_5 over `alg || key || checksum`, then the usual
//! `(g^k, m * y^k) mod p` pair.

use num_bigint_dig::{BigUint, RandBigInt};
use pgp::packet::{write_packet, PublicKeyEncryptedSessionKey};
use pgp::types::{Mpi, PkeskBytes, PublicKeyTrait, PublicParams};
use rand::rngs::OsRng;
use rand::Rng;
use zeroize::Zeroizing;

use crate::crypto::SessionKey;
use crate::error::{CoreError, Result};
use crate::key::{KeyId, PublicKey, PublicKeyAlgorithm};

/// Smallest random padding run EME-PKCS1-v1_5 allows.
const MIN_PADDING: usize = 8;

/// A session key encrypted to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedSessionKey {
    key_id: KeyId,
    algorithm: PublicKeyAlgorithm,
    packet: PublicKeyEncryptedSessionKey,
}

impl EncryptedSessionKey {
    /// Key ID of the recipient.
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    /// Public key algorithm of the recipient.
    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.algorithm
    }

    /// The rPGP packet.
    pub fn packet(&self) -> &PublicKeyEncryptedSessionKey {
        &self.packet
    }

    /// Encode as a complete v3 PKESK packet, header included.
    pub fn to_packet(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        write_packet(&mut out, &self.packet)
            .map_err(|e| CoreError::CipherInit(format!("encoding session key packet: {}", e)))?;
        Ok(out)
    }
}

/// Encrypt `session_key` to `recipient`.
pub fn encrypt_session_key(
    recipient: &PublicKey,
    session_key: &SessionKey,
) -> Result<EncryptedSessionKey> {
    if !recipient.is_encryption_key() {
        return Err(CoreError::CipherInit(format!(
            "cannot encrypt a session key to {:?} key {}",
            recipient.algorithm(),
            recipient.key_id()
        )));
    }

    let packet = match recipient.params() {
        PublicParams::Elgamal { p, g, y } => {
            let values = wrap_elgamal(p, g, y, session_key)?;
            PublicKeyEncryptedSessionKey::V3 {
                packet_version: Default::default(),
                id: PublicKeyTrait::key_id(recipient),
                pk_algo: recipient.algorithm(),
                values,
            }
        }
        _ => PublicKeyEncryptedSessionKey::from_session_key_v3(
            OsRng,
            session_key.as_bytes(),
            session_key.algorithm().to_pgp(),
            recipient,
        )
        .map_err(|e| {
            CoreError::CipherInit(format!(
                "wrapping session key for {}: {}",
                recipient.key_id(),
                e
            ))
        })?,
    };

    Ok(EncryptedSessionKey {
        key_id: recipient.key_id(),
        algorithm: recipient.algorithm(),
        packet,
    })
}

/// `alg || key || checksum`, the plaintext every v3 PKESK encrypts.
fn session_key_message(session_key: &SessionKey) -> Zeroizing<Vec<u8>> {
    let key = session_key.as_bytes();
    let mut message = Zeroizing::new(Vec::with_capacity(key.len() + 3));
    message.push(session_key.algorithm().id());
    message.extend_from_slice(key);
    message.extend_from_slice(&session_key.checksum().to_be_bytes());
    message
}

/// EME-PKCS1-v1_5: `0x00 0x02 PS 0x00 M`, with PS nonzero random octets.
fn pkcs1_pad<R: Rng>(rng: &mut R, message: &[u8], k: usize) -> Result<Zeroizing<Vec<u8>>> {
    if k < message.len() + MIN_PADDING + 3 {
        return Err(CoreError::CipherInit(format!(
            "modulus of {} bytes is too small for a {} byte session key",
            k,
            message.len()
        )));
    }
    let mut em = Zeroizing::new(Vec::with_capacity(k));
    em.extend_from_slice(&[0x00, 0x02]);
    for _ in 0..k - message.len() - 3 {
        em.push(rng.gen_range(1..=u8::MAX));
    }
    em.push(0x00);
    em.extend_from_slice(message);
    Ok(em)
}

fn wrap_elgamal(p: &Mpi, g: &Mpi, y: &Mpi, session_key: &SessionKey) -> Result<PkeskBytes> {
    let p = BigUint::from(p);
    let g = BigUint::from(g);
    let y = BigUint::from(y);
    let one = BigUint::from(1u32);
    if p <= one {
        return Err(CoreError::CipherInit("ElGamal prime is not usable".into()));
    }

    let k = p.to_bytes_be().len();
    let em = pkcs1_pad(&mut OsRng, &session_key_message(session_key), k)?;
    let m = BigUint::from_bytes_be(&em);
    if m >= p {
        return Err(CoreError::CipherInit(
            "padded session key does not fit the ElGamal prime".into(),
        ));
    }

    let ephemeral = OsRng.gen_biguint_range(&one, &(&p - &one));
    let first = g.modpow(&ephemeral, &p);
    let second = (m * y.modpow(&ephemeral, &p)) % &p;

    Ok(PkeskBytes::Elgamal {
        first: Mpi::from_raw(first.to_bytes_be()),
        second: Mpi::from_raw(second.to_bytes_be()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SymmetricAlgorithm;
    use chrono::Utc;
    use num_bigint_dig::RandPrime;
    use pgp::crypto::ecc_curve::ECCCurve;
    use pgp::packet::{Packet, SecretKey};
    use pgp::types::{EskType, KeyVersion, Version};
    use pgp::{KeyType, PlainSessionKey};

    struct Generated {
        public: PublicKey,
        secret: SecretKey,
    }

    fn generate(key_type: KeyType, algorithm: PublicKeyAlgorithm) -> Generated {
        let (params, secret_params) = key_type.generate(OsRng).unwrap();
        let packet = pgp::packet::PublicKey::new(
            Version::New,
            KeyVersion::V4,
            algorithm,
            Utc::now(),
            None,
            params,
        )
        .unwrap();
        Generated {
            public: PublicKey::from_primary(packet.clone()),
            secret: SecretKey::new(packet, secret_params),
        }
    }

    fn pkesk_values(esk: &EncryptedSessionKey) -> &PkeskBytes {
        match esk.packet() {
            PublicKeyEncryptedSessionKey::V3 { values, .. } => values,
            other => panic!("expected a v3 PKESK, got {:?}", other),
        }
    }

    fn unwrap_with(generated: &Generated, esk: &EncryptedSessionKey) -> (u8, Vec<u8>) {
        let plain = pgp::decrypt_session_key(
            &generated.secret,
            String::new,
            pkesk_values(esk),
            EskType::V3_4,
        )
        .unwrap();
        match &plain {
            PlainSessionKey::V3_4 { sym_alg, key } => (u8::from(*sym_alg), key.clone()),
            other => panic!("unexpected session key {:?}", other),
        }
    }

    fn assert_round_trip(generated: &Generated) {
        let session_key = SessionKey::generate(SymmetricAlgorithm::Aes256).unwrap();
        let esk = encrypt_session_key(&generated.public, &session_key).unwrap();
        assert_eq!(esk.key_id(), generated.public.key_id());
        assert_eq!(esk.algorithm(), generated.public.algorithm());

        let (alg, key) = unwrap_with(generated, &esk);
        assert_eq!(alg, SymmetricAlgorithm::Aes256.id());
        assert_eq!(key, session_key.as_bytes());
    }

    #[test]
    fn test_rsa_wrap_unwraps_with_recipient_secret() {
        assert_round_trip(&generate(KeyType::Rsa(2048), PublicKeyAlgorithm::RSA));
    }

    #[test]
    fn test_cv25519_wrap_unwraps_with_recipient_secret() {
        assert_round_trip(&generate(
            KeyType::ECDH(ECCCurve::Curve25519),
            PublicKeyAlgorithm::ECDH,
        ));
    }

    #[test]
    fn test_nist_p256_wrap_unwraps_with_recipient_secret() {
        assert_round_trip(&generate(
            KeyType::ECDH(ECCCurve::P256),
            PublicKeyAlgorithm::ECDH,
        ));
    }

    #[test]
    fn test_x25519_wrap_unwraps_with_recipient_secret() {
        assert_round_trip(&generate(KeyType::X25519, PublicKeyAlgorithm::X25519));
    }

    #[test]
    fn test_packet_parses_back() {
        let generated = generate(KeyType::X25519, PublicKeyAlgorithm::X25519);
        let session_key = SessionKey::generate(SymmetricAlgorithm::Aes128).unwrap();
        let esk = encrypt_session_key(&generated.public, &session_key).unwrap();
        let bytes = esk.to_packet().unwrap();

        let packets = crate::packet::parse_packets(&bytes).unwrap();
        assert_eq!(packets.len(), 1);
        let Packet::PublicKeyEncryptedSessionKey(parsed) = &packets[0] else {
            panic!("expected PKESK, got {:?}", packets[0].tag());
        };
        assert_eq!(parsed, esk.packet());
        assert_eq!(
            parsed.id().unwrap().as_ref(),
            generated.public.key_id().as_bytes()
        );
        assert_eq!(parsed.algorithm().unwrap(), PublicKeyAlgorithm::X25519);
    }

    #[test]
    fn test_fresh_randomness_per_wrap() {
        let generated = generate(KeyType::X25519, PublicKeyAlgorithm::X25519);
        let session_key = SessionKey::generate(SymmetricAlgorithm::Aes256).unwrap();
        let a = encrypt_session_key(&generated.public, &session_key).unwrap();
        let b = encrypt_session_key(&generated.public, &session_key).unwrap();
        assert_ne!(a.to_packet().unwrap(), b.to_packet().unwrap());
    }

    fn elgamal_recipient(bits: usize) -> (PublicKey, BigUint, BigUint) {
        let p = OsRng.gen_prime(bits);
        let g = BigUint::from(2u32);
        let x = OsRng.gen_biguint_range(&BigUint::from(2u32), &(&p - &BigUint::from(1u32)));
        let y = g.modpow(&x, &p);
        let packet = pgp::packet::PublicKey::new(
            Version::New,
            KeyVersion::V4,
            PublicKeyAlgorithm::ElgamalSign,
            Utc::now(),
            None,
            PublicParams::Elgamal {
                p: (&p).into(),
                g: (&g).into(),
                y: (&y).into(),
            },
        )
        .unwrap();
        (PublicKey::from_primary(packet), p, x)
    }

    #[test]
    fn test_elgamal_wrap_decrypts() {
        let (recipient, p, x) = elgamal_recipient(512);
        let session_key = SessionKey::generate(SymmetricAlgorithm::Aes192).unwrap();
        let esk = encrypt_session_key(&recipient, &session_key).unwrap();
        assert_eq!(esk.algorithm(), PublicKeyAlgorithm::ElgamalSign);

        let PkeskBytes::Elgamal { first, second } = pkesk_values(&esk) else {
            panic!("expected ElGamal fields");
        };
        let first = BigUint::from(first);
        let second = BigUint::from(second);
        let shared = first.modpow(&x, &p);
        let inverse = shared.modpow(&(&p - &BigUint::from(2u32)), &p);
        let m = (second * inverse) % &p;

        // The leading zero octet is dropped by the integer conversion.
        let em = m.to_bytes_be();
        let k = p.to_bytes_be().len();
        assert_eq!(em.len(), k - 1);
        assert_eq!(em[0], 0x02);
        let separator = em.iter().position(|&b| b == 0).unwrap();
        assert!(separator > MIN_PADDING);
        assert_eq!(&em[separator + 1..], session_key_message(&session_key).as_slice());

        let bytes = esk.to_packet().unwrap();
        let packets = crate::packet::parse_packets(&bytes).unwrap();
        assert_eq!(packets.len(), 1);
    }

    #[test]
    fn test_tiny_elgamal_prime_is_cipher_init() {
        let (recipient, _, _) = elgamal_recipient(128);
        let session_key = SessionKey::generate(SymmetricAlgorithm::Aes256).unwrap();
        assert!(matches!(
            encrypt_session_key(&recipient, &session_key),
            Err(CoreError::CipherInit(_))
        ));
    }

    #[test]
    fn test_signing_key_is_cipher_init() {
        let generated = generate(KeyType::Ed25519, PublicKeyAlgorithm::Ed25519);
        let session_key = SessionKey::generate(SymmetricAlgorithm::Aes256).unwrap();
        match encrypt_session_key(&generated.public, &session_key) {
            Err(CoreError::CipherInit(msg)) => assert!(msg.contains("Ed25519")),
            other => panic!("expected CipherInit, got {:?}", other),
        }
    }

    #[test]
    fn test_pkcs1_padding_layout() {
        let em = pkcs1_pad(&mut OsRng, &[9, 1, 2, 3], 32).unwrap();
        assert_eq!(em.len(), 32);
        assert_eq!(&em[..2], &[0x00, 0x02]);
        assert!(em[2..32 - 5].iter().all(|&b| b != 0));
        assert_eq!(&em[32 - 5..], &[0x00, 9, 1, 2, 3]);
        assert!(pkcs1_pad(&mut OsRng, &[0u8; 22], 32).is_err());
    }
}
