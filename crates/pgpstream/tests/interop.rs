//! Messages decrypted by rPGP, an implementation independent of the writer.
//!
//! Each case generates a complete, self-signed key with rPGP, exports its
//! public half in armor, selects the recipient through our key ring code and
//! checks that rPGP's own message decryption recovers the payload.

use pgp::crypto::ecc_curve::ECCCurve;
use pgp::{
    ArmorOptions, Deserializable, KeyType, Message, SecretKeyParamsBuilder, SignedPublicKey,
    SignedSecretKey, SubkeyParamsBuilder,
};
use pgpstream::core::select_encryption_key;
use pgpstream::{encrypt_to_vec, ChainOptions, CompressionAlgorithm, EncryptionSession, KeyId};
use rand::rngs::OsRng;
use std::io::Write;

struct Recipient {
    secret: SignedSecretKey,
    armored_public: Vec<u8>,
    filter: &'static str,
}

fn sign_and_export(params: pgp::SecretKeyParams, filter: &'static str) -> Recipient {
    let secret = params
        .generate(OsRng)
        .unwrap()
        .sign(OsRng, String::new)
        .unwrap();
    let armored_public = SignedPublicKey::from(secret.clone())
        .to_armored_bytes(ArmorOptions::default())
        .unwrap();
    Recipient {
        secret,
        armored_public,
        filter,
    }
}

fn rsa_recipient() -> Recipient {
    let params = SecretKeyParamsBuilder::default()
        .key_type(KeyType::Rsa(2048))
        .can_certify(true)
        .can_sign(true)
        .can_encrypt(true)
        .primary_user_id("Rita <rita@example.com>".into())
        .build()
        .unwrap();
    sign_and_export(params, "rita@example.com")
}

/// Signing primary with an encryption subkey. Subkeys carry no identity of
/// their own, so only the empty filter reaches them.
fn subkey_recipient(curve: ECCCurve, name: &str) -> Recipient {
    let params = SecretKeyParamsBuilder::default()
        .key_type(KeyType::EdDSALegacy)
        .can_certify(true)
        .can_sign(true)
        .primary_user_id(format!("{} <{}@example.com>", name, name))
        .subkey(
            SubkeyParamsBuilder::default()
                .key_type(KeyType::ECDH(curve))
                .can_encrypt(true)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();
    sign_and_export(params, "")
}

fn decrypt_with_rpgp(message: &[u8], recipient: &Recipient) -> Vec<u8> {
    let message = Message::from_bytes(message).unwrap();
    let (decrypted, key_ids) = message.decrypt(String::new, &[&recipient.secret]).unwrap();
    assert_eq!(key_ids.len(), 1);
    decrypted.get_content().unwrap().unwrap()
}

fn incompressible(len: usize) -> Vec<u8> {
    let mut state = 0x9e37_79b9_7f4a_7c15u64;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}

fn assert_interop(recipient: &Recipient) {
    let key = select_encryption_key(recipient.armored_public.as_slice(), recipient.filter).unwrap();
    assert!(key.is_encryption_key());

    let empty = encrypt_to_vec(&key, "empty", b"").unwrap();
    assert!(decrypt_with_rpgp(&empty, recipient).is_empty());

    let small = encrypt_to_vec(&key, "small.txt", b"hello from the pipeline").unwrap();
    assert_eq!(decrypt_with_rpgp(&small, recipient), b"hello from the pipeline");

    let large = incompressible(300_000);
    for compression in [
        CompressionAlgorithm::Uncompressed,
        CompressionAlgorithm::Zip,
        CompressionAlgorithm::Zlib,
    ] {
        let options = ChainOptions {
            compression,
            chunk_size: 1024,
            ..ChainOptions::default()
        };
        let mut session = EncryptionSession::new(Vec::new())
            .with_label("large.bin")
            .with_options(options);
        {
            let mut sink = session.start(&key).unwrap();
            for piece in large.chunks(7919) {
                sink.write_all(piece).unwrap();
            }
        }
        session.finish().unwrap();
        let message = session.into_inner();
        assert_eq!(
            decrypt_with_rpgp(&message, recipient),
            large,
            "{} payload did not survive",
            compression
        );
    }
}

#[test]
fn rpgp_decrypts_for_rsa_recipient() {
    assert_interop(&rsa_recipient());
}

#[test]
fn rpgp_decrypts_for_cv25519_subkey() {
    assert_interop(&subkey_recipient(ECCCurve::Curve25519, "cora"));
}

#[test]
fn rpgp_decrypts_for_nist_p256_subkey() {
    assert_interop(&subkey_recipient(ECCCurve::P256, "nina"));
}

#[test]
fn rpgp_names_the_selected_key() {
    let recipient = subkey_recipient(ECCCurve::Curve25519, "kim");
    let key = select_encryption_key(recipient.armored_public.as_slice(), "").unwrap();
    assert!(key.is_subkey());

    let message = encrypt_to_vec(&key, "x", b"id check").unwrap();
    let parsed = Message::from_bytes(message.as_slice()).unwrap();
    let (_, key_ids) = parsed.decrypt(String::new, &[&recipient.secret]).unwrap();
    assert_eq!(KeyId::from(&key_ids[0]), key.key_id());
}
