//! Reference decryptor.
//!
//! Opens exactly the message shape the pipeline writes: one PKESK followed by
//! one SEIPD packet, holding one compressed packet, holding one literal
//! packet. Every check a conforming reader performs (session key checksum,
//! quick check, modification detection code) fails loudly here.
//!
//! Packet parsing, session-key decryption and decompression are rPGP's; the
//! SEIPD layer is opened by hand so each check can be reported on its own.

use num_bigint_dig::BigUint;
use pgp::packet::{Packet, PublicKeyEncryptedSessionKey};
use pgp::types::{EskType, PkeskBytes};
use pgp::PlainSessionKey;
use pgpstream_core::crypto::BLOCK_SIZE;
use pgpstream_core::packet::{body, parse_packets};
use pgpstream_core::{CoreError, KeyId, SessionKey, SymmetricAlgorithm, Tag};
use sha1::{Digest, Sha1};
use std::io::Read;

use crate::fixtures::{KeyFixture, Secret};

type Result<T> = std::result::Result<T, CoreError>;

/// A decrypted message with everything the reader learned on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedMessage {
    /// Key ID named by the PKESK packet.
    pub recipient: KeyId,
    /// Symmetric algorithm of the session key.
    pub symmetric: SymmetricAlgorithm,
    /// Compression algorithm ID of the compressed packet.
    pub compression: u8,
    /// Literal packet file name.
    pub file_name: Vec<u8>,
    /// Literal packet timestamp.
    pub modified: u32,
    /// The payload.
    pub data: Vec<u8>,
}

fn malformed(msg: impl Into<String>) -> CoreError {
    CoreError::MalformedPacket(msg.into())
}

fn cipher(msg: impl std::fmt::Display) -> CoreError {
    CoreError::CipherInit(msg.to_string())
}

/// The single packet in `bytes`, which must carry `tag`.
fn only_packet(bytes: &[u8], tag: Tag, container: &str) -> Result<Packet> {
    let mut packets = parse_packets(bytes)?;
    if packets.len() != 1 {
        return Err(malformed(format!(
            "expected 1 packet in {}, found {}",
            container,
            packets.len()
        )));
    }
    let packet = packets.remove(0);
    if packet.tag() != tag {
        return Err(malformed(format!("{} holds {:?}", container, packet.tag())));
    }
    Ok(packet)
}

/// Decrypt `message` with the secret half of `key`.
pub fn decrypt(message: &[u8], key: &KeyFixture) -> Result<DecryptedMessage> {
    let top = parse_packets(message)?;
    let [Packet::PublicKeyEncryptedSessionKey(pkesk), Packet::SymEncryptedProtectedData(_)] =
        top.as_slice()
    else {
        let tags: Vec<Tag> = top.iter().map(Packet::tag).collect();
        return Err(malformed(format!("expected PKESK then SEIPD, found {:?}", tags)));
    };

    let (recipient, session_key) = unwrap_session_key(pkesk, key)?;
    let compressed = decrypt_seipd(&body(&top[1])?, &session_key)?;

    let compressed = only_packet(&compressed, Tag::CompressedData, "SEIPD")?;
    let Packet::CompressedData(compressed_packet) = &compressed else {
        return Err(malformed("compressed packet did not parse as such"));
    };
    let compression = body(&compressed)?
        .first()
        .copied()
        .ok_or_else(|| malformed("empty compressed packet"))?;
    let mut literal_bytes = Vec::new();
    compressed_packet
        .decompress()
        .map_err(|e| malformed(format!("decompress: {}", e)))?
        .read_to_end(&mut literal_bytes)?;

    let literal = only_packet(&literal_bytes, Tag::LiteralData, "compressed packet")?;
    let (file_name, modified, data) = split_literal(&body(&literal)?)?;

    Ok(DecryptedMessage {
        recipient,
        symmetric: session_key.algorithm(),
        compression,
        file_name,
        modified,
        data,
    })
}

/// `format || name_len || name || date || data`, binary format only.
fn split_literal(literal: &[u8]) -> Result<(Vec<u8>, u32, Vec<u8>)> {
    let (&format, rest) = literal
        .split_first()
        .ok_or_else(|| malformed("empty literal packet"))?;
    if format != b'b' {
        return Err(malformed(format!("literal format {:?}", format as char)));
    }
    let (&name_len, rest) = rest
        .split_first()
        .ok_or_else(|| malformed("literal packet without a name"))?;
    let name_len = name_len as usize;
    if rest.len() < name_len + 4 {
        return Err(malformed("literal header truncated"));
    }
    let (name, rest) = rest.split_at(name_len);
    let (date, data) = rest.split_at(4);
    let modified = u32::from_be_bytes([date[0], date[1], date[2], date[3]]);
    Ok((name.to_vec(), modified, data.to_vec()))
}

fn unwrap_session_key(
    pkesk: &PublicKeyEncryptedSessionKey,
    key: &KeyFixture,
) -> Result<(KeyId, SessionKey)> {
    let PublicKeyEncryptedSessionKey::V3 { id, values, .. } = pkesk else {
        return Err(malformed("only v3 PKESK packets are read"));
    };
    let key_id = KeyId::from(id);
    if key_id != key.key_id() {
        return Err(CoreError::KeyNotFound {
            filter: key_id.to_hex(),
        });
    }

    let session_key = match (key.secret(), values) {
        (Secret::Key(secret), _) => {
            let plain = pgp::decrypt_session_key(secret, String::new, values, EskType::V3_4)
                .map_err(|e| cipher(format!("session key decrypt: {}", e)))?;
            match &plain {
                PlainSessionKey::V3_4 { sym_alg, key } => {
                    let id = u8::from(*sym_alg);
                    let algorithm = SymmetricAlgorithm::from_id(id)
                        .ok_or_else(|| malformed(format!("symmetric algorithm {}", id)))?;
                    SessionKey::from_bytes(algorithm, key)?
                }
                other => return Err(malformed(format!("unexpected session key {:?}", other))),
            }
        }
        (Secret::Elgamal { p, x }, PkeskBytes::Elgamal { first, second }) => {
            let shared = BigUint::from(first).modpow(x, p);
            let inverse = shared.modpow(&(p - &BigUint::from(2u32)), p);
            let encoded = (BigUint::from(second) * inverse) % p;
            checked_session_key(eme_pkcs1_decode(&encoded.to_bytes_be())?)?
        }
        (Secret::Elgamal { .. }, other) => {
            return Err(malformed(format!("ElGamal key, PKESK fields {:?}", other)));
        }
    };

    Ok((key_id, session_key))
}

/// Strip EME-PKCS1-v1_5 padding. The leading zero octet is already gone
/// from the integer form.
fn eme_pkcs1_decode(encoded: &[u8]) -> Result<&[u8]> {
    let Some((&0x02, rest)) = encoded.split_first() else {
        return Err(malformed("bad EME-PKCS1 block type"));
    };
    let separator = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| malformed("EME-PKCS1 padding never ends"))?;
    if separator < 8 {
        return Err(malformed("EME-PKCS1 padding too short"));
    }
    Ok(&rest[separator + 1..])
}

/// Parse `alg || key || checksum`.
fn checked_session_key(msg: &[u8]) -> Result<SessionKey> {
    if msg.len() < 3 {
        return Err(malformed("session key message too short"));
    }
    let algorithm = SymmetricAlgorithm::from_id(msg[0])
        .ok_or_else(|| malformed(format!("symmetric algorithm {}", msg[0])))?;
    let (key, checksum) = msg[1..].split_at(msg.len() - 3);
    let session_key = SessionKey::from_bytes(algorithm, key)?;
    if session_key.checksum().to_be_bytes() != checksum {
        return Err(malformed("session key checksum mismatch"));
    }
    Ok(session_key)
}

fn decrypt_seipd(body: &[u8], session_key: &SessionKey) -> Result<Vec<u8>> {
    let (&version, ciphertext) = body
        .split_first()
        .ok_or_else(|| malformed("empty SEIPD packet"))?;
    if version != 1 {
        return Err(malformed(format!("SEIPD version {}", version)));
    }
    let prefix_len = BLOCK_SIZE + 2;
    if ciphertext.len() < prefix_len + 22 {
        return Err(malformed("SEIPD packet too short"));
    }

    let mut plaintext = ciphertext.to_vec();
    session_key.decryptor()?.decrypt(&mut plaintext);

    if plaintext[BLOCK_SIZE - 2..BLOCK_SIZE] != plaintext[BLOCK_SIZE..prefix_len] {
        return Err(malformed("quick check failed"));
    }

    let (covered, digest) = plaintext.split_at(plaintext.len() - 20);
    if !covered.ends_with(&[0xd3, 0x14]) {
        return Err(malformed("missing modification detection code"));
    }
    if Sha1::digest(covered).as_slice() != digest {
        return Err(malformed("modification detection code mismatch"));
    }

    Ok(covered[prefix_len..covered.len() - 2].to_vec())
}
