//! Key rings and encryption key selection.
//!
//! A key ring collection is parsed once, searched once, and dropped. Selection
//! is first-match: rings in stored order, keys in stored order, and the first
//! key that can encrypt and whose first identity contains the filter wins.

use pgp::armor::Dearmor;
use pgp::packet::Packet;
use std::io::Read;

use crate::error::{CoreError, Result};
use crate::key::PublicKey;
use crate::packet::PacketParser;

/// A primary key followed by its subkeys, in stored order.
///
/// Identities are attached to the primary key only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRing {
    keys: Vec<PublicKey>,
}

impl KeyRing {
    fn new(primary: PublicKey) -> Self {
        Self {
            keys: vec![primary],
        }
    }

    /// The primary key.
    pub fn primary(&self) -> &PublicKey {
        &self.keys[0]
    }

    /// The subkeys, in stored order.
    pub fn subkeys(&self) -> &[PublicKey] {
        &self.keys[1..]
    }

    /// Every key: the primary first, then the subkeys.
    pub fn keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.keys.iter()
    }

    /// Number of keys including the primary.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false; a ring has at least its primary key.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// An ordered sequence of key rings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRingCollection {
    rings: Vec<KeyRing>,
}

impl KeyRingCollection {
    /// Parse a collection from binary or armored bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        if is_armored(bytes) {
            let mut binary = Vec::new();
            Dearmor::new(bytes)
                .read_to_end(&mut binary)
                .map_err(|e| CoreError::KeyRingParse(format!("invalid armor: {}", e)))?;
            if binary.is_empty() {
                return Err(CoreError::KeyRingParse("armored block is empty".into()));
            }
            Self::from_binary(&binary)
        } else if bytes[0] & 0x80 != 0 {
            Self::from_binary(bytes)
        } else {
            Err(CoreError::KeyRingParse(
                "input is neither a binary nor an armored key ring".into(),
            ))
        }
    }

    /// Read everything from `reader` and parse it.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    fn from_binary(bytes: &[u8]) -> Result<Self> {
        let mut rings: Vec<KeyRing> = Vec::new();
        // Set after a packet rPGP could not interpret, until the next primary
        // key. Keys and identities that follow it cannot be attributed safely.
        let mut skipping = false;

        for packet in PacketParser::new(bytes) {
            let packet = match packet {
                Ok(packet) => packet,
                Err(e) if is_skippable(&e) => {
                    skipping = true;
                    continue;
                }
                Err(e) => return Err(CoreError::KeyRingParse(e.to_string())),
            };

            match packet {
                Packet::PublicKey(key) => {
                    skipping = false;
                    rings.push(KeyRing::new(PublicKey::from_primary(key)));
                }
                Packet::PublicSubkey(key) => {
                    if skipping {
                        continue;
                    }
                    let ring = rings.last_mut().ok_or_else(|| {
                        CoreError::KeyRingParse("subkey before any primary key".into())
                    })?;
                    ring.keys.push(PublicKey::from_subkey(key));
                }
                Packet::UserId(user_id) => {
                    if skipping {
                        continue;
                    }
                    let ring = rings.last_mut().ok_or_else(|| {
                        CoreError::KeyRingParse("user ID before any primary key".into())
                    })?;
                    let user_id = String::from_utf8_lossy(user_id.id()).into_owned();
                    ring.keys[0].push_user_id(user_id);
                }
                Packet::Signature(_)
                | Packet::Trust(_)
                | Packet::UserAttribute(_)
                | Packet::Marker(_)
                | Packet::Padding(_) => {}
                Packet::SecretKey(_) | Packet::SecretSubkey(_) => {
                    return Err(CoreError::KeyRingParse(
                        "secret key packets are not accepted in a public key ring".into(),
                    ));
                }
                other => {
                    return Err(CoreError::KeyRingParse(format!(
                        "unexpected {:?} packet in key ring",
                        other.tag()
                    )));
                }
            }
        }

        Ok(Self { rings })
    }

    /// The rings, in stored order.
    pub fn rings(&self) -> &[KeyRing] {
        &self.rings
    }

    /// Number of rings.
    pub fn len(&self) -> usize {
        self.rings.len()
    }

    /// Whether the collection holds no rings.
    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    /// Find the first encryption-capable key whose first identity contains
    /// `filter`. An empty filter accepts any encryption-capable key.
    pub fn select(&self, filter: &str) -> Result<&PublicKey> {
        self.rings
            .iter()
            .flat_map(KeyRing::keys)
            .find(|key| key.is_encryption_key() && identity_matches(key, filter))
            .ok_or_else(|| CoreError::KeyNotFound {
                filter: filter.to_string(),
            })
    }
}

fn is_armored(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'-')
}

/// Packets rPGP parsed far enough to know it does not support them, such as
/// keys of an unknown version. Anything else is a malformed key ring.
fn is_skippable(error: &pgp::errors::Error) -> bool {
    use pgp::errors::Error;

    match error {
        Error::Unsupported(_) => true,
        Error::InvalidPacketContent(inner) => {
            matches!(**inner, Error::Unsupported(_) | Error::EllipticCurve(_))
        }
        _ => false,
    }
}

fn identity_matches(key: &PublicKey, filter: &str) -> bool {
    if filter.is_empty() {
        return true;
    }
    key.first_user_id()
        .is_some_and(|user_id| user_id.contains(filter))
}

/// Parse a key ring from `reader` and select an encryption key from it.
///
/// The collection is dropped before returning; only the selected key is kept.
pub fn select_encryption_key<R: Read>(reader: R, filter: &str) -> Result<PublicKey> {
    let collection = KeyRingCollection::from_reader(reader)?;
    collection.select(filter).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KEY_VERSION;
    use crate::packet::{write_header, Tag};
    use pgp::armor::BlockType;

    // v4 certification with no subpackets and a one-bit RSA signature value.
    const SIGNATURE: &[u8] = &[4, 0x13, 1, 8, 0, 0, 0, 0, 0xab, 0xcd, 0, 1, 1];

    struct Raw<'a>(&'a [u8]);

    impl pgp::ser::Serialize for Raw<'_> {
        fn to_writer<W: std::io::Write>(&self, writer: &mut W) -> pgp::errors::Result<()> {
            writer.write_all(self.0)?;
            Ok(())
        }
    }

    fn mpi(body: &mut Vec<u8>, value: &[u8]) {
        let bits = (value.len() - 1) * 8 + (8 - value[0].leading_zeros() as usize);
        body.extend_from_slice(&(bits as u16).to_be_bytes());
        body.extend_from_slice(value);
    }

    fn key_body(version: u8, algorithm: u8, seed: u8) -> Vec<u8> {
        let mut body = vec![version, 0x65, 0x00, 0x00, seed, algorithm];
        if matches!(algorithm, 1..=3) {
            mpi(&mut body, &[seed | 0x80; 64]);
            mpi(&mut body, &[0x01, 0x00, 0x01]);
        } else {
            body.extend_from_slice(&[seed; 32]);
        }
        body
    }

    fn packet(buf: &mut Vec<u8>, tag: Tag, body: &[u8]) {
        write_header(buf, tag, body.len() as u32);
        buf.extend_from_slice(body);
    }

    /// Ring 1: sign-only primary "Alice", X25519 subkey.
    /// Ring 2: RSA primary "Bob", RSA subkey.
    fn two_rings() -> Vec<u8> {
        let mut buf = Vec::new();
        packet(&mut buf, Tag::PublicKey, &key_body(KEY_VERSION, 27, 1));
        packet(&mut buf, Tag::UserId, b"Alice <alice@example.com>");
        packet(&mut buf, Tag::Signature, SIGNATURE);
        packet(&mut buf, Tag::PublicSubkey, &key_body(KEY_VERSION, 25, 2));
        packet(&mut buf, Tag::Signature, SIGNATURE);

        packet(&mut buf, Tag::PublicKey, &key_body(KEY_VERSION, 1, 3));
        packet(&mut buf, Tag::UserId, b"Bob <bob@example.com>");
        packet(&mut buf, Tag::Trust, &[0]);
        packet(&mut buf, Tag::PublicSubkey, &key_body(KEY_VERSION, 1, 4));
        buf
    }

    fn armored(binary: &[u8]) -> String {
        let mut out = Vec::new();
        pgp::armor::write(&Raw(binary), BlockType::PublicKey, &mut out, None, true).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_rings_and_user_ids() {
        let rings = KeyRingCollection::from_bytes(&two_rings()).unwrap();
        assert_eq!(rings.len(), 2);

        let first = &rings.rings()[0];
        assert_eq!(first.len(), 2);
        assert_eq!(
            first.primary().first_user_id(),
            Some("Alice <alice@example.com>")
        );
        assert!(first.subkeys()[0].user_ids().is_empty());
        assert!(first.subkeys()[0].is_subkey());
    }

    #[test]
    fn test_empty_filter_takes_first_encryption_key() {
        let rings = KeyRingCollection::from_bytes(&two_rings()).unwrap();
        let key = rings.select("").unwrap();
        // The sign-only primary is skipped; its X25519 subkey has no identity
        // but the empty filter accepts it.
        assert_eq!(key.fingerprint(), rings.rings()[0].subkeys()[0].fingerprint());
    }

    #[test]
    fn test_filter_matches_first_identity_substring() {
        let rings = KeyRingCollection::from_bytes(&two_rings()).unwrap();
        let key = rings.select("bob@").unwrap();
        assert_eq!(key.fingerprint(), rings.rings()[1].primary().fingerprint());

        // Subkeys carry no identity, so a filter never selects one.
        assert!(matches!(
            rings.select("alice"),
            Err(CoreError::KeyNotFound { ref filter }) if filter == "alice"
        ));
    }

    #[test]
    fn test_selection_is_case_sensitive() {
        let rings = KeyRingCollection::from_bytes(&two_rings()).unwrap();
        assert!(rings.select("BOB").is_err());
    }

    #[test]
    fn test_selection_is_deterministic() {
        let bytes = two_rings();
        let a = select_encryption_key(bytes.as_slice(), "").unwrap();
        let b = select_encryption_key(bytes.as_slice(), "").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_armored_and_binary_agree() {
        let binary = two_rings();
        let text = armored(&binary);

        let from_binary = select_encryption_key(binary.as_slice(), "Bob").unwrap();
        let from_armor = select_encryption_key(text.as_bytes(), "Bob").unwrap();
        assert_eq!(from_binary.fingerprint(), from_armor.fingerprint());

        let indented = format!("\n\n{}", text);
        assert_eq!(KeyRingCollection::from_bytes(indented.as_bytes()).unwrap().len(), 2);
    }

    #[test]
    fn test_unsupported_key_version_is_skipped() {
        let mut buf = Vec::new();
        packet(&mut buf, Tag::PublicKey, &key_body(5, 1, 9));
        packet(&mut buf, Tag::UserId, b"Future <bob@example.com>");
        packet(&mut buf, Tag::PublicSubkey, &key_body(KEY_VERSION, 1, 8));
        buf.extend_from_slice(&two_rings());

        let rings = KeyRingCollection::from_bytes(&buf).unwrap();
        assert_eq!(rings.len(), 2);

        // The identity and subkey of the skipped key are not attributed to
        // anything, so the filter lands on the real Bob.
        let key = rings.select("bob@").unwrap();
        assert_eq!(key.first_user_id(), Some("Bob <bob@example.com>"));
    }

    #[test]
    fn test_unsupported_subkey_drops_rest_of_ring() {
        let mut buf = Vec::new();
        packet(&mut buf, Tag::PublicKey, &key_body(KEY_VERSION, 27, 1));
        packet(&mut buf, Tag::UserId, b"Carol <carol@example.com>");
        packet(&mut buf, Tag::PublicSubkey, &key_body(5, 25, 2));
        packet(&mut buf, Tag::PublicSubkey, &key_body(KEY_VERSION, 25, 3));

        let rings = KeyRingCollection::from_bytes(&buf).unwrap();
        assert_eq!(rings.len(), 1);
        assert_eq!(rings.rings()[0].len(), 1);
        assert!(rings.select("").is_err());
    }

    #[test]
    fn test_empty_input_has_no_keys() {
        for input in [&b""[..], b"  \n\t"] {
            let rings = KeyRingCollection::from_bytes(input).unwrap();
            assert!(rings.is_empty());
            assert!(matches!(
                rings.select(""),
                Err(CoreError::KeyNotFound { .. })
            ));
        }
    }

    #[test]
    fn test_malformed_rings() {
        let mut orphan_uid = Vec::new();
        packet(&mut orphan_uid, Tag::UserId, b"nobody");

        let mut orphan_subkey = Vec::new();
        packet(&mut orphan_subkey, Tag::PublicSubkey, &key_body(KEY_VERSION, 25, 1));

        let mut secret = Vec::new();
        packet(&mut secret, Tag::SecretKey, &key_body(KEY_VERSION, 1, 1));

        let mut message = Vec::new();
        packet(&mut message, Tag::LiteralData, b"b\x00\x00\x00\x00\x00");

        let mut truncated = two_rings();
        truncated.truncate(truncated.len() - 3);

        for bytes in [orphan_uid, orphan_subkey, secret, message, truncated] {
            assert!(matches!(
                KeyRingCollection::from_bytes(&bytes),
                Err(CoreError::KeyRingParse(_))
            ));
        }

        assert!(matches!(
            KeyRingCollection::from_bytes(b"hello"),
            Err(CoreError::KeyRingParse(_))
        ));
    }

    #[test]
    fn test_bad_armor_is_parse_error() {
        let text = "-----BEGIN PGP PUBLIC KEY BLOCK-----\n\n!!!!\n-----END PGP PUBLIC KEY BLOCK-----\n";
        assert!(matches!(
            KeyRingCollection::from_bytes(text.as_bytes()),
            Err(CoreError::KeyRingParse(_))
        ));

        let mut tampered = armored(&two_rings()).into_bytes();
        let body_start = tampered.iter().position(|&b| b == b'\n').unwrap() + 2;
        tampered[body_start + 4] = if tampered[body_start + 4] == b'A' { b'B' } else { b'A' };
        assert!(matches!(
            KeyRingCollection::from_bytes(&tampered),
            Err(CoreError::KeyRingParse(_))
        ));
    }
}
