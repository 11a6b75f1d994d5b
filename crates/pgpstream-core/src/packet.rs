//! OpenPGP packet framing (RFC 9580 section 4).
//!
//! Parsing is rPGP's [`PacketParser`]. What lives here is the writing side the
//! streaming stages need and rPGP keeps internal: new-format headers for
//! bodies whose length is known, and partial body length octets for bodies
//! that are still being produced.

use pgp::packet::Packet;
use pgp::ser::Serialize;

use crate::error::{CoreError, Result};

pub use pgp::packet::PacketParser;
pub use pgp::types::Tag;

/// Largest chunk a partial body length octet can describe (2^30).
pub const MAX_PARTIAL_CHUNK: usize = 1 << 30;

/// Append a new-format definite body length.
pub fn encode_length(buf: &mut Vec<u8>, len: u32) {
    if len < 192 {
        buf.push(len as u8);
    } else if len < 8384 {
        let v = len - 192;
        buf.push(((v >> 8) + 192) as u8);
        buf.push((v & 0xff) as u8);
    } else {
        buf.push(0xff);
        buf.extend_from_slice(&len.to_be_bytes());
    }
}

/// Append a new-format packet header with a definite body length.
pub fn write_header(buf: &mut Vec<u8>, tag: Tag, len: u32) {
    buf.push(tag.encode());
    encode_length(buf, len);
}

/// The partial body length octet for a power-of-two chunk.
///
/// Returns `None` when `chunk` is not a power of two or exceeds
/// [`MAX_PARTIAL_CHUNK`].
pub fn partial_length_octet(chunk: usize) -> Option<u8> {
    if !chunk.is_power_of_two() || chunk > MAX_PARTIAL_CHUNK {
        return None;
    }
    Some(224 + chunk.trailing_zeros() as u8)
}

/// Parse every packet in `bytes`, failing on the first malformed one.
pub fn parse_packets(bytes: &[u8]) -> Result<Vec<Packet>> {
    PacketParser::new(bytes)
        .map(|packet| packet.map_err(|e| CoreError::MalformedPacket(e.to_string())))
        .collect()
}

/// The body of a parsed packet as it is framed on the wire, with partial body
/// chunks already joined.
pub fn body(packet: &Packet) -> Result<Vec<u8>> {
    let bytes = match packet {
        Packet::CompressedData(p) => p.to_bytes(),
        Packet::PublicKey(p) => p.to_bytes(),
        Packet::PublicSubkey(p) => p.to_bytes(),
        Packet::SecretKey(p) => p.to_bytes(),
        Packet::SecretSubkey(p) => p.to_bytes(),
        Packet::LiteralData(p) => p.to_bytes(),
        Packet::Marker(p) => p.to_bytes(),
        Packet::ModDetectionCode(p) => p.to_bytes(),
        Packet::OnePassSignature(p) => p.to_bytes(),
        Packet::PublicKeyEncryptedSessionKey(p) => p.to_bytes(),
        Packet::Signature(p) => p.to_bytes(),
        Packet::SymEncryptedData(p) => p.to_bytes(),
        Packet::SymEncryptedProtectedData(p) => p.to_bytes(),
        Packet::SymKeyEncryptedSessionKey(p) => p.to_bytes(),
        Packet::Trust(p) => p.to_bytes(),
        Packet::UserAttribute(p) => p.to_bytes(),
        Packet::UserId(p) => p.to_bytes(),
        Packet::Padding(p) => p.to_bytes(),
    };
    bytes.map_err(|e| CoreError::MalformedPacket(e.to_string()))
}
