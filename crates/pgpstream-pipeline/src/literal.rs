//! Literal data packet (tag 11), binary format.

use pgpstream_core::packet::Tag;
use std::io;

use crate::error::Result;
use crate::framing::PartialBodyWriter;
use crate::stage::{Stage, StageKind};

/// Format octet for binary data.
pub const FORMAT_BINARY: u8 = b'b';

/// Longest filename a literal packet can carry.
pub const MAX_FILE_NAME: usize = 255;

/// Innermost stage: wraps the payload in a literal data packet.
#[derive(Debug)]
pub struct LiteralFramer {
    framer: PartialBodyWriter,
}

impl LiteralFramer {
    /// Start a literal packet named `file_name`, stamped `modified`.
    pub fn new(file_name: &str, modified: u32, chunk_size: usize) -> Result<Self> {
        let mut framer = PartialBodyWriter::new(Tag::LiteralData, chunk_size)?;
        framer.prime(&literal_header(file_name, modified));
        Ok(Self { framer })
    }
}

/// `b || len || name || time`, with the name cut to 255 octets on a char
/// boundary.
pub fn literal_header(file_name: &str, modified: u32) -> Vec<u8> {
    let name = truncate_name(file_name);
    let mut header = Vec::with_capacity(name.len() + 6);
    header.push(FORMAT_BINARY);
    header.push(name.len() as u8);
    header.extend_from_slice(name.as_bytes());
    header.extend_from_slice(&modified.to_be_bytes());
    header
}

fn truncate_name(name: &str) -> &str {
    if name.len() <= MAX_FILE_NAME {
        return name;
    }
    let mut end = MAX_FILE_NAME;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

impl Stage for LiteralFramer {
    fn kind(&self) -> StageKind {
        StageKind::LiteralFramer
    }

    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
        self.framer.write(input, out);
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> io::Result<()> {
        self.framer.finish(out);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::MIN_CHUNK_SIZE;

    #[test]
    fn test_literal_header_bytes() {
        let header = literal_header("result", 0x6500_0000);
        assert_eq!(
            header,
            vec![b'b', 6, b'r', b'e', b's', b'u', b'l', b't', 0x65, 0, 0, 0]
        );
    }

    #[test]
    fn test_empty_payload_packet() {
        let mut stage = LiteralFramer::new("", 0, MIN_CHUNK_SIZE).unwrap();
        let mut out = Vec::new();
        stage.finish(&mut out).unwrap();
        assert_eq!(out, vec![0xcb, 6, b'b', 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_long_name_truncated_on_char_boundary() {
        let name = "é".repeat(200); // 400 octets
        let header = literal_header(&name, 0);
        assert_eq!(header[1], 254);
        assert!(std::str::from_utf8(&header[2..2 + 254]).is_ok());

        let ascii = "x".repeat(300);
        assert_eq!(literal_header(&ascii, 0)[1], 255);
    }

    #[test]
    fn test_payload_follows_header() {
        let mut stage = LiteralFramer::new("f", 1, MIN_CHUNK_SIZE).unwrap();
        let mut out = Vec::new();
        stage.update(b"abc", &mut out).unwrap();
        stage.finish(&mut out).unwrap();
        assert_eq!(out, vec![0xcb, 10, b'b', 1, b'f', 0, 0, 0, 1, b'a', b'b', b'c']);
    }
}
