//! Compressed data packet (tag 8).

use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::Compression;
use pgpstream_core::packet::Tag;
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use crate::error::{PipelineError, Result};
use crate::framing::PartialBodyWriter;
use crate::stage::{Stage, StageKind};

/// Default deflate level.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Compression algorithms (RFC 9580 section 9.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionAlgorithm {
    /// Stored, but still wrapped in a compressed data packet (0).
    Uncompressed,
    /// Raw deflate (1).
    #[default]
    Zip,
    /// Deflate with a zlib header (2).
    Zlib,
}

impl CompressionAlgorithm {
    /// The wire identifier.
    pub fn id(self) -> u8 {
        match self {
            Self::Uncompressed => 0,
            Self::Zip => 1,
            Self::Zlib => 2,
        }
    }

    /// Configuration name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Uncompressed => "uncompressed",
            Self::Zip => "zip",
            Self::Zlib => "zlib",
        }
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "uncompressed" | "none" => Ok(Self::Uncompressed),
            "zip" | "deflate" => Ok(Self::Zip),
            "zlib" => Ok(Self::Zlib),
            other => Err(PipelineError::InvalidOptions(format!(
                "unknown compression algorithm {:?}",
                other
            ))),
        }
    }
}

enum Encoder {
    Stored,
    Zip(DeflateEncoder<Vec<u8>>),
    Zlib(ZlibEncoder<Vec<u8>>),
}

/// Second stage from the inside: compresses literal packets.
pub struct Compressor {
    algorithm: CompressionAlgorithm,
    encoder: Encoder,
    framer: PartialBodyWriter,
}

impl Compressor {
    /// Start a compressed data packet.
    pub fn new(algorithm: CompressionAlgorithm, level: u32, chunk_size: usize) -> Result<Self> {
        if level > 9 {
            return Err(PipelineError::InvalidOptions(format!(
                "compression level {} is out of range 0-9",
                level
            )));
        }
        let level = Compression::new(level);
        let encoder = match algorithm {
            CompressionAlgorithm::Uncompressed => Encoder::Stored,
            CompressionAlgorithm::Zip => Encoder::Zip(DeflateEncoder::new(Vec::new(), level)),
            CompressionAlgorithm::Zlib => Encoder::Zlib(ZlibEncoder::new(Vec::new(), level)),
        };

        let mut framer = PartialBodyWriter::new(Tag::CompressedData, chunk_size)?;
        framer.prime(&[algorithm.id()]);
        Ok(Self {
            algorithm,
            encoder,
            framer,
        })
    }

    /// The algorithm in use.
    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }
}

impl fmt::Debug for Compressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compressor")
            .field("algorithm", &self.algorithm)
            .field("framer", &self.framer)
            .finish()
    }
}

impl Stage for Compressor {
    fn kind(&self) -> StageKind {
        StageKind::Compressor
    }

    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
        match &mut self.encoder {
            Encoder::Stored => self.framer.write(input, out),
            Encoder::Zip(encoder) => {
                encoder.write_all(input)?;
                self.framer.write(encoder.get_ref(), out);
                encoder.get_mut().clear();
            }
            Encoder::Zlib(encoder) => {
                encoder.write_all(input)?;
                self.framer.write(encoder.get_ref(), out);
                encoder.get_mut().clear();
            }
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> io::Result<()> {
        match &mut self.encoder {
            Encoder::Stored => {}
            Encoder::Zip(encoder) => {
                encoder.try_finish()?;
                self.framer.write(encoder.get_ref(), out);
                encoder.get_mut().clear();
            }
            Encoder::Zlib(encoder) => {
                encoder.try_finish()?;
                self.framer.write(encoder.get_ref(), out);
                encoder.get_mut().clear();
            }
        }
        self.framer.finish(out);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::{DeflateDecoder, ZlibDecoder};
    use pgpstream_core::packet::{body, parse_packets};
    use std::io::Read;

    fn compress(algorithm: CompressionAlgorithm, data: &[u8]) -> Vec<u8> {
        let mut stage = Compressor::new(algorithm, DEFAULT_COMPRESSION_LEVEL, 512).unwrap();
        let mut out = Vec::new();
        for piece in data.chunks(100) {
            stage.update(piece, &mut out).unwrap();
        }
        stage.finish(&mut out).unwrap();
        out
    }

    fn body_of(packet: &[u8]) -> Vec<u8> {
        let packets = parse_packets(packet).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].tag(), Tag::CompressedData);
        body(&packets[0]).unwrap()
    }

    fn sample() -> Vec<u8> {
        b"the quick brown fox jumps over the lazy dog. ".repeat(200)
    }

    #[test]
    fn test_zip_is_raw_deflate() {
        let data = sample();
        let body = body_of(&compress(CompressionAlgorithm::Zip, &data));
        assert_eq!(body[0], 1);
        assert!(body.len() < data.len());

        let mut inflated = Vec::new();
        DeflateDecoder::new(&body[1..]).read_to_end(&mut inflated).unwrap();
        assert_eq!(inflated, data);
    }

    #[test]
    fn test_zlib() {
        let data = sample();
        let body = body_of(&compress(CompressionAlgorithm::Zlib, &data));
        assert_eq!(body[0], 2);

        let mut inflated = Vec::new();
        ZlibDecoder::new(&body[1..]).read_to_end(&mut inflated).unwrap();
        assert_eq!(inflated, data);
    }

    #[test]
    fn test_uncompressed_passes_through() {
        let data = sample();
        let body = body_of(&compress(CompressionAlgorithm::Uncompressed, &data));
        assert_eq!(body[0], 0);
        assert_eq!(&body[1..], data.as_slice());
    }

    #[test]
    fn test_empty_input_still_finishes_stream() {
        let body = body_of(&compress(CompressionAlgorithm::Zip, b""));
        let mut inflated = Vec::new();
        DeflateDecoder::new(&body[1..]).read_to_end(&mut inflated).unwrap();
        assert!(inflated.is_empty());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("zip".parse::<CompressionAlgorithm>().unwrap(), CompressionAlgorithm::Zip);
        assert_eq!("ZLIB".parse::<CompressionAlgorithm>().unwrap(), CompressionAlgorithm::Zlib);
        assert_eq!(
            "uncompressed".parse::<CompressionAlgorithm>().unwrap(),
            CompressionAlgorithm::Uncompressed
        );
        assert!("bzip2".parse::<CompressionAlgorithm>().is_err());
        assert_eq!(CompressionAlgorithm::default(), CompressionAlgorithm::Zip);
    }

    #[test]
    fn test_rejects_level_out_of_range() {
        assert!(matches!(
            Compressor::new(CompressionAlgorithm::Zip, 10, 512),
            Err(PipelineError::InvalidOptions(_))
        ));
    }
}
