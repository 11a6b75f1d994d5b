//! Golden framing vectors.
//!
//! The encrypted layers are randomized, but the literal and stored
//! compression layers underneath are fully deterministic. These vectors pin
//! their exact bytes so framing changes show up as vector failures.

use pgpstream_core::packet::{body, parse_packets};
use pgpstream_core::Tag;
use pgpstream_pipeline::literal::literal_header;
use pgpstream_pipeline::{CompressionAlgorithm, Compressor, LiteralFramer, Stage};

/// Which layers a vector runs through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layers {
    /// The literal packet alone.
    Literal,
    /// The literal packet inside a stored (algorithm 0) compressed packet.
    StoredCompression,
}

/// A golden framing vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Layers to run.
    pub layers: Layers,
    /// Literal packet name.
    pub file_name: &'static str,
    /// Literal packet timestamp.
    pub modified: u32,
    /// Payload unit, repeated `repeat` times.
    pub payload: &'static [u8],
    /// Repetitions of `payload`.
    pub repeat: usize,
    /// Partial chunk size.
    pub chunk_size: usize,
    /// Expected leading bytes of the output (hex).
    pub expected_head: &'static str,
    /// Expected total output length.
    pub expected_len: usize,
}

impl GoldenVector {
    /// The full payload.
    pub fn payload(&self) -> Vec<u8> {
        self.payload.repeat(self.repeat)
    }
}

/// Get all golden vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "Empty payload, one-letter name",
            layers: Layers::Literal,
            file_name: "a",
            modified: 0,
            payload: b"",
            repeat: 0,
            chunk_size: 512,
            expected_head: "cb0762016100000000",
            expected_len: 9,
        },
        GoldenVector {
            name: "Short payload with name and timestamp",
            layers: Layers::Literal,
            file_name: "result",
            modified: 1_700_000_000,
            payload: b"hello",
            repeat: 1,
            chunk_size: 512,
            expected_head: "cb116206726573756c746553f10068656c6c6f",
            expected_len: 19,
        },
        GoldenVector {
            name: "Body one octet over a chunk",
            layers: Layers::Literal,
            file_name: "",
            modified: 0,
            payload: &[0xab],
            repeat: 507,
            chunk_size: 512,
            expected_head: "cbe9620000000000abab",
            expected_len: 516,
        },
        GoldenVector {
            name: "Remainder needs a two-octet length",
            layers: Layers::Literal,
            file_name: "",
            modified: 0,
            payload: &[0x00],
            repeat: 2000,
            chunk_size: 1024,
            expected_head: "cbea6200000000000000",
            expected_len: 2010,
        },
        GoldenVector {
            name: "Stored compression around an empty literal",
            layers: Layers::StoredCompression,
            file_name: "",
            modified: 0,
            payload: b"",
            repeat: 0,
            chunk_size: 512,
            expected_head: "c80900cb06620000000000",
            expected_len: 11,
        },
    ]
}

/// Run a vector's payload through its layers, writing the payload in
/// pieces of `piece` octets.
pub fn frame_vector(vector: &GoldenVector, piece: usize) -> Vec<u8> {
    let payload = vector.payload();
    let mut literal = LiteralFramer::new(vector.file_name, vector.modified, vector.chunk_size)
        .expect("vector chunk size is valid");
    let mut literal_out = Vec::new();
    for part in payload.chunks(piece.max(1)) {
        literal.update(part, &mut literal_out).expect("literal update");
    }
    literal.finish(&mut literal_out).expect("literal finish");

    match vector.layers {
        Layers::Literal => literal_out,
        Layers::StoredCompression => {
            let mut stored = Compressor::new(CompressionAlgorithm::Uncompressed, 0, vector.chunk_size)
                .expect("vector chunk size is valid");
            let mut out = Vec::new();
            stored.update(&literal_out, &mut out).expect("stored update");
            stored.finish(&mut out).expect("stored finish");
            out
        }
    }
}

fn single_body(bytes: &[u8], tag: Tag) -> Result<Vec<u8>, String> {
    let packets = parse_packets(bytes).map_err(|e| e.to_string())?;
    match packets.as_slice() {
        [packet] if packet.tag() == tag => body(packet).map_err(|e| e.to_string()),
        other => Err(format!("expected one {:?} packet, found {}", tag, other.len())),
    }
}

/// Check one vector: exact head and length, and the body parses back.
pub fn verify_vector(vector: &GoldenVector) -> Result<(), String> {
    for piece in [1, 7, 512, usize::MAX] {
        let out = frame_vector(vector, piece);
        let head = hex::encode(&out[..out.len().min(vector.expected_head.len() / 2)]);
        if head != vector.expected_head {
            return Err(format!("piece {}: head {} != {}", piece, head, vector.expected_head));
        }
        if out.len() != vector.expected_len {
            return Err(format!(
                "piece {}: length {} != {}",
                piece,
                out.len(),
                vector.expected_len
            ));
        }

        let literal = match vector.layers {
            Layers::Literal => out,
            Layers::StoredCompression => {
                let body = single_body(&out, Tag::CompressedData)?;
                if body.first() != Some(&0) {
                    return Err("stored packet must carry algorithm 0".into());
                }
                body[1..].to_vec()
            }
        };
        let body = single_body(&literal, Tag::LiteralData)?;
        let mut expected = literal_header(vector.file_name, vector.modified);
        expected.extend_from_slice(&vector.payload());
        if body != expected {
            return Err(format!("piece {}: literal body differs", piece));
        }
    }
    Ok(())
}

/// Verify all golden vectors.
///
/// Returns a list of (name, passed, message) tuples.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|vector| match verify_vector(vector) {
            Ok(()) => (vector.name.to_string(), true, "ok".to_string()),
            Err(msg) => (vector.name.to_string(), false, msg),
        })
        .collect()
}
