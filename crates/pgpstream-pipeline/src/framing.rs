//! Partial body length framing.
//!
//! Every packet the chain produces has an unknown length when it is opened,
//! so bodies go out as power-of-two partial chunks. A chunk is only emitted
//! while strictly more than one chunk is buffered, so a body always ends with
//! a definite-length part (possibly of length zero).

use pgpstream_core::packet::{encode_length, partial_length_octet, Tag};

use crate::error::{PipelineError, Result};

/// Default partial chunk size in octets.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Smallest chunk allowed; the first partial chunk must be at least this big.
pub const MIN_CHUNK_SIZE: usize = 512;

/// Buffers one packet body and frames it.
#[derive(Debug)]
pub struct PartialBodyWriter {
    tag: Tag,
    chunk_size: usize,
    chunk_octet: u8,
    buf: Vec<u8>,
    header_written: bool,
    finished: bool,
}

impl PartialBodyWriter {
    /// Frame a packet with `tag`, emitting chunks of `chunk_size` octets.
    pub fn new(tag: Tag, chunk_size: usize) -> Result<Self> {
        let chunk_octet = partial_length_octet(chunk_size)
            .filter(|_| chunk_size >= MIN_CHUNK_SIZE)
            .ok_or_else(|| {
                PipelineError::InvalidOptions(format!(
                    "chunk size {} is not a power of two of at least {}",
                    chunk_size, MIN_CHUNK_SIZE
                ))
            })?;
        Ok(Self {
            tag,
            chunk_size,
            chunk_octet,
            buf: Vec::with_capacity(chunk_size * 2),
            header_written: false,
            finished: false,
        })
    }

    /// Buffer body bytes without emitting anything. Used for the fixed
    /// fields a packet starts with, which are always shorter than a chunk.
    pub fn prime(&mut self, body: &[u8]) {
        self.buf.extend_from_slice(body);
    }

    /// Buffer body bytes and emit every complete chunk that is not the last.
    pub fn write(&mut self, body: &[u8], out: &mut Vec<u8>) {
        self.buf.extend_from_slice(body);

        let mut start = 0;
        while self.buf.len() - start > self.chunk_size {
            self.write_header(out);
            out.push(self.chunk_octet);
            out.extend_from_slice(&self.buf[start..start + self.chunk_size]);
            start += self.chunk_size;
        }
        if start > 0 {
            self.buf.drain(..start);
        }
    }

    /// Emit the remainder with a definite length. A body that never exceeded
    /// one chunk becomes a single definite-length packet.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if self.finished {
            return;
        }
        self.write_header(out);
        encode_length(out, self.buf.len() as u32);
        out.extend_from_slice(&self.buf);
        self.buf.clear();
        self.finished = true;
    }

    /// Octets buffered but not yet emitted.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn write_header(&mut self, out: &mut Vec<u8>) {
        if !self.header_written {
            out.push(self.tag.encode());
            self.header_written = true;
        }
    }
}
