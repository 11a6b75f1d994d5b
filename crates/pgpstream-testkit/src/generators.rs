//! Proptest generators for property-based testing.

use proptest::prelude::*;

use pgpstream_pipeline::{ChainOptions, CompressionAlgorithm, MIN_CHUNK_SIZE};

use crate::fixtures::{KeyFixture, DEFAULT_CREATED};

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a payload that compresses well: a short pattern repeated.
pub fn repetitive_payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    (prop::collection::vec(any::<u8>(), 1..=16), 0..=max_len)
        .prop_map(|(pattern, len)| pattern.iter().copied().cycle().take(len).collect())
}

/// Generate write sizes: how a caller slices a payload into `write` calls.
pub fn write_pattern() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..=2048, 1..=8)
}

/// Split `data` by cycling through `sizes`.
pub fn split<'a>(data: &'a [u8], sizes: &[usize]) -> Vec<&'a [u8]> {
    let mut pieces = Vec::new();
    let mut rest = data;
    let mut sizes = sizes.iter().copied().filter(|&s| s > 0).cycle();
    while !rest.is_empty() {
        let size = sizes.next().unwrap_or(rest.len()).min(rest.len());
        let (piece, tail) = rest.split_at(size);
        pieces.push(piece);
        rest = tail;
    }
    pieces
}

/// Generate a compression algorithm.
pub fn compression() -> impl Strategy<Value = CompressionAlgorithm> {
    prop_oneof![
        Just(CompressionAlgorithm::Uncompressed),
        Just(CompressionAlgorithm::Zip),
        Just(CompressionAlgorithm::Zlib),
    ]
}

/// Generate a valid partial chunk size, 512 to 8192.
pub fn chunk_size() -> impl Strategy<Value = usize> {
    (0u32..=4).prop_map(|shift| MIN_CHUNK_SIZE << shift)
}

/// Generate valid chain options with a fixed modification time.
pub fn chain_options() -> impl Strategy<Value = ChainOptions> {
    (compression(), 0u32..=9, chunk_size(), any::<u32>()).prop_map(
        |(compression, compression_level, chunk_size, time)| ChainOptions {
            compression,
            compression_level,
            chunk_size,
            modification_time: Some(time),
        },
    )
}

/// Generate a literal packet name, sometimes longer than fits.
pub fn label() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-z0-9._-]{0,31}".prop_map(String::from),
        "\\PC{200,300}".prop_map(String::from),
    ]
}

/// Generate a Curve25519 recipient (native X25519 or legacy ECDH).
pub fn curve25519_key() -> impl Strategy<Value = KeyFixture> {
    (any::<[u8; 32]>(), any::<bool>()).prop_map(|(seed, native)| {
        if native {
            KeyFixture::x25519(seed, DEFAULT_CREATED)
        } else {
            KeyFixture::cv25519(seed, DEFAULT_CREATED)
        }
    })
}
