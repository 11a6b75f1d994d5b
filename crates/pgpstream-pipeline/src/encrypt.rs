//! Symmetrically encrypted and integrity protected data packet (tag 18, v1).
//!
//! The body is a version octet followed by OpenPGP CFB ciphertext of
//!
//! ```text
//! prefix (16 random octets) || prefix[14..16] || data || D3 14 || SHA-1
//! ```
//!
//! where the SHA-1 (the modification detection code) covers everything
//! before it, including the `D3 14` packet header.

use pgpstream_core::crypto::{random_bytes, BLOCK_SIZE};
use pgpstream_core::packet::Tag;
use pgpstream_core::{CfbEncryptor, SessionKey};
use sha1::{Digest, Sha1};
use std::fmt;
use std::io;

use crate::error::Result;
use crate::framing::PartialBodyWriter;
use crate::stage::{Stage, StageKind};

/// SEIPD packet version.
pub const SEIPD_VERSION: u8 = 1;

/// Header of the trailing modification detection code packet.
pub const MDC_HEADER: [u8; 2] = [0xd3, 0x14];

/// Outermost transform: encrypts compressed packets under the session key.
pub struct SymmetricEncryptor {
    cfb: CfbEncryptor,
    mdc: Sha1,
    framer: PartialBodyWriter,
    scratch: Vec<u8>,
}

impl SymmetricEncryptor {
    /// Key the cipher and emit the encrypted random prefix.
    pub fn new(session_key: &SessionKey, chunk_size: usize) -> Result<Self> {
        let mut cfb = session_key.encryptor()?;
        let mut framer = PartialBodyWriter::new(Tag::SymEncryptedProtectedData, chunk_size)?;
        let mut mdc = Sha1::new();

        let mut prefix = random_bytes(BLOCK_SIZE)?;
        prefix.extend_from_within(BLOCK_SIZE - 2..);
        mdc.update(&prefix);
        cfb.encrypt(&mut prefix);

        framer.prime(&[SEIPD_VERSION]);
        framer.prime(&prefix);

        Ok(Self {
            cfb,
            mdc,
            framer,
            scratch: Vec::new(),
        })
    }
}

impl fmt::Debug for SymmetricEncryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricEncryptor")
            .field("framer", &self.framer)
            .finish_non_exhaustive()
    }
}

impl Stage for SymmetricEncryptor {
    fn kind(&self) -> StageKind {
        StageKind::SymmetricEncryptor
    }

    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
        self.mdc.update(input);
        self.scratch.clear();
        self.scratch.extend_from_slice(input);
        self.cfb.encrypt(&mut self.scratch);
        self.framer.write(&self.scratch, out);
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> io::Result<()> {
        self.mdc.update(MDC_HEADER);
        let digest = self.mdc.finalize_reset();

        let mut trailer = Vec::with_capacity(22);
        trailer.extend_from_slice(&MDC_HEADER);
        trailer.extend_from_slice(&digest);
        self.cfb.encrypt(&mut trailer);

        self.framer.write(&trailer, out);
        self.framer.finish(out);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgpstream_core::packet::{body, parse_packets};
    use pgpstream_core::SymmetricAlgorithm;

    fn session_key() -> SessionKey {
        SessionKey::from_bytes(SymmetricAlgorithm::Aes256, &[0x42; 32]).unwrap()
    }

    fn encrypt(data: &[u8]) -> Vec<u8> {
        let mut stage = SymmetricEncryptor::new(&session_key(), 512).unwrap();
        let mut out = Vec::new();
        for piece in data.chunks(333) {
            stage.update(piece, &mut out).unwrap();
        }
        stage.finish(&mut out).unwrap();
        out
    }

    fn decrypt_body(packet: &[u8]) -> Vec<u8> {
        let packets = parse_packets(packet).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].tag(), Tag::SymEncryptedProtectedData);
        let body = body(&packets[0]).unwrap();
        assert_eq!(body[0], SEIPD_VERSION);

        let mut plain = body[1..].to_vec();
        session_key().decryptor().unwrap().decrypt(&mut plain);
        plain
    }

    #[test]
    fn test_prefix_check_bytes_and_mdc() {
        let data = vec![0x5c; 2000];
        let plain = decrypt_body(&encrypt(&data));

        assert_eq!(plain.len(), 18 + data.len() + 22);
        assert_eq!(plain[14..16], plain[16..18]);
        assert_eq!(&plain[18..18 + data.len()], data.as_slice());

        let (covered, digest) = plain.split_at(plain.len() - 20);
        assert_eq!(&covered[covered.len() - 2..], &MDC_HEADER);
        assert_eq!(Sha1::digest(covered).as_slice(), digest);
    }

    #[test]
    fn test_empty_data() {
        let plain = decrypt_body(&encrypt(b""));
        assert_eq!(plain.len(), 18 + 22);
    }

    #[test]
    fn test_random_prefix_differs_per_stage() {
        assert_ne!(encrypt(b"same"), encrypt(b"same"));
    }
}
