//! The stage abstraction.
//!
//! A stage is a transform: bytes written to it come out, framed or
//! compressed or encrypted, appended to an output buffer. The chain routes
//! one stage's output into the next, so stages never own each other.

use std::fmt;
use std::io;

/// The four layers of an encrypted message, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Writes the PKESK packet.
    KeyWrapper,
    /// Produces the SEIPD packet.
    SymmetricEncryptor,
    /// Produces the compressed data packet.
    Compressor,
    /// Produces the literal data packet.
    LiteralFramer,
}

impl StageKind {
    /// Short name for logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::KeyWrapper => "key-wrapper",
            Self::SymmetricEncryptor => "symmetric-encryptor",
            Self::Compressor => "compressor",
            Self::LiteralFramer => "literal-framer",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A streaming transform in the chain.
pub trait Stage: Send {
    /// Which layer this is.
    fn kind(&self) -> StageKind;

    /// Consume `input` and append whatever output is ready to `out`.
    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> io::Result<()>;

    /// Flush everything still buffered and the stage trailer into `out`.
    /// Called exactly once, after the last `update`.
    fn finish(&mut self, out: &mut Vec<u8>) -> io::Result<()>;
}
