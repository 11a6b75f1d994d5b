//! The key wrapper: writes the PKESK packet ahead of the encrypted data.

use pgpstream_core::{encrypt_session_key, PublicKey, SessionKey};
use std::io::Write;

use crate::error::{PipelineError, Result};
use crate::stage::StageKind;

/// Wraps the session key for the recipient and writes it straight to the
/// sink. It has no streaming part, so it never joins the stage stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyWrapper;

impl KeyWrapper {
    /// Always [`StageKind::KeyWrapper`].
    pub fn kind(&self) -> StageKind {
        StageKind::KeyWrapper
    }

    /// Encrypt `session_key` to `recipient` and write the packet to `sink`.
    ///
    /// Wrapping failures are `Core(CipherInit)`; a failing sink is `Io`.
    pub fn write_to<W: Write>(
        &self,
        recipient: &PublicKey,
        session_key: &SessionKey,
        sink: &mut W,
    ) -> Result<()> {
        let esk = encrypt_session_key(recipient, session_key)?;
        sink.write_all(&esk.to_packet()?).map_err(PipelineError::Io)
    }
}
