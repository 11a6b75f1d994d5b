//! One encrypted message: a chain plus its lifecycle.

use pgpstream_core::PublicKey;
use std::fmt;
use std::io::{self, Write};

use crate::chain::{ChainOptions, StageChain};
use crate::error::{PipelineError, Result};
use crate::observer::StageObserver;

/// Literal packet name used when none is configured.
pub const DEFAULT_LABEL: &str = "result";

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not started.
    Idle,
    /// Started; payload goes through [`PayloadSink`].
    Open,
    /// Closed, or failed to start.
    Closed,
}

/// Encrypts one payload for one recipient into `W`.
pub struct EncryptionSession<W: Write> {
    chain: StageChain<W>,
    state: SessionState,
    label: String,
    options: ChainOptions,
}

impl<W: Write> EncryptionSession<W> {
    /// A session writing to `sink` with default options and label.
    pub fn new(sink: W) -> Self {
        Self {
            chain: StageChain::new(sink),
            state: SessionState::Idle,
            label: DEFAULT_LABEL.to_string(),
            options: ChainOptions::default(),
        }
    }

    /// Set the literal packet name.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the chain options.
    pub fn with_options(mut self, options: ChainOptions) -> Self {
        self.options = options;
        self
    }

    /// Report stage lifecycle events to `observer`.
    pub fn with_observer(mut self, observer: impl StageObserver + 'static) -> Self {
        self.chain = self.chain.with_observer(observer);
        self
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Open the chain for `recipient` and hand out the payload sink.
    ///
    /// On failure whatever was opened is closed best-effort and the session
    /// is `Closed`.
    pub fn start(&mut self, recipient: &PublicKey) -> Result<PayloadSink<'_, W>> {
        if self.state != SessionState::Idle {
            return Err(PipelineError::InvalidState(format!(
                "session cannot start while {:?}",
                self.state
            )));
        }

        if let Err(e) = self.chain.open(recipient, &self.label, &self.options) {
            if let Err(close_err) = self.chain.close() {
                tracing::debug!(error = %close_err, "cleanup after failed start also failed");
            }
            self.state = SessionState::Closed;
            return Err(e);
        }

        self.state = SessionState::Open;
        Ok(PayloadSink {
            chain: &mut self.chain,
        })
    }

    /// Borrow the payload sink of a started session again.
    pub fn payload(&mut self) -> Result<PayloadSink<'_, W>> {
        if self.state != SessionState::Open {
            return Err(PipelineError::InvalidState(format!(
                "no payload sink while {:?}",
                self.state
            )));
        }
        Ok(PayloadSink {
            chain: &mut self.chain,
        })
    }

    /// Close the chain, writing every trailer. Does not close the sink.
    /// Idempotent: only the first call can fail.
    pub fn close(&mut self) -> Result<()> {
        let was = self.state;
        self.state = SessionState::Closed;
        match was {
            SessionState::Open => self.chain.close(),
            SessionState::Idle | SessionState::Closed => Ok(()),
        }
    }

    /// [`close`](Self::close), then flush the sink.
    pub fn finish(&mut self) -> Result<()> {
        self.close()?;
        self.chain.flush()?;
        Ok(())
    }

    /// The sink.
    pub fn get_ref(&self) -> &W {
        self.chain.get_ref()
    }

    /// Give back the sink. An open session is released without trailers.
    pub fn into_inner(self) -> W {
        self.chain.into_inner()
    }
}

impl<W: Write> fmt::Debug for EncryptionSession<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionSession")
            .field("state", &self.state)
            .field("label", &self.label)
            .field("chain", &self.chain)
            .finish()
    }
}

/// Where plaintext goes: the top of an open chain.
pub struct PayloadSink<'a, W: Write> {
    chain: &'a mut StageChain<W>,
}

impl<W: Write> Write for PayloadSink<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.chain.write(buf)
    }

    /// Flushes the sink only; stage buffers are emitted on close.
    fn flush(&mut self) -> io::Result<()> {
        self.chain.flush()
    }
}

impl<W: Write> fmt::Debug for PayloadSink<'_, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PayloadSink").field(&self.chain).finish()
    }
}

/// Encrypt `data` for `recipient` in one call.
pub fn encrypt_to_vec(recipient: &PublicKey, label: &str, data: &[u8]) -> Result<Vec<u8>> {
    let mut session = EncryptionSession::new(Vec::new()).with_label(label);
    session.start(recipient)?.write_all(data)?;
    session.finish()?;
    Ok(session.into_inner())
}
