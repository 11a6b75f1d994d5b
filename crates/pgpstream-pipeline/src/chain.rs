//! The stage chain: opens the four stages in order, routes payload bytes
//! through them and closes them in reverse.
//!
//! Open order is KeyWrapper, SymmetricEncryptor, Compressor, LiteralFramer.
//! The key wrapper writes its packet to the sink during open; the other three
//! sit on a stack, outermost at the bottom. Payload enters the top of the
//! stack and leaves the bottom into the sink. Closing pops the stack, so the
//! close order is LiteralFramer, Compressor, SymmetricEncryptor, and each
//! trailer is routed through the stages still open below it.
//!
//! The chain never closes the sink.

use pgpstream_core::{PublicKey, SessionKey, SymmetricAlgorithm};
use std::fmt;
use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::compress::{CompressionAlgorithm, Compressor, DEFAULT_COMPRESSION_LEVEL};
use crate::encrypt::SymmetricEncryptor;
use crate::error::{PipelineError, Result};
use crate::framing::{PartialBodyWriter, DEFAULT_CHUNK_SIZE};
use crate::keywrap::KeyWrapper;
use crate::literal::LiteralFramer;
use crate::observer::{NoopObserver, StageObserver};
use crate::stage::{Stage, StageKind};

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

/// Tunables for one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOptions {
    /// Compression of the literal packet.
    pub compression: CompressionAlgorithm,
    /// Deflate level, 0-9.
    pub compression_level: u32,
    /// Partial body chunk size: a power of two, at least 512.
    pub chunk_size: usize,
    /// Literal packet timestamp; `None` means the time of `open`.
    pub modification_time: Option<u32>,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            compression: CompressionAlgorithm::default(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            chunk_size: DEFAULT_CHUNK_SIZE,
            modification_time: None,
        }
    }
}

impl ChainOptions {
    /// Check every field without opening anything.
    pub fn validate(&self) -> Result<()> {
        if self.compression_level > 9 {
            return Err(PipelineError::InvalidOptions(format!(
                "compression level {} is out of range 0-9",
                self.compression_level
            )));
        }
        PartialBodyWriter::new(pgpstream_core::Tag::LiteralData, self.chunk_size)?;
        Ok(())
    }

    fn timestamp(&self) -> u32 {
        self.modification_time.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
                .unwrap_or(0)
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Chain
// ─────────────────────────────────────────────────────────────────────────────

/// Where a chain is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// Not opened yet.
    Ready,
    /// Accepting payload.
    Open,
    /// Closed; further writes fail and further closes do nothing.
    Closed,
}

/// The open stages, outermost first.
struct StageStack(Vec<Box<dyn Stage>>);

impl Drop for StageStack {
    fn drop(&mut self) {
        if !self.0.is_empty() {
            let open: Vec<StageKind> = self.0.iter().map(|s| s.kind()).collect();
            tracing::warn!(
                stages = ?open,
                "stage chain dropped while open; stages released without writing trailers"
            );
        }
    }
}

/// A layered encryption pipeline writing into `W`.
pub struct StageChain<W: Write> {
    sink: W,
    stages: StageStack,
    state: ChainState,
    poisoned: bool,
    observer: Box<dyn StageObserver>,
    front: Vec<u8>,
    back: Vec<u8>,
}

impl<W: Write> StageChain<W> {
    /// Create an unopened chain over `sink`.
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            stages: StageStack(Vec::with_capacity(3)),
            state: ChainState::Ready,
            poisoned: false,
            observer: Box::new(NoopObserver),
            front: Vec::new(),
            back: Vec::new(),
        }
    }

    /// Report stage opens and closes to `observer`.
    pub fn with_observer(mut self, observer: impl StageObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChainState {
        self.state
    }

    /// Whether payload can be written.
    pub fn is_open(&self) -> bool {
        self.state == ChainState::Open
    }

    /// Whether an earlier failure has stopped all output.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// The sink.
    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// The sink, mutably. Writing to it directly corrupts an open message.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Give back the sink. An open chain is released without trailers.
    pub fn into_inner(self) -> W {
        let Self { sink, stages, .. } = self;
        drop(stages);
        sink
    }

    /// Open every stage for `recipient`.
    ///
    /// The chain only becomes `Open` once all stages are in place. On failure
    /// the stages opened so far are released without writing and the chain
    /// is `Closed`; a sink failure also poisons it.
    pub fn open(
        &mut self,
        recipient: &PublicKey,
        payload_label: &str,
        options: &ChainOptions,
    ) -> Result<()> {
        if self.state != ChainState::Ready {
            return Err(PipelineError::InvalidState(format!(
                "chain cannot be opened while {:?}",
                self.state
            )));
        }
        options.validate()?;

        tracing::debug!(
            recipient = %recipient.key_id(),
            algorithm = ?recipient.algorithm(),
            label = payload_label,
            compression = %options.compression,
            "opening stage chain"
        );

        match self.open_stages(recipient, payload_label, options) {
            Ok(()) => {
                self.state = ChainState::Open;
                Ok(())
            }
            Err(e) => {
                if e.is_io() {
                    self.poisoned = true;
                }
                self.release();
                self.state = ChainState::Closed;
                Err(e)
            }
        }
    }

    fn open_stages(
        &mut self,
        recipient: &PublicKey,
        payload_label: &str,
        options: &ChainOptions,
    ) -> Result<()> {
        let session_key = SessionKey::generate(SymmetricAlgorithm::Aes256)?;

        let wrapper = KeyWrapper;
        self.report_opened(wrapper.kind());
        wrapper.write_to(recipient, &session_key, &mut self.sink)?;

        let encryptor = SymmetricEncryptor::new(&session_key, options.chunk_size)?;
        self.push(Box::new(encryptor));
        drop(session_key);

        let compressor = Compressor::new(
            options.compression,
            options.compression_level,
            options.chunk_size,
        )?;
        self.push(Box::new(compressor));

        let literal = LiteralFramer::new(payload_label, options.timestamp(), options.chunk_size)?;
        self.push(Box::new(literal));

        Ok(())
    }

    /// Drop every open stage without writing its trailer.
    fn release(&mut self) {
        while let Some(stage) = self.stages.0.pop() {
            let kind = stage.kind();
            drop(stage);
            self.report_closed(kind);
        }
    }

    /// Close every open stage, innermost first. Never closes the sink.
    ///
    /// Returns the first failure; the remaining stages are then released
    /// without writing. A chain poisoned by an earlier failure releases its
    /// stages and returns `Ok`. Calling `close` again does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.state == ChainState::Closed {
            return Ok(());
        }
        self.state = ChainState::Closed;

        let mut first_error: Option<io::Error> = None;
        let mut trailer = Vec::new();

        while let Some(mut stage) = self.stages.0.pop() {
            let kind = stage.kind();
            if !self.poisoned {
                trailer.clear();
                let result = stage.finish(&mut trailer).and_then(|()| {
                    route(
                        &mut self.stages.0,
                        &mut self.sink,
                        &trailer,
                        &mut self.front,
                        &mut self.back,
                    )
                });
                if let Err(e) = result {
                    tracing::debug!(stage = %kind, error = %e, "stage close failed");
                    self.poisoned = true;
                    first_error = Some(e);
                }
            }
            drop(stage);
            self.report_closed(kind);
        }

        match first_error {
            Some(e) => Err(PipelineError::Io(e)),
            None => Ok(()),
        }
    }

    fn push(&mut self, stage: Box<dyn Stage>) {
        self.report_opened(stage.kind());
        self.stages.0.push(stage);
    }

    fn report_opened(&mut self, kind: StageKind) {
        tracing::trace!(stage = %kind, "stage opened");
        self.observer.opened(kind);
    }

    fn report_closed(&mut self, kind: StageKind) {
        tracing::trace!(stage = %kind, "stage closed");
        self.observer.closed(kind);
    }
}

/// Feed `data` into the innermost of `stages` and pass each stage's output
/// outward; whatever leaves the outermost stage goes to `sink`.
fn route<W: Write>(
    stages: &mut [Box<dyn Stage>],
    sink: &mut W,
    data: &[u8],
    front: &mut Vec<u8>,
    back: &mut Vec<u8>,
) -> io::Result<()> {
    let mut stages = stages.iter_mut().rev();
    let Some(innermost) = stages.next() else {
        return sink.write_all(data);
    };

    front.clear();
    innermost.update(data, front)?;
    for stage in stages {
        if front.is_empty() {
            return Ok(());
        }
        back.clear();
        stage.update(front, back)?;
        std::mem::swap(front, back);
    }

    if front.is_empty() {
        Ok(())
    } else {
        sink.write_all(front)
    }
}

impl<W: Write> Write for StageChain<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.state != ChainState::Open {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("stage chain is not open ({:?})", self.state),
            ));
        }
        if self.poisoned {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "stage chain stopped after an earlier failure",
            ));
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if self.stages.0.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "stage chain has no open stages",
            ));
        }

        let result = route(
            &mut self.stages.0,
            &mut self.sink,
            buf,
            &mut self.front,
            &mut self.back,
        );
        match result {
            Ok(()) => Ok(buf.len()),
            Err(e) => {
                self.poisoned = true;
                Err(e)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

impl<W: Write> fmt::Debug for StageChain<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stages: Vec<StageKind> = self.stages.0.iter().map(|s| s.kind()).collect();
        f.debug_struct("StageChain")
            .field("state", &self.state)
            .field("poisoned", &self.poisoned)
            .field("stages", &stages)
            .finish_non_exhaustive()
    }
}
