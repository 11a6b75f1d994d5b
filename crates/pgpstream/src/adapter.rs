//! Adapter between a host that produces output files and the encryption
//! session: every file the host opens gets its own encrypted message.

use pgpstream_core::PublicKey;
use pgpstream_pipeline::{ChainOptions, EncryptionSession, PayloadSink, PipelineError};
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::EncoderConfig;
use crate::error::{EncoderError, Result};
use crate::resolver::resolve_key;

// ─────────────────────────────────────────────────────────────────────────────
// Host
// ─────────────────────────────────────────────────────────────────────────────

/// A host output that is a sequence of files.
///
/// Writes go to the current file.
pub trait FileOutput: Write {
    /// Start the next file.
    fn next_file(&mut self) -> io::Result<()>;

    /// All files are complete; flush whatever is pending.
    fn finish(&mut self) -> io::Result<()>;

    /// Release the output.
    fn close(&mut self) -> io::Result<()>;
}

/// Writes each file to `<dir>/<prefix><NNN><extension>`, numbered from 000.
pub struct DirectoryFileOutput {
    dir: PathBuf,
    prefix: String,
    extension: String,
    current: Option<BufWriter<File>>,
    paths: Vec<PathBuf>,
}

impl DirectoryFileOutput {
    /// Files go in `dir`, which must exist.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            extension: extension.into(),
            current: None,
            paths: Vec::new(),
        }
    }

    /// The directory files are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every file started so far, in order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn end_file(&mut self) -> io::Result<()> {
        match self.current.take() {
            Some(mut file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Write for DirectoryFileOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.current.as_mut() {
            Some(file) => file.write(buf),
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                "no output file is open; call next_file first",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.current.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl FileOutput for DirectoryFileOutput {
    fn next_file(&mut self) -> io::Result<()> {
        self.end_file()?;
        let name = format!("{}{:03}{}", self.prefix, self.paths.len(), self.extension);
        let path = self.dir.join(name);
        let file = File::create(&path)?;
        tracing::debug!(path = %path.display(), "output file started");
        self.current = Some(BufWriter::new(file));
        self.paths.push(path);
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        self.end_file()
    }
}

impl fmt::Debug for DirectoryFileOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryFileOutput")
            .field("dir", &self.dir)
            .field("files", &self.paths.len())
            .field("open", &self.current.is_some())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Adapter
// ─────────────────────────────────────────────────────────────────────────────

enum Slot<F: FileOutput> {
    /// Between files.
    Idle(F),
    /// A file is being encrypted.
    Active(EncryptionSession<F>),
    /// `close` has run.
    Closed(F),
    /// Only observable while a transition is in progress.
    Released,
}

/// Encrypts every file of a host output for one recipient.
///
/// At most one session is active; opening the next file closes the current
/// one first.
pub struct EncryptingFileOutput<F: FileOutput> {
    slot: Slot<F>,
    recipient: Arc<PublicKey>,
    label: String,
    options: ChainOptions,
    files: usize,
}

impl<F: FileOutput> EncryptingFileOutput<F> {
    /// Wrap `host`, encrypting to `recipient`.
    pub fn new(host: F, recipient: Arc<PublicKey>, label: impl Into<String>, options: ChainOptions) -> Self {
        Self {
            slot: Slot::Idle(host),
            recipient,
            label: label.into(),
            options,
            files: 0,
        }
    }

    /// Close the current file's session, start the next host file and open
    /// a new session on it.
    pub fn open_next(&mut self) -> Result<PayloadSink<'_, F>> {
        self.end_session()?;

        let mut host = match std::mem::replace(&mut self.slot, Slot::Released) {
            Slot::Idle(host) => host,
            other => {
                self.slot = other;
                return Err(closed_error());
            }
        };

        if let Err(e) = host.next_file() {
            self.slot = Slot::Idle(host);
            return Err(e.into());
        }

        let mut session = EncryptionSession::new(host)
            .with_label(self.label.clone())
            .with_options(self.options.clone());
        let started = session.start(&self.recipient).map(|_| ());
        if let Err(e) = started {
            self.slot = Slot::Idle(session.into_inner());
            return Err(e.into());
        }

        self.files += 1;
        tracing::debug!(file = self.files, "encrypting next output file");
        self.slot = Slot::Active(session);
        self.payload()
    }

    /// The payload sink of the current file.
    pub fn payload(&mut self) -> Result<PayloadSink<'_, F>> {
        match &mut self.slot {
            Slot::Active(session) => Ok(session.payload()?),
            _ => Err(PipelineError::InvalidState("no output file is open".into()).into()),
        }
    }

    /// Close the current session, then finish the host. A session failure
    /// is returned before the host is touched.
    pub fn finish(&mut self) -> Result<()> {
        self.end_session()?;
        match &mut self.slot {
            Slot::Idle(host) => Ok(host.finish()?),
            _ => Err(closed_error()),
        }
    }

    /// Close the current session best-effort, then close the host. Returns
    /// the first failure. Calling `close` again does nothing.
    pub fn close(&mut self) -> Result<()> {
        let session_result = self.end_session();
        if let Err(e) = &session_result {
            tracing::warn!(error = %e, "closing active session failed");
        }

        let host_result = match std::mem::replace(&mut self.slot, Slot::Released) {
            Slot::Idle(mut host) => {
                let result = host.close();
                self.slot = Slot::Closed(host);
                result.map_err(EncoderError::from)
            }
            other => {
                self.slot = other;
                Ok(())
            }
        };

        session_result.and(host_result)
    }

    /// Number of files opened so far.
    pub fn files(&self) -> usize {
        self.files
    }

    /// Whether a file is currently being encrypted.
    pub fn is_active(&self) -> bool {
        matches!(self.slot, Slot::Active(_))
    }

    /// The recipient key.
    pub fn recipient(&self) -> &PublicKey {
        &self.recipient
    }

    /// Give back the host. An active session is released without trailers.
    pub fn into_host(self) -> Option<F> {
        match self.slot {
            Slot::Idle(host) | Slot::Closed(host) => Some(host),
            Slot::Active(session) => Some(session.into_inner()),
            Slot::Released => None,
        }
    }

    fn end_session(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.slot, Slot::Released) {
            Slot::Active(mut session) => {
                let result = session.close();
                self.slot = Slot::Idle(session.into_inner());
                result.map_err(EncoderError::from)
            }
            other => {
                self.slot = other;
                Ok(())
            }
        }
    }
}

fn closed_error() -> EncoderError {
    PipelineError::InvalidState("output is closed".into()).into()
}

impl<F: FileOutput> fmt::Debug for EncryptingFileOutput<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = match self.slot {
            Slot::Idle(_) => "idle",
            Slot::Active(_) => "active",
            Slot::Closed(_) => "closed",
            Slot::Released => "released",
        };
        f.debug_struct("EncryptingFileOutput")
            .field("slot", &slot)
            .field("recipient", &self.recipient.key_id())
            .field("files", &self.files)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Encoder
// ─────────────────────────────────────────────────────────────────────────────

/// A configured encoder: the recipient is resolved once and shared by every
/// output it opens.
#[derive(Debug, Clone)]
pub struct Encoder {
    config: EncoderConfig,
    options: ChainOptions,
    recipient: Arc<PublicKey>,
}

impl Encoder {
    /// Validate `config` and resolve its recipient key.
    pub fn new(config: EncoderConfig) -> Result<Self> {
        config.validate()?;
        let recipient = Arc::new(resolve_key(&config)?);
        Self::with_recipient(config, recipient)
    }

    /// Use an already resolved recipient instead of reading the key ring.
    pub fn with_recipient(config: EncoderConfig, recipient: Arc<PublicKey>) -> Result<Self> {
        let options = config.chain_options()?;
        Ok(Self {
            config,
            options,
            recipient,
        })
    }

    /// Wrap a host output.
    pub fn open<F: FileOutput>(&self, host: F) -> EncryptingFileOutput<F> {
        EncryptingFileOutput::new(
            host,
            Arc::clone(&self.recipient),
            self.config.file_name.clone(),
            self.options.clone(),
        )
    }

    /// The resolved recipient.
    pub fn recipient(&self) -> &Arc<PublicKey> {
        &self.recipient
    }

    /// The configuration.
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }
}
