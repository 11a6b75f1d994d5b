//! Sinks and observers for failure and ordering tests.

use pgpstream_pipeline::{StageKind, StageObserver};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Accepts `budget` bytes in total, then fails every write that would
/// exceed it. A write that would cross the budget writes nothing.
#[derive(Debug, Clone)]
pub struct FailingSink {
    written: Vec<u8>,
    budget: usize,
    failures: usize,
}

impl FailingSink {
    /// A sink that fails once more than `budget` bytes are offered.
    pub fn new(budget: usize) -> Self {
        Self {
            written: Vec::new(),
            budget,
            failures: 0,
        }
    }

    /// Everything accepted so far.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Number of rejected writes.
    pub fn failures(&self) -> usize {
        self.failures
    }
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written.len() + buf.len() > self.budget {
            self.failures += 1;
            return Err(io::Error::new(io::ErrorKind::Other, "sink budget exhausted"));
        }
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A `Vec<u8>` sink whose contents stay readable after the sink is moved
/// into a chain.
#[derive(Debug, Clone, Default)]
pub struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything written.
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Number of bytes written.
    pub fn len(&self) -> usize {
        self.0.lock().map(|v| v.len()).unwrap_or(0)
    }

    /// Whether nothing was written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "shared sink poisoned"))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A stage lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent {
    /// The stage was opened.
    Opened(StageKind),
    /// The stage was closed or released.
    Closed(StageKind),
}

/// Records every stage event; clones share one log.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver(Arc<Mutex<Vec<StageEvent>>>);

impl RecordingObserver {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event so far, in order.
    pub fn events(&self) -> Vec<StageEvent> {
        self.0.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Kinds in open order.
    pub fn opened(&self) -> Vec<StageKind> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StageEvent::Opened(kind) => Some(kind),
                StageEvent::Closed(_) => None,
            })
            .collect()
    }

    /// Kinds in close order.
    pub fn closed(&self) -> Vec<StageKind> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StageEvent::Closed(kind) => Some(kind),
                StageEvent::Opened(_) => None,
            })
            .collect()
    }

    fn push(&self, event: StageEvent) {
        if let Ok(mut events) = self.0.lock() {
            events.push(event);
        }
    }
}

impl StageObserver for RecordingObserver {
    fn opened(&mut self, kind: StageKind) {
        self.push(StageEvent::Opened(kind));
    }

    fn closed(&mut self, kind: StageKind) {
        self.push(StageEvent::Closed(kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failing_sink_budget() {
        let mut sink = FailingSink::new(4);
        sink.write_all(b"abc").unwrap();
        assert!(sink.write_all(b"de").is_err());
        assert_eq!(sink.written(), b"abc");
        assert_eq!(sink.failures(), 1);
    }

    #[test]
    fn test_shared_sink_clones_share_contents() {
        let reader = SharedSink::new();
        let mut writer = reader.clone();
        writer.write_all(b"hello").unwrap();
        assert_eq!(reader.contents(), b"hello");
    }
}
