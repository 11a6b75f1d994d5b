//! Stage lifecycle instrumentation.

use crate::stage::StageKind;

/// Receives every stage open and close, in the order they happen.
pub trait StageObserver: Send {
    /// A stage was opened.
    fn opened(&mut self, _kind: StageKind) {}

    /// A stage was closed or released.
    fn closed(&mut self, _kind: StageKind) {}
}

/// Ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {}
