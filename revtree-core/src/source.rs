//! Capabilities the engine expects from its surroundings.
//!
//! The authoritative leaf-state source owns the real "reviewed" flags; the
//! presentation sink draws them. Neither is implemented by the engine. The
//! in-memory [`MemorySource`] exists for tests and for running without a
//! database.

use std::collections::HashMap;

use crate::node::NodeUpdate;
use crate::session::LeafWrite;

/// How a source handled a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The new value is already in effect; the dispatcher confirms it to the
    /// engine immediately.
    Applied,
    /// The write was handed off; the source will report the change later
    /// through a `LeafChanged` event.
    Queued,
}

/// Read/write access to the authoritative reviewed state of each leaf.
pub trait LeafStateSource {
    /// Current value for `key`, or `None` if the source has not loaded it yet.
    fn read(&self, key: &str) -> Option<bool>;

    /// Requests that the leaf described by `write` take `write.checked`.
    fn write(&mut self, write: &LeafWrite) -> WriteOutcome;
}

/// Receives every presentation change the engine produces.
pub trait PresentationSink {
    fn present(&mut self, update: NodeUpdate);
}

impl PresentationSink for Vec<NodeUpdate> {
    fn present(&mut self, update: NodeUpdate) {
        self.push(update);
    }
}

/// Sink for callers that only read state back from the session.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PresentationSink for NullSink {
    fn present(&mut self, _update: NodeUpdate) {}
}

/// Synchronous in-memory source.
///
/// Keys that were never set read as `None` (not yet available). Every write
/// is applied on the spot.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    states: HashMap<String, bool>,
    writes: usize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stored value without going through the engine, as another
    /// actor would.
    pub fn set(&mut self, key: impl Into<String>, checked: bool) {
        self.states.insert(key.into(), checked);
    }

    /// Number of writes received through [`LeafStateSource::write`].
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl LeafStateSource for MemorySource {
    fn read(&self, key: &str) -> Option<bool> {
        self.states.get(key).copied()
    }

    fn write(&mut self, write: &LeafWrite) -> WriteOutcome {
        self.writes += 1;
        self.states.insert(write.key.clone(), write.checked);
        WriteOutcome::Applied
    }
}
