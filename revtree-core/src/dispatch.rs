//! Event dispatcher for the review tree.
//!
//! Everything that can change the tree arrives as a [`TreeEvent`]: structural
//! registration from discovery, state reports from the authoritative source,
//! user commands, and session boundaries. A [`Dispatcher`] consumes them one
//! at a time and runs each to completion before the next is looked at.
//!
//! Writes produced by a command are handed to the [`LeafStateSource`]. When the
//! source applies a write synchronously, the confirming `LeafChanged` is queued
//! and drained within the same `dispatch` call, so a bulk command against an
//! in-memory source leaves the tree fully settled when it returns.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::error::EngineError;
use crate::node::{AggregateId, BulkPolicy, LeafId, LeafState, NodeRef};
use crate::session::{Propagation, TreeSession};
use crate::source::{LeafStateSource, PresentationSink, WriteOutcome};

/// Structural registration carried by [`TreeEvent::NodeRegistered`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Root { label: String },
    Aggregate { parent: AggregateId, label: String },
    Leaf { parent: AggregateId, key: String, initial: LeafState },
}

/// All inputs the dispatcher understands.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TreeEvent {
    /// Discovery found a new node.
    NodeRegistered(Registration),
    /// The source reported a leaf's value for the first time.
    LeafResolved { leaf: LeafId, checked: bool },
    /// The source reported a change to an already known leaf.
    LeafChanged { leaf: LeafId, checked: bool },
    /// The user asked for one leaf to become `checked`.
    LeafSetRequested { leaf: LeafId, checked: bool },
    /// The user asked for every leaf under an aggregate to become `checked`.
    BulkSetRequested { aggregate: AggregateId, checked: bool },
    /// The reviewed content set now has this identity. Different from the
    /// current identity means a new session.
    SessionStarted { identity: String },
    /// The current session is no longer valid.
    SessionReset,
}

/// What a successfully dispatched event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A node was registered; the tree's counters were updated along `visited`.
    Registered { node: NodeRef, visited: Vec<AggregateId> },
    /// State changes were folded in along `visited`, and `writes` writes
    /// were handed to the source.
    Propagated { visited: Vec<AggregateId>, writes: usize },
    /// A new, empty session began.
    SessionChanged { epoch: u64 },
    /// Nothing needed to happen.
    Ignored,
}

/// Single consumer of [`TreeEvent`]s, owning the session and both collaborators.
pub struct Dispatcher<S, P> {
    session: TreeSession,
    identity: Option<String>,
    source: S,
    sink: P,
    queue: VecDeque<TreeEvent>,
}

impl<S: LeafStateSource, P: PresentationSink> Dispatcher<S, P> {
    pub fn new(policy: BulkPolicy, source: S, sink: P) -> Self {
        Self {
            session: TreeSession::new(policy),
            identity: None,
            source,
            sink,
            queue: VecDeque::new(),
        }
    }

    pub fn session(&self) -> &TreeSession {
        &self.session
    }

    /// Identity of the current session, if one was started.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut P {
        &mut self.sink
    }

    /// Processes `event` and every confirmation it triggers.
    ///
    /// The result describes `event` itself. Confirmations that fail afterwards
    /// are logged; they never turn a successful command into an error.
    ///
    /// # Errors
    ///
    /// Returns the engine's refusal for `event`. Stale references are logged at
    /// `warn` before being returned so callers can drop them with
    /// [`EngineError::is_stale_reference`].
    pub fn dispatch(&mut self, event: TreeEvent) -> Result<Outcome, EngineError> {
        let result = self.handle(event);
        if let Err(err) = &result {
            log_refusal(err);
        }
        while let Some(next) = self.queue.pop_front() {
            if let Err(err) = self.handle(next) {
                log_refusal(&err);
            }
        }
        result
    }

    fn handle(&mut self, event: TreeEvent) -> Result<Outcome, EngineError> {
        match event {
            TreeEvent::NodeRegistered(registration) => self.register(registration),
            TreeEvent::LeafResolved { leaf, checked } => {
                let propagation = self.session.resolve_leaf(leaf, checked)?;
                Ok(self.settle(propagation))
            }
            TreeEvent::LeafChanged { leaf, checked } => {
                let propagation = self.session.update_leaf(leaf, checked)?;
                Ok(self.settle(propagation))
            }
            TreeEvent::LeafSetRequested { leaf, checked } => {
                let propagation = self.session.request_leaf(leaf, checked)?;
                Ok(self.settle(propagation))
            }
            TreeEvent::BulkSetRequested { aggregate, checked } => {
                let propagation = self.session.apply_to_subtree(aggregate, checked)?;
                Ok(self.settle(propagation))
            }
            TreeEvent::SessionStarted { identity } => {
                if self.identity.as_deref() == Some(identity.as_str()) {
                    return Ok(Outcome::Ignored);
                }
                debug!(%identity, previous = ?self.identity, "review session changed");
                self.reset();
                self.identity = Some(identity);
                Ok(Outcome::SessionChanged { epoch: self.session.epoch() })
            }
            TreeEvent::SessionReset => {
                self.reset();
                self.identity = None;
                Ok(Outcome::SessionChanged { epoch: self.session.epoch() })
            }
        }
    }

    fn register(&mut self, registration: Registration) -> Result<Outcome, EngineError> {
        let (node, propagation) = match registration {
            Registration::Root { label } => {
                let (id, p) = self.session.register_root(label)?;
                (NodeRef::Aggregate(id), p)
            }
            Registration::Aggregate { parent, label } => {
                let (id, p) = self.session.register_aggregate(parent, label)?;
                (NodeRef::Aggregate(id), p)
            }
            Registration::Leaf { parent, key, initial } => {
                let (id, p) = self.session.register_leaf(parent, key, initial)?;
                (NodeRef::Leaf(id), p)
            }
        };
        let visited = propagation.visited.clone();
        self.settle(propagation);
        Ok(Outcome::Registered { node, visited })
    }

    /// Forwards presentation updates and hands writes to the source.
    fn settle(&mut self, propagation: Propagation) -> Outcome {
        let Propagation { visited, updates, writes } = propagation;
        for update in updates {
            self.sink.present(update);
        }

        let count = writes.len();
        for write in writes {
            match self.source.write(&write) {
                WriteOutcome::Applied => self
                    .queue
                    .push_back(TreeEvent::LeafChanged { leaf: write.leaf, checked: write.checked }),
                WriteOutcome::Queued => {}
            }
        }
        Outcome::Propagated { visited, writes: count }
    }

    /// Drops the whole tree; queued confirmations belong to the old session
    /// and go with it.
    fn reset(&mut self) {
        self.queue.clear();
        self.session.reset();
    }
}

fn log_refusal(err: &EngineError) {
    match err {
        EngineError::UnknownNodeReference { .. } => warn!(%err, "ignoring event for stale node"),
        EngineError::PendingTarget { .. } => debug!(%err, "command refused"),
        _ => warn!(%err, "event rejected"),
    }
}
