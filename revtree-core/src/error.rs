//! Error taxonomy for the aggregation engine.

use thiserror::Error;

use crate::node::{AggregateId, LeafId, NodeRef};

/// Everything the engine can refuse.
///
/// None of these are meant to reach a user as a failure. The dispatcher logs
/// them and, for [`EngineError::UnknownNodeReference`], carries on as if the
/// event had never arrived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Registration referenced a parent that does not exist in this session,
    /// or tried to create a second root. The discovery side broke the
    /// "parents before children" contract.
    #[error("structural violation: {reason}")]
    StructuralViolation { reason: String },

    /// A state change or bulk command named a node that is not part of the
    /// current session, typically an id kept across a reset.
    #[error("unknown node reference {node}")]
    UnknownNodeReference { node: NodeRef },

    /// The initial-resolution entry point was used on a leaf that had
    /// already been resolved; the update entry point should have been used.
    #[error("leaf {leaf} is already resolved")]
    RedundantResolution { leaf: LeafId },

    /// A write was requested for pending nodes while the session runs
    /// [`BulkPolicy::Reject`](crate::node::BulkPolicy::Reject).
    #[error("{node} still has unresolved leaves")]
    PendingTarget { node: NodeRef },
}

impl EngineError {
    pub(crate) fn missing_parent(parent: AggregateId) -> Self {
        EngineError::StructuralViolation { reason: format!("parent {parent} is not registered") }
    }

    /// True for errors that callers are expected to tolerate during session
    /// transitions.
    pub fn is_stale_reference(&self) -> bool {
        matches!(self, EngineError::UnknownNodeReference { .. })
    }
}
