//! The aggregation engine.
//!
//! A [`TreeSession`] owns every node of one review tree in two arenas and keeps
//! each aggregate's derived state in step with its children. Changes flow in two
//! directions:
//!
//! - **Upward**: a leaf (or newly attached child) changes its parent's counters;
//!   the parent re-derives its state and, only if that state changed, hands its
//!   own old/new contribution to its parent. Propagation therefore stops at the
//!   first ancestor that does not change.
//! - **Downward**: a bulk command on an aggregate collects one [`LeafWrite`] per
//!   descendant leaf that differs from the requested value. The session never
//!   applies those writes itself; they go to the authoritative source, which
//!   reports back through [`TreeSession::update_leaf`].
//!
//! Every mutating operation returns a [`Propagation`] describing what it did.

use tracing::debug;

use crate::error::EngineError;
use crate::node::{
    AggregateId, AggregateNode, BulkPolicy, ChildDelta, LeafId, LeafNode, LeafState, NodeRef,
    NodePresentation, NodeUpdate,
};

/// A request to change one leaf's authoritative state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafWrite {
    pub leaf: LeafId,
    /// External key of the leaf, so the source does not need a reverse lookup.
    pub key: String,
    pub checked: bool,
}

/// Side effects of one engine operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Propagation {
    /// Aggregates whose counters were touched, nearest first.
    pub visited: Vec<AggregateId>,
    /// Presentation changes, in the order they happened.
    pub updates: Vec<NodeUpdate>,
    /// Writes the caller must hand to the authoritative source.
    pub writes: Vec<LeafWrite>,
}

impl Propagation {
    pub fn is_empty(&self) -> bool {
        self.visited.is_empty() && self.updates.is_empty() && self.writes.is_empty()
    }
}

/// One review tree: arenas of leaves and aggregates plus the epoch their ids carry.
#[derive(Debug, Clone)]
pub struct TreeSession {
    epoch: u64,
    policy: BulkPolicy,
    root: Option<u32>,
    aggregates: Vec<AggregateNode>,
    leaves: Vec<LeafNode>,
}

impl Default for TreeSession {
    fn default() -> Self {
        Self::new(BulkPolicy::default())
    }
}

impl TreeSession {
    /// Creates an empty session at epoch 0.
    pub fn new(policy: BulkPolicy) -> Self {
        Self::with_epoch(0, policy)
    }

    pub fn with_epoch(epoch: u64, policy: BulkPolicy) -> Self {
        Self { epoch, policy, root: None, aggregates: Vec::new(), leaves: Vec::new() }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn policy(&self) -> BulkPolicy {
        self.policy
    }

    /// Discards every node and restarts id allocation under the next epoch.
    ///
    /// Ids issued before the reset are rejected from then on.
    pub fn reset(&mut self) {
        debug!(
            epoch = self.epoch,
            leaves = self.leaves.len(),
            aggregates = self.aggregates.len(),
            "resetting review tree"
        );
        *self = Self::with_epoch(self.epoch + 1, self.policy);
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Creates the root aggregate. A session has at most one.
    pub fn register_root(
        &mut self,
        label: impl Into<String>,
    ) -> Result<(AggregateId, Propagation), EngineError> {
        if let Some(root) = self.root {
            return Err(EngineError::StructuralViolation {
                reason: format!("root {} is already registered", self.aggregate_id(root as usize)),
            });
        }
        let index = self.next_aggregate_index();
        let id = self.aggregate_id(index);
        let node = AggregateNode::new(id, None, label.into());
        let mut out = Propagation::default();
        out.updates.push(NodeUpdate { node: id.into(), presentation: node.presentation() });
        self.aggregates.push(node);
        self.root = Some(index as u32);
        debug!(%id, "registered root");
        Ok((id, out))
    }

    /// Attaches a new, empty aggregate under `parent`.
    ///
    /// An empty aggregate counts as unchecked and not pending, but attaching it
    /// still grows the parent's child count, which can change the parent's state.
    pub fn register_aggregate(
        &mut self,
        parent: AggregateId,
        label: impl Into<String>,
    ) -> Result<(AggregateId, Propagation), EngineError> {
        let parent_index = self
            .aggregate_index(parent)
            .map_err(|_| EngineError::missing_parent(parent))?;
        let index = self.next_aggregate_index();
        let id = self.aggregate_id(index);
        let node = AggregateNode::new(id, Some(parent_index as u32), label.into());
        let status = node.status;

        let mut out = Propagation::default();
        out.updates.push(NodeUpdate { node: id.into(), presentation: node.presentation() });
        self.aggregates.push(node);
        self.aggregates[parent_index].child_aggregates.push(index as u32);

        let delta = ChildDelta { old: None, new: status.contribution() };
        self.propagate(parent_index, delta, &mut out);
        debug!(%id, %parent, visited = out.visited.len(), "registered aggregate");
        Ok((id, out))
    }

    /// Attaches a new leaf under `parent` with whatever state the source has
    /// reported so far (`Unknown` if nothing).
    pub fn register_leaf(
        &mut self,
        parent: AggregateId,
        key: impl Into<String>,
        initial: LeafState,
    ) -> Result<(LeafId, Propagation), EngineError> {
        let parent_index = self
            .aggregate_index(parent)
            .map_err(|_| EngineError::missing_parent(parent))?;
        let index = self.leaves.len() as u32;
        let id = LeafId { epoch: self.epoch, index };
        let node = LeafNode {
            id,
            parent: parent_index as u32,
            key: key.into(),
            state: initial,
            deferred: None,
        };

        let mut out = Propagation::default();
        out.updates.push(NodeUpdate { node: id.into(), presentation: node.presentation() });
        self.leaves.push(node);
        self.aggregates[parent_index].child_leaves.push(index);

        let delta = ChildDelta { old: None, new: initial.contribution() };
        self.propagate(parent_index, delta, &mut out);
        debug!(%id, %parent, ?initial, visited = out.visited.len(), "registered leaf");
        Ok((id, out))
    }

    // -----------------------------------------------------------------------
    // Leaf state changes
    // -----------------------------------------------------------------------

    /// First report of a leaf's authoritative state (`Unknown` -> resolved).
    ///
    /// If a bulk command deferred a different value onto the leaf while it
    /// was pending, the returned propagation carries the write for it.
    pub fn resolve_leaf(&mut self, leaf: LeafId, checked: bool) -> Result<Propagation, EngineError> {
        let index = self.leaf_index(leaf)?;
        if !self.leaves[index].state.is_unknown() {
            return Err(EngineError::RedundantResolution { leaf });
        }

        let mut out = self.set_leaf_state(index, LeafState::from_checked(checked));
        let node = &mut self.leaves[index];
        if let Some(desired) = node.deferred.take() {
            if desired != checked {
                debug!(%leaf, desired, "applying deferred bulk value");
                out.writes.push(LeafWrite { leaf, key: node.key.clone(), checked: desired });
            }
        }
        Ok(out)
    }

    /// Subsequent report of a leaf's authoritative state.
    ///
    /// Reporting the current value again is a no-op. A report for a leaf that
    /// is still `Unknown` is taken as its resolution; any deferred bulk value
    /// is dropped because the source has spoken after the bulk command.
    pub fn update_leaf(&mut self, leaf: LeafId, checked: bool) -> Result<Propagation, EngineError> {
        let index = self.leaf_index(leaf)?;
        let node = &mut self.leaves[index];
        let new = LeafState::from_checked(checked);
        if node.state == new {
            return Ok(Propagation::default());
        }
        if node.state.is_unknown() {
            debug!(%leaf, "update on pending leaf treated as resolution");
            node.deferred = None;
        }
        Ok(self.set_leaf_state(index, new))
    }

    fn set_leaf_state(&mut self, index: usize, new: LeafState) -> Propagation {
        let node = &mut self.leaves[index];
        let old = node.state;
        node.state = new;
        let parent = node.parent as usize;

        let mut out = Propagation::default();
        out.updates.push(NodeUpdate { node: node.id.into(), presentation: node.presentation() });
        let delta = ChildDelta { old: Some(old.contribution()), new: new.contribution() };
        self.propagate(parent, delta, &mut out);
        out
    }

    /// Applies `delta` to the aggregate at `start` and walks up for as long as
    /// the receiving aggregate's derived state changes.
    fn propagate(&mut self, start: usize, mut delta: ChildDelta, out: &mut Propagation) {
        let mut current = start;
        loop {
            let node = &mut self.aggregates[current];
            let before = node.status;
            let after = node.apply(delta);
            out.visited.push(node.id);
            if before == after {
                break;
            }
            out.updates.push(NodeUpdate { node: node.id.into(), presentation: after.presentation() });
            let Some(parent) = node.parent else {
                break;
            };
            delta = ChildDelta { old: Some(before.contribution()), new: after.contribution() };
            current = parent as usize;
        }
    }

    // -----------------------------------------------------------------------
    // Writes toward the authoritative source
    // -----------------------------------------------------------------------

    /// Collects the writes that bring every leaf under `aggregate` to `checked`.
    ///
    /// Nested aggregates are visited before the aggregate's own leaves. Leaves
    /// already at the desired value produce nothing. Pending leaves follow the
    /// session's [`BulkPolicy`].
    pub fn apply_to_subtree(
        &mut self,
        aggregate: AggregateId,
        checked: bool,
    ) -> Result<Propagation, EngineError> {
        let index = self.aggregate_index(aggregate)?;
        if self.policy == BulkPolicy::Reject && self.aggregates[index].status.pending {
            return Err(EngineError::PendingTarget { node: aggregate.into() });
        }
        let mut out = Propagation::default();
        self.collect_writes(index, checked, &mut out);
        debug!(%aggregate, checked, writes = out.writes.len(), "bulk update");
        Ok(out)
    }

    fn collect_writes(&mut self, index: usize, checked: bool, out: &mut Propagation) {
        for position in 0..self.aggregates[index].child_aggregates.len() {
            let child = self.aggregates[index].child_aggregates[position] as usize;
            self.collect_writes(child, checked, out);
        }
        for position in 0..self.aggregates[index].child_leaves.len() {
            let leaf_index = self.aggregates[index].child_leaves[position] as usize;
            if let Some(write) = self.leaf_write(leaf_index, checked) {
                out.writes.push(write);
            }
        }
    }

    /// Single-leaf counterpart of [`TreeSession::apply_to_subtree`], used when
    /// the user toggles a file directly.
    pub fn request_leaf(&mut self, leaf: LeafId, checked: bool) -> Result<Propagation, EngineError> {
        let index = self.leaf_index(leaf)?;
        if self.policy == BulkPolicy::Reject && self.leaves[index].state.is_unknown() {
            return Err(EngineError::PendingTarget { node: leaf.into() });
        }
        let mut out = Propagation::default();
        out.writes.extend(self.leaf_write(index, checked));
        Ok(out)
    }

    fn leaf_write(&mut self, index: usize, checked: bool) -> Option<LeafWrite> {
        let node = &mut self.leaves[index];
        match node.state.checked() {
            None => {
                node.deferred = Some(checked);
                None
            }
            Some(current) if current == checked => None,
            Some(_) => Some(LeafWrite { leaf: node.id, key: node.key.clone(), checked }),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn root(&self) -> Option<AggregateId> {
        self.root.map(|index| self.aggregate_id(index as usize))
    }

    pub fn leaf(&self, id: LeafId) -> Option<&LeafNode> {
        self.leaf_index(id).ok().map(|index| &self.leaves[index])
    }

    pub fn aggregate(&self, id: AggregateId) -> Option<&AggregateNode> {
        self.aggregate_index(id).ok().map(|index| &self.aggregates[index])
    }

    pub fn contains(&self, node: NodeRef) -> bool {
        match node {
            NodeRef::Leaf(id) => self.leaf_index(id).is_ok(),
            NodeRef::Aggregate(id) => self.aggregate_index(id).is_ok(),
        }
    }

    pub fn presentation(&self, node: NodeRef) -> Option<NodePresentation> {
        match node {
            NodeRef::Leaf(id) => self.leaf(id).map(LeafNode::presentation),
            NodeRef::Aggregate(id) => self.aggregate(id).map(AggregateNode::presentation),
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn aggregate_count(&self) -> usize {
        self.aggregates.len()
    }

    pub fn leaves(&self) -> impl Iterator<Item = &LeafNode> {
        self.leaves.iter()
    }

    pub fn aggregates(&self) -> impl Iterator<Item = &AggregateNode> {
        self.aggregates.iter()
    }

    /// Depth-first listing of the whole tree from the root, directories before
    /// files at every level, with each node's depth (root = 0).
    pub fn walk(&self) -> Vec<(NodeRef, usize)> {
        let mut rows = Vec::with_capacity(self.aggregates.len() + self.leaves.len());
        if let Some(root) = self.root {
            self.walk_from(root as usize, 0, &mut rows);
        }
        rows
    }

    fn walk_from(&self, index: usize, depth: usize, rows: &mut Vec<(NodeRef, usize)>) {
        let node = &self.aggregates[index];
        rows.push((NodeRef::Aggregate(node.id), depth));
        for &child in &node.child_aggregates {
            self.walk_from(child as usize, depth + 1, rows);
        }
        rows.extend(node.child_leaves().map(|id| (NodeRef::Leaf(id), depth + 1)));
    }

    // -----------------------------------------------------------------------
    // Id bookkeeping
    // -----------------------------------------------------------------------

    fn next_aggregate_index(&self) -> usize {
        self.aggregates.len()
    }

    fn aggregate_id(&self, index: usize) -> AggregateId {
        AggregateId { epoch: self.epoch, index: index as u32 }
    }

    fn aggregate_index(&self, id: AggregateId) -> Result<usize, EngineError> {
        let index = id.index as usize;
        if id.epoch != self.epoch || index >= self.aggregates.len() {
            return Err(EngineError::UnknownNodeReference { node: id.into() });
        }
        Ok(index)
    }

    fn leaf_index(&self, id: LeafId) -> Result<usize, EngineError> {
        let index = id.index as usize;
        if id.epoch != self.epoch || index >= self.leaves.len() {
            return Err(EngineError::UnknownNodeReference { node: id.into() });
        }
        Ok(index)
    }
}
