//! Node records and the value types derived from them.
//!
//! A review tree is made of two node kinds: leaves (one per reviewable file)
//! and aggregates (one per directory, plus the root). Both live in the arenas of
//! a [`TreeSession`](crate::session::TreeSession); everything in this module is
//! either an arena record or a small `Copy` value describing one.
//!
//! Contributions are summed in half units so a partially reviewed directory
//! (worth 0.5 to its parent) never needs floating point.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a leaf within one session epoch.
///
/// The epoch is part of the identity: an id issued before a reset never
/// matches a node registered after it, even though indices restart at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeafId {
    pub(crate) epoch: u64,
    pub(crate) index: u32,
}

/// Identifier of an aggregate (directory or root) within one session epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AggregateId {
    pub(crate) epoch: u64,
    pub(crate) index: u32,
}

impl LeafId {
    /// Session epoch the id was issued in.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Arena position within its session.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl AggregateId {
    /// Session epoch the id was issued in.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Arena position within its session.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for LeafId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file-{}.{}", self.epoch, self.index)
    }
}

impl fmt::Display for AggregateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "directory-{}.{}", self.epoch, self.index)
    }
}

/// Either kind of node, used wherever callers handle leaves and aggregates uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Leaf(LeafId),
    Aggregate(AggregateId),
}

impl NodeRef {
    /// Session epoch the id was issued in.
    pub fn epoch(&self) -> u64 {
        match self {
            NodeRef::Leaf(id) => id.epoch(),
            NodeRef::Aggregate(id) => id.epoch(),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Leaf(id) => id.fmt(f),
            NodeRef::Aggregate(id) => id.fmt(f),
        }
    }
}

impl From<LeafId> for NodeRef {
    fn from(id: LeafId) -> Self {
        NodeRef::Leaf(id)
    }
}

impl From<AggregateId> for NodeRef {
    fn from(id: AggregateId) -> Self {
        NodeRef::Aggregate(id)
    }
}

/// Reviewed state of a leaf as last reported by the authoritative source.
///
/// `Unknown` is the state of a leaf whose source has not reported yet. A leaf
/// leaves `Unknown` exactly once and never returns to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeafState {
    #[default]
    Unknown,
    Unchecked,
    Checked,
}

impl LeafState {
    /// Maps a reported boolean onto a resolved state.
    pub fn from_checked(checked: bool) -> Self {
        if checked {
            LeafState::Checked
        } else {
            LeafState::Unchecked
        }
    }

    /// `None` while unresolved, otherwise whether the leaf is reviewed.
    pub fn checked(self) -> Option<bool> {
        match self {
            LeafState::Unknown => None,
            LeafState::Unchecked => Some(false),
            LeafState::Checked => Some(true),
        }
    }

    pub fn is_unknown(self) -> bool {
        self == LeafState::Unknown
    }

    pub(crate) fn contribution(self) -> Contribution {
        match self {
            LeafState::Unknown => Contribution { half_units: 0, pending: true },
            LeafState::Unchecked => Contribution { half_units: 0, pending: false },
            LeafState::Checked => Contribution { half_units: 2, pending: false },
        }
    }
}

/// Derived tri-state of an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckState {
    #[default]
    Unchecked,
    Partial,
    Checked,
}

impl CheckState {
    /// Weight of this state in its parent's total, in half units.
    pub(crate) fn half_units(self) -> u32 {
        match self {
            CheckState::Unchecked => 0,
            CheckState::Partial => 1,
            CheckState::Checked => 2,
        }
    }
}

/// What a presentation layer needs to draw one node's indicator.
///
/// A partial aggregate reports `checked: false` so that activating its
/// indicator reads as "select all".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodePresentation {
    pub checked: bool,
    pub partial: bool,
    /// The node (or something below it) has not been resolved yet; the
    /// indicator should be shown as disabled.
    pub pending: bool,
}

/// One presentation change, addressed to the node it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeUpdate {
    pub node: NodeRef,
    pub presentation: NodePresentation,
}

/// Policy for bulk commands that reach leaves which are still `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkPolicy {
    /// Remember the desired value on the pending leaf and write it once the
    /// leaf resolves to something else.
    #[default]
    Defer,
    /// Refuse the whole command while any affected leaf is pending.
    Reject,
}

/// A child's weight in its parent's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Contribution {
    pub(crate) half_units: u32,
    pub(crate) pending: bool,
}

/// The two derived values of an aggregate, compared before and after every update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct AggregateStatus {
    pub(crate) check: CheckState,
    pub(crate) pending: bool,
}

impl AggregateStatus {
    pub(crate) fn contribution(self) -> Contribution {
        Contribution { half_units: self.check.half_units(), pending: self.pending }
    }

    pub(crate) fn presentation(self) -> NodePresentation {
        NodePresentation {
            checked: self.check == CheckState::Checked,
            partial: self.check == CheckState::Partial,
            pending: self.pending,
        }
    }
}

/// Change in one child's contribution. `old` is `None` for a child that is
/// being attached, which also grows the parent's child count.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChildDelta {
    pub(crate) old: Option<Contribution>,
    pub(crate) new: Contribution,
}

/// Arena record for a reviewable file.
#[derive(Debug, Clone)]
pub struct LeafNode {
    pub(crate) id: LeafId,
    pub(crate) parent: u32,
    pub(crate) key: String,
    pub(crate) state: LeafState,
    pub(crate) deferred: Option<bool>,
}

impl LeafNode {
    pub fn id(&self) -> LeafId {
        self.id
    }

    pub fn parent(&self) -> AggregateId {
        AggregateId { epoch: self.id.epoch, index: self.parent }
    }

    /// External key the authoritative source knows this leaf by.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> LeafState {
        self.state
    }

    /// Value a bulk command asked for while the leaf was still pending.
    pub fn deferred(&self) -> Option<bool> {
        self.deferred
    }

    pub fn presentation(&self) -> NodePresentation {
        NodePresentation {
            checked: self.state == LeafState::Checked,
            partial: false,
            pending: self.state.is_unknown(),
        }
    }
}

/// Arena record for a directory (or the root).
#[derive(Debug, Clone)]
pub struct AggregateNode {
    pub(crate) id: AggregateId,
    pub(crate) parent: Option<u32>,
    pub(crate) label: String,
    pub(crate) child_leaves: Vec<u32>,
    pub(crate) child_aggregates: Vec<u32>,
    /// Sum of children's contributions in half units.
    pub(crate) child_total: u32,
    pub(crate) child_count: u32,
    pub(crate) pending_count: u32,
    pub(crate) status: AggregateStatus,
}

impl AggregateNode {
    pub(crate) fn new(id: AggregateId, parent: Option<u32>, label: String) -> Self {
        Self {
            id,
            parent,
            label,
            child_leaves: Vec::new(),
            child_aggregates: Vec::new(),
            child_total: 0,
            child_count: 0,
            pending_count: 0,
            status: AggregateStatus::default(),
        }
    }

    pub fn id(&self) -> AggregateId {
        self.id
    }

    pub fn parent(&self) -> Option<AggregateId> {
        self.parent.map(|index| AggregateId { epoch: self.id.epoch, index })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn check_state(&self) -> CheckState {
        self.status.check
    }

    pub fn is_pending(&self) -> bool {
        self.status.pending
    }

    pub fn child_count(&self) -> u32 {
        self.child_count
    }

    pub fn pending_count(&self) -> u32 {
        self.pending_count
    }

    /// Children's summed contribution, in half units (a checked child adds 2).
    pub fn child_state_total(&self) -> u32 {
        self.child_total
    }

    pub fn child_leaves(&self) -> impl Iterator<Item = LeafId> + '_ {
        let epoch = self.id.epoch;
        self.child_leaves.iter().map(move |&index| LeafId { epoch, index })
    }

    pub fn child_aggregates(&self) -> impl Iterator<Item = AggregateId> + '_ {
        let epoch = self.id.epoch;
        self.child_aggregates.iter().map(move |&index| AggregateId { epoch, index })
    }

    pub fn presentation(&self) -> NodePresentation {
        self.status.presentation()
    }

    /// Folds one child delta into the counters and returns the re-derived status.
    ///
    /// Counters never go negative; an underflow means the caller fed a delta
    /// for a contribution this node never received, and is clamped after
    /// logging.
    pub(crate) fn apply(&mut self, delta: ChildDelta) -> AggregateStatus {
        let old = match delta.old {
            Some(old) => old,
            None => {
                self.child_count += 1;
                Contribution::default()
            }
        };

        let total = self.child_total + delta.new.half_units;
        self.child_total = total.checked_sub(old.half_units).unwrap_or_else(|| {
            tracing::error!(node = %self.id, total, "child total underflow");
            0
        });

        let pending = self.pending_count + u32::from(delta.new.pending);
        self.pending_count = pending.checked_sub(u32::from(old.pending)).unwrap_or_else(|| {
            tracing::error!(node = %self.id, pending, "pending count underflow");
            0
        });

        self.status = self.derive();
        self.status
    }

    fn derive(&self) -> AggregateStatus {
        let check = if self.child_total == 0 {
            CheckState::Unchecked
        } else if self.child_total >= 2 * self.child_count {
            CheckState::Checked
        } else {
            CheckState::Partial
        };
        AggregateStatus { check, pending: self.pending_count > 0 }
    }
}
