//! Structure discovery from a flat list of changed paths.
//!
//! [`TreeBuilder`] turns repository-relative paths such as `src/ui/mod.rs`
//! into registrations: one aggregate per directory prefix, one leaf per file.
//! Directories are always registered before the files inside them, and a path
//! seen in an earlier pass is skipped, so the builder can be fed a listing that
//! grows over time.
//!
//! The builder remembers which session epoch its ids belong to. When the
//! dispatcher's session has moved on, the builder forgets everything and
//! starts over on the next pass.
//!
//! With compaction on, a pass that puts a path inside a folded chain (a
//! sibling of `b` under a chain registered as `a/b`) cannot be expressed as
//! growth. The builder then restarts the session under the same identity and
//! registers every known path again, so the chain is split.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::dispatch::{Dispatcher, Outcome, Registration, TreeEvent};
use crate::error::EngineError;
use crate::node::{AggregateId, LeafId, LeafState, NodeRef};
use crate::source::{LeafStateSource, PresentationSink};

/// Label of the synthetic root aggregate.
pub const ROOT_LABEL: &str = "All Files";

/// Counts from one discovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub aggregates: usize,
    pub leaves: usize,
    /// Paths that were already known and skipped.
    pub skipped: usize,
    /// The pass restarted the session to split a compacted chain; ids from
    /// before the pass are stale.
    pub rebuilt: bool,
}

/// Path-to-id bookkeeping for one session.
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    epoch: Option<u64>,
    root: Option<AggregateId>,
    directories: HashMap<String, AggregateId>,
    /// Directory prefixes merged into a compacted aggregate's label.
    folded: HashSet<String>,
    files: HashMap<String, LeafId>,
    compact: bool,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collapses chains of directories into a single aggregate labelled
    /// `a/b/c`, the way most file-tree views do.
    pub fn compact_directories(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    pub fn root(&self) -> Option<AggregateId> {
        self.root
    }

    pub fn leaf_for(&self, path: &str) -> Option<LeafId> {
        self.files.get(path).copied()
    }

    pub fn aggregate_for(&self, dir: &str) -> Option<AggregateId> {
        if dir.is_empty() {
            return self.root;
        }
        self.directories.get(dir).copied()
    }

    /// Every known file path with its leaf id.
    pub fn files(&self) -> impl Iterator<Item = (&str, LeafId)> {
        self.files.iter().map(|(path, id)| (path.as_str(), *id))
    }

    /// Registers every path not seen before.
    ///
    /// Initial leaf states come from the dispatcher's source; a path the source
    /// has no value for yet is registered as `Unknown`.
    ///
    /// A path that splits a compacted chain restarts the session (see
    /// [`DiscoveryReport::rebuilt`]). Deferred bulk values on pending leaves
    /// do not survive the restart.
    ///
    /// # Errors
    ///
    /// Propagates any registration the engine refuses. Paths registered
    /// before the failure stay registered.
    pub fn discover<'a, S, P>(
        &mut self,
        dispatcher: &mut Dispatcher<S, P>,
        paths: impl IntoIterator<Item = &'a str>,
    ) -> Result<DiscoveryReport, EngineError>
    where
        S: LeafStateSource,
        P: PresentationSink,
    {
        let epoch = dispatcher.session().epoch();
        if self.epoch != Some(epoch) {
            self.forget();
            self.epoch = Some(epoch);
        }

        let mut report = DiscoveryReport::default();
        let mut fresh: Vec<&str> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for path in paths {
            let path = path.trim_matches('/');
            if path.is_empty() {
                continue;
            }
            if self.files.contains_key(path) || !seen.insert(path) {
                report.skipped += 1;
            } else {
                fresh.push(path);
            }
        }

        if fresh.iter().any(|path| self.splits_folded_chain(parent_dir(path))) {
            let mut all: Vec<String> = self.files.keys().cloned().collect();
            all.extend(fresh.iter().map(|path| (*path).to_owned()));
            all.sort();
            debug!(paths = all.len(), "splitting a compacted chain; restarting session");

            let identity = dispatcher.identity().map(str::to_owned);
            dispatcher.dispatch(TreeEvent::SessionReset)?;
            if let Some(identity) = identity {
                dispatcher.dispatch(TreeEvent::SessionStarted { identity })?;
            }
            self.forget();
            self.epoch = Some(dispatcher.session().epoch());

            report.rebuilt = true;
            let batch: Vec<&str> = all.iter().map(String::as_str).collect();
            self.register_batch(dispatcher, &batch, &mut report)?;
        } else {
            self.register_batch(dispatcher, &fresh, &mut report)?;
        }

        debug!(
            aggregates = report.aggregates,
            leaves = report.leaves,
            skipped = report.skipped,
            "discovery pass"
        );
        Ok(report)
    }

    /// Registers the root if needed, then the directories and files of `batch`.
    fn register_batch<S, P>(
        &mut self,
        dispatcher: &mut Dispatcher<S, P>,
        batch: &[&str],
        report: &mut DiscoveryReport,
    ) -> Result<(), EngineError>
    where
        S: LeafStateSource,
        P: PresentationSink,
    {
        let root = match self.root {
            Some(root) => root,
            None => {
                let root = register_aggregate(
                    dispatcher,
                    Registration::Root { label: ROOT_LABEL.to_owned() },
                )?;
                self.root = Some(root);
                report.aggregates += 1;
                root
            }
        };

        // Directories first, so every file finds its parent.
        let mut parents = Vec::with_capacity(batch.len());
        for path in batch {
            let dir = parent_dir(path);
            let parent = self.ensure_directory(dispatcher, root, dir, batch, report)?;
            parents.push(parent);
        }

        for (path, parent) in batch.iter().zip(parents) {
            let initial = dispatcher
                .source()
                .read(path)
                .map(LeafState::from_checked)
                .unwrap_or(LeafState::Unknown);
            let outcome = dispatcher.dispatch(TreeEvent::NodeRegistered(Registration::Leaf {
                parent,
                key: (*path).to_owned(),
                initial,
            }))?;
            if let Outcome::Registered { node: NodeRef::Leaf(id), .. } = outcome {
                self.files.insert((*path).to_owned(), id);
                report.leaves += 1;
            }
        }
        Ok(())
    }

    /// True if `dir` is, or lies below, a folded prefix deeper than its
    /// nearest registered ancestor: registering it would need a directory
    /// that only exists inside a compacted label.
    fn splits_folded_chain(&self, dir: &str) -> bool {
        if dir.is_empty() || self.directories.contains_key(dir) {
            return false;
        }
        let prefixes = dir.match_indices('/').map(|(i, _)| &dir[..i]).chain(std::iter::once(dir));
        let mut inside_fold = false;
        for prefix in prefixes {
            if self.directories.contains_key(prefix) {
                inside_fold = false;
            } else if self.folded.contains(prefix) {
                inside_fold = true;
            }
        }
        inside_fold
    }

    /// Returns the aggregate for `dir`, registering it and any missing
    /// ancestors on the way.
    fn ensure_directory<S, P>(
        &mut self,
        dispatcher: &mut Dispatcher<S, P>,
        root: AggregateId,
        dir: &str,
        batch: &[&str],
        report: &mut DiscoveryReport,
    ) -> Result<AggregateId, EngineError>
    where
        S: LeafStateSource,
        P: PresentationSink,
    {
        if dir.is_empty() {
            return Ok(root);
        }
        if let Some(id) = self.directories.get(dir) {
            return Ok(*id);
        }

        // Walk up to the nearest registered ancestor (or the root).
        let mut base = "";
        let mut parent = root;
        for (position, _) in dir.match_indices('/') {
            if let Some(id) = self.directories.get(&dir[..position]) {
                base = &dir[..position];
                parent = *id;
            }
        }

        let remainder = if base.is_empty() { dir } else { &dir[base.len() + 1..] };
        let mut prefix = base.to_owned();
        let mut pending_label = String::new();
        let segments: Vec<&str> = remainder.split('/').collect();
        for (position, segment) in segments.iter().enumerate() {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            if !pending_label.is_empty() {
                pending_label.push('/');
            }
            pending_label.push_str(segment);

            let last = position + 1 == segments.len();
            if self.compact && !last && !has_other_children(batch, &prefix, segments[position + 1])
            {
                // Fold this segment into the next one's label.
                self.folded.insert(prefix.clone());
                continue;
            }

            let id = register_aggregate(
                dispatcher,
                Registration::Aggregate { parent, label: std::mem::take(&mut pending_label) },
            )?;
            self.directories.insert(prefix.clone(), id);
            report.aggregates += 1;
            parent = id;
        }
        Ok(parent)
    }

    fn forget(&mut self) {
        self.root = None;
        self.directories.clear();
        self.folded.clear();
        self.files.clear();
    }
}

fn register_aggregate<S, P>(
    dispatcher: &mut Dispatcher<S, P>,
    registration: Registration,
) -> Result<AggregateId, EngineError>
where
    S: LeafStateSource,
    P: PresentationSink,
{
    match dispatcher.dispatch(TreeEvent::NodeRegistered(registration))? {
        Outcome::Registered { node: NodeRef::Aggregate(id), .. } => Ok(id),
        other => Err(EngineError::StructuralViolation {
            reason: format!("aggregate registration produced {other:?}"),
        }),
    }
}

/// Directory part of a path; empty for top-level files.
fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

/// True if any path in `batch` lives directly in `dir` or under a sibling of
/// `next` inside `dir`, meaning `dir` cannot be merged into `dir/next`.
fn has_other_children(batch: &[&str], dir: &str, next: &str) -> bool {
    batch.iter().any(|path| {
        let Some(rest) = path.strip_prefix(dir).and_then(|r| r.strip_prefix('/')) else {
            return false;
        };
        match rest.split_once('/') {
            Some((child, _)) => child != next,
            None => true,
        }
    })
}
