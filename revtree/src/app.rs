//! Central application state for revtree.
//!
//! `AppState` owns the review tree (a [`Dispatcher`] over the SQLite-backed
//! [`ReviewSource`]), the path bookkeeping that feeds it, and the UI state read
//! by the render module. Background results arrive through the `apply_*`
//! methods; user commands through the keybinding dispatcher. No ratatui
//! rendering logic lives here.

use std::collections::{HashMap, HashSet};

use ratatui::widgets::ListState;
use revtree_core::types::{session_identity, FileReviewState};
use revtree_core::{
    BulkPolicy, CheckState, Dispatcher, EngineError, LeafId, LeafStateSource, NodePresentation,
    NodeRef, NodeUpdate, Outcome, PresentationSink, TreeBuilder, TreeEvent, TreeSession,
};

use crate::git::types::{DiffMode, FileSummary, GitRequest, GitResultPayload};
use crate::store::{ReviewSource, SessionLoad};

/// Which keybinding set is active.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Tree navigation (default).
    #[default]
    Normal,
    /// Full-screen help overlay is shown above all panels.
    HelpOverlay,
}

/// Presentation sink holding the last marker state of every node.
#[derive(Debug, Default)]
pub struct TreeView {
    marks: HashMap<NodeRef, NodePresentation>,
    /// Set when a presentation changed since the rows were last rebuilt.
    dirty: bool,
}

impl TreeView {
    pub fn mark(&self, node: NodeRef) -> Option<NodePresentation> {
        self.marks.get(&node).copied()
    }

    pub fn clear(&mut self) {
        self.marks.clear();
        self.dirty = true;
    }

    /// Drops the marks of nodes from sessions other than `epoch`.
    pub fn retain_epoch(&mut self, epoch: u64) {
        self.marks.retain(|node, _| node.epoch() == epoch);
        self.dirty = true;
    }
}

impl PresentationSink for TreeView {
    fn present(&mut self, update: NodeUpdate) {
        self.marks.insert(update.node, update.presentation);
        self.dirty = true;
    }
}

pub type ReviewTree = Dispatcher<ReviewSource, TreeView>;

/// Display label of a node: the directory label, or the file name of a leaf.
pub fn node_label(session: &TreeSession, node: NodeRef) -> &str {
    match node {
        NodeRef::Aggregate(id) => session.aggregate(id).map_or("", |n| n.label()),
        NodeRef::Leaf(id) => {
            session.leaf(id).map_or("", |n| n.key().rsplit('/').next().unwrap_or(n.key()))
        }
    }
}

/// All mutable state passed through every render cycle.
pub struct AppState {
    /// Current mode governing which keybindings are active.
    pub mode: Mode,
    /// The review tree and its collaborators.
    pub tree: ReviewTree,
    /// Path-to-node bookkeeping for the current session.
    pub builder: TreeBuilder,
    /// Visible rows in display order, with depth.
    pub rows: Vec<(NodeRef, usize)>,
    /// Stateful list widget backing the tree panel.
    pub list_state: ListState,
    /// Change summaries of the current listing, by path.
    pub files: HashMap<String, FileSummary>,
    /// Currently active diff mode.
    pub diff_mode: DiffMode,
    /// True while the git thread is listing changes.
    pub loading: bool,
    /// One-line message shown in the status bar until the next key.
    pub status: Option<String>,
    /// Vertical scroll offset for the help overlay.
    pub help_scroll: u16,
    /// Inner height of the tree panel, cached after each render.
    pub viewport_height: u16,
    /// Absolute path of the repository under review.
    pub repo_path: String,
    /// Sender to the git background thread.
    pub git_tx: Option<crossbeam_channel::Sender<GitRequest>>,
}

impl AppState {
    pub fn new(
        source: ReviewSource,
        policy: BulkPolicy,
        compact_directories: bool,
        repo_path: String,
    ) -> Self {
        Self {
            mode: Mode::default(),
            tree: Dispatcher::new(policy, source, TreeView::default()),
            builder: TreeBuilder::new().compact_directories(compact_directories),
            rows: Vec::new(),
            list_state: ListState::default(),
            files: HashMap::new(),
            diff_mode: DiffMode::default(),
            loading: false,
            status: None,
            help_scroll: 0,
            viewport_height: 0,
            repo_path,
            git_tx: None,
        }
    }

    // -----------------------------------------------------------------------
    // Background results
    // -----------------------------------------------------------------------

    /// Folds a fresh listing of changed files into the tree.
    ///
    /// A different diff mode starts a new session. A listing that dropped a
    /// known file rebuilds the session's tree from scratch, keeping the
    /// reviewed flags already loaded. Returns the load the caller must start
    /// when the session's flags are not available yet.
    pub fn apply_git_result(&mut self, payload: GitResultPayload) -> Option<SessionLoad> {
        self.loading = false;
        self.diff_mode = payload.mode;
        let identity = session_identity(&self.repo_path, payload.mode.as_str(), "");

        let listed: HashSet<&str> = payload.files.iter().map(|f| f.path.as_str()).collect();
        let vanished = self.builder.files().any(|(path, _)| !listed.contains(path));
        if vanished && self.tree.identity() == Some(identity.as_str()) {
            tracing::debug!(%identity, "files left the listing; rebuilding tree");
            let _ = self.dispatch(TreeEvent::SessionReset);
        }

        if let Ok(Outcome::SessionChanged { epoch }) =
            self.dispatch(TreeEvent::SessionStarted { identity: identity.clone() })
        {
            tracing::info!(%identity, epoch, "review session started");
            self.tree.sink_mut().clear();
            self.list_state.select(Some(0));
        }
        let needs_load = self.tree.source_mut().begin(&identity);

        let paths: Vec<&str> = payload.files.iter().map(|f| f.path.as_str()).collect();
        match self.builder.discover(&mut self.tree, paths) {
            Ok(report) if report.rebuilt => {
                let epoch = self.tree.session().epoch();
                self.tree.sink_mut().retain_epoch(epoch);
                self.list_state.select(Some(0));
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(%err, "discovery failed");
                self.status = Some(format!("tree error: {err}"));
            }
        }
        self.files = payload.files.into_iter().map(|f| (f.path.clone(), f)).collect();
        self.refresh_rows();

        needs_load.then(|| SessionLoad {
            identity,
            repo_path: self.repo_path.clone(),
            diff_mode: payload.mode.as_str().to_owned(),
        })
    }

    /// Resolves every pending file from the loaded rows of `identity`.
    pub fn apply_reviews(&mut self, identity: &str, session_id: String, rows: Vec<FileReviewState>) {
        if self.tree.source().identity() != Some(identity) {
            tracing::debug!(%identity, "dropping review rows for a previous session");
            return;
        }
        self.tree.source_mut().load(session_id, rows);

        let pending: Vec<(LeafId, bool)> = self
            .builder
            .files()
            .filter(|(_, leaf)| {
                self.tree.session().leaf(*leaf).is_some_and(|node| node.state().is_unknown())
            })
            .map(|(path, leaf)| (leaf, self.tree.source().read(path).unwrap_or(false)))
            .collect();
        for (leaf, checked) in pending {
            let _ = self.dispatch(TreeEvent::LeafResolved { leaf, checked });
        }
        self.refresh_rows();
    }

    /// Confirms a reviewed flag the store has committed.
    ///
    /// The leaf is looked up by path: the tree may have been rebuilt since the
    /// write was issued.
    pub fn apply_review_written(&mut self, identity: &str, key: &str, checked: bool) {
        if self.tree.source().identity() != Some(identity) {
            return;
        }
        self.tree.source_mut().record(key, checked);
        if let Some(leaf) = self.builder.leaf_for(key) {
            let _ = self.dispatch(TreeEvent::LeafChanged { leaf, checked });
        }
        self.refresh_rows();
    }

    /// Forwards `event` to the tree. Refusals are already logged by the
    /// dispatcher; stale references are expected after a session change.
    fn dispatch(&mut self, event: TreeEvent) -> Result<Outcome, EngineError> {
        self.tree.dispatch(event)
    }

    // -----------------------------------------------------------------------
    // User commands
    // -----------------------------------------------------------------------

    /// Toggles the selected row.
    ///
    /// A file flips its reviewed flag. A directory that is fully reviewed is
    /// cleared; any other directory has every file below it marked reviewed.
    pub fn toggle_selected(&mut self) {
        let Some(node) = self.selected_node() else {
            return;
        };
        let event = match node {
            NodeRef::Leaf(leaf) => {
                let Some(current) = self.tree.session().leaf(leaf).map(|n| n.state()) else {
                    return;
                };
                TreeEvent::LeafSetRequested { leaf, checked: !current.checked().unwrap_or(false) }
            }
            NodeRef::Aggregate(aggregate) => {
                let Some(state) = self.tree.session().aggregate(aggregate).map(|n| n.check_state())
                else {
                    return;
                };
                TreeEvent::BulkSetRequested { aggregate, checked: state != CheckState::Checked }
            }
        };
        match self.dispatch(event) {
            Ok(Outcome::Propagated { writes: 0, .. }) if self.is_pending(node) => {
                self.status = Some("reviewed state still loading; will apply when ready".to_owned());
            }
            Ok(_) => {}
            Err(EngineError::PendingTarget { .. }) => {
                self.status = Some("reviewed state still loading; try again shortly".to_owned());
            }
            Err(err) => self.status = Some(err.to_string()),
        }
        self.refresh_rows();
    }

    /// Switches to the next diff mode and asks git for its listing.
    pub fn cycle_diff_mode(&mut self) {
        let next = self.diff_mode.next();
        self.diff_mode = next;
        self.request_listing();
    }

    /// Asks git for the listing of the current diff mode.
    pub fn request_listing(&mut self) {
        if let Some(tx) = &self.git_tx {
            if tx.send(GitRequest::ListChanges(self.diff_mode)).is_ok() {
                self.loading = true;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Rows and selection
    // -----------------------------------------------------------------------

    /// Rebuilds the visible rows if any node changed since the last rebuild.
    pub fn refresh_rows(&mut self) {
        if !std::mem::take(&mut self.tree.sink_mut().dirty) {
            return;
        }
        self.rows = self.tree.session().walk();
        match self.list_state.selected() {
            _ if self.rows.is_empty() => self.list_state.select(None),
            Some(i) if i >= self.rows.len() => self.list_state.select(Some(self.rows.len() - 1)),
            None => self.list_state.select(Some(0)),
            Some(_) => {}
        }
    }

    pub fn selected_node(&self) -> Option<NodeRef> {
        self.list_state.selected().and_then(|i| self.rows.get(i)).map(|(node, _)| *node)
    }

    fn is_pending(&self, node: NodeRef) -> bool {
        self.tree.session().presentation(node).is_some_and(|p| p.pending)
    }

    /// Display label of a row: directory label, or file name for a leaf.
    pub fn label(&self, node: NodeRef) -> &str {
        node_label(self.tree.session(), node)
    }

    /// (reviewed, total) file counts of the current tree.
    pub fn progress(&self) -> (usize, usize) {
        let session = self.tree.session();
        let reviewed = session.leaves().filter(|l| l.state().checked() == Some(true)).count();
        (reviewed, session.leaf_count())
    }

    pub fn select_next(&mut self, rows: u16) {
        self.list_state.scroll_down_by(rows);
    }

    pub fn select_prev(&mut self, rows: u16) {
        self.list_state.scroll_up_by(rows);
    }

    pub fn select_first(&mut self) {
        self.list_state.select_first();
    }

    pub fn select_last(&mut self) {
        self.list_state.select(self.rows.len().checked_sub(1));
    }

    /// Moves the selection by half the visible height (at least one row).
    pub fn half_page_down(&mut self) {
        self.select_next((self.viewport_height / 2).max(1));
    }

    pub fn half_page_up(&mut self) {
        self.select_prev((self.viewport_height / 2).max(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revtree_core::LeafState;

    fn summary(path: &str) -> FileSummary {
        FileSummary { path: path.to_owned(), status: 'M', added: 1, removed: 0 }
    }

    fn state_with(paths: &[&str]) -> AppState {
        let mut state =
            AppState::new(ReviewSource::memory(), BulkPolicy::Defer, false, "/repo".to_owned());
        let load = state.apply_git_result(GitResultPayload {
            mode: DiffMode::Unstaged,
            files: paths.iter().map(|p| summary(p)).collect(),
        });
        assert!(load.is_none());
        state
    }

    fn select(state: &mut AppState, node: NodeRef) {
        let index = state.rows.iter().position(|(n, _)| *n == node).unwrap();
        state.list_state.select(Some(index));
    }

    #[test]
    fn listing_builds_rows_with_the_root_first() {
        let state = state_with(&["src/lib.rs", "README.md"]);
        assert_eq!(state.rows.len(), 4);
        assert_eq!(state.label(state.rows[0].0), "All Files");
        assert_eq!(state.label(state.rows[2].0), "lib.rs");
        assert_eq!(state.progress(), (0, 2));
        assert_eq!(state.selected_node(), Some(state.rows[0].0));
    }

    #[test]
    fn toggling_the_root_reviews_everything_and_back() {
        let mut state = state_with(&["src/lib.rs", "README.md"]);
        let root = state.builder.root().unwrap();
        select(&mut state, root.into());

        state.toggle_selected();
        assert_eq!(state.progress(), (2, 2));
        assert!(state.tree.sink().mark(root.into()).unwrap().checked);

        state.toggle_selected();
        assert_eq!(state.progress(), (0, 2));
        assert!(!state.tree.sink().mark(root.into()).unwrap().checked);
    }

    #[test]
    fn toggling_a_file_marks_its_directory_partial() {
        let mut state = state_with(&["src/a.rs", "src/b.rs"]);
        let leaf = state.builder.leaf_for("src/a.rs").unwrap();
        select(&mut state, leaf.into());

        state.toggle_selected();

        let src = state.builder.aggregate_for("src").unwrap();
        let mark = state.tree.sink().mark(src.into()).unwrap();
        assert!(mark.partial && !mark.checked);
        assert_eq!(state.tree.session().leaf(leaf).unwrap().state(), LeafState::Checked);
    }

    #[test]
    fn new_diff_mode_starts_an_empty_session() {
        let mut state = state_with(&["a.rs"]);
        let old_leaf = state.builder.leaf_for("a.rs").unwrap();
        select(&mut state, old_leaf.into());
        state.toggle_selected();

        state.apply_git_result(GitResultPayload {
            mode: DiffMode::Staged,
            files: vec![summary("a.rs")],
        });

        let leaf = state.builder.leaf_for("a.rs").unwrap();
        assert_ne!(leaf, old_leaf);
        assert_eq!(state.progress(), (0, 1));
        assert_eq!(state.tree.identity(), Some("/repo#staged"));
    }

    #[test]
    fn vanished_file_rebuilds_the_tree_keeping_flags() {
        let mut state = state_with(&["a.rs", "b.rs"]);
        let a = state.builder.leaf_for("a.rs").unwrap();
        select(&mut state, a.into());
        state.toggle_selected();

        state.apply_git_result(GitResultPayload {
            mode: DiffMode::Unstaged,
            files: vec![summary("a.rs")],
        });

        assert!(state.builder.leaf_for("b.rs").is_none());
        assert_eq!(state.progress(), (1, 1));
        assert_eq!(state.rows.len(), 2);
    }

    #[test]
    fn write_confirmed_after_a_rebuild_reaches_the_new_leaf() {
        let mut state = state_with(&["a.rs", "b.rs"]);
        let old_a = state.builder.leaf_for("a.rs").unwrap();

        state.apply_git_result(GitResultPayload {
            mode: DiffMode::Unstaged,
            files: vec![summary("a.rs")],
        });
        assert_ne!(state.builder.leaf_for("a.rs"), Some(old_a));

        state.apply_review_written("/repo#unstaged", "a.rs", true);

        assert_eq!(state.tree.source().read("a.rs"), Some(true));
        let a = state.builder.leaf_for("a.rs").unwrap();
        assert_eq!(state.tree.session().leaf(a).unwrap().state(), LeafState::Checked);
        assert_eq!(state.progress(), (1, 1));
    }

    #[test]
    fn compacted_chain_split_drops_stale_marks() {
        let mut state =
            AppState::new(ReviewSource::memory(), BulkPolicy::Defer, true, "/repo".to_owned());
        state.apply_git_result(GitResultPayload {
            mode: DiffMode::Unstaged,
            files: vec![summary("a/b/x.rs")],
        });
        let chain = state.builder.aggregate_for("a/b").unwrap();
        assert!(state.tree.sink().mark(chain.into()).is_some());

        state.apply_git_result(GitResultPayload {
            mode: DiffMode::Unstaged,
            files: vec![summary("a/b/x.rs"), summary("a/y.rs")],
        });

        assert!(state.tree.sink().mark(chain.into()).is_none());
        let a = state.builder.aggregate_for("a").unwrap();
        assert!(state.tree.sink().mark(a.into()).is_some());
        assert_eq!(state.rows.len(), 5);
        assert_eq!(state.label(state.rows[1].0), "a");
    }

    #[test]
    fn stale_review_rows_are_ignored() {
        let mut state = state_with(&["a.rs"]);
        state.apply_reviews(
            "/repo#staged",
            "other".to_owned(),
            vec![FileReviewState {
                session_id: "other".to_owned(),
                file_path: "a.rs".to_owned(),
                reviewed: true,
                reviewed_at: None,
            }],
        );
        assert_eq!(state.progress(), (0, 1));
    }
}
