//! Owned data types for the git background thread.
//!
//! All types in this module are fully owned and `Send` so they can be
//! transferred from the thread that owns the `git2::Repository` to the main
//! loop.

/// Per-file summary shown next to each file in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    /// Repository-relative path to the file, `/`-separated.
    pub path: String,
    /// Status character: `'M'` modified, `'A'` added, `'D'` deleted, `'R'` renamed.
    pub status: char,
    /// Number of lines added in this file.
    pub added: usize,
    /// Number of lines removed from this file.
    pub removed: usize,
}

/// The diff modes revtree can review.
///
/// Each mode is a separate content set: switching mode starts a different
/// review session. The default is `Unstaged` (working directory vs index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffMode {
    /// Working directory vs index (`git diff`).
    #[default]
    Unstaged,
    /// Index vs HEAD (`git diff --cached`).
    Staged,
    /// Branch comparison (`git diff main..HEAD`).
    BranchComparison,
}

impl DiffMode {
    /// Stable name stored in the `sessions.diff_mode` column.
    pub fn as_str(self) -> &'static str {
        match self {
            DiffMode::Unstaged => "unstaged",
            DiffMode::Staged => "staged",
            DiffMode::BranchComparison => "branch",
        }
    }

    /// Short label for the status bar.
    pub fn label(self) -> &'static str {
        match self {
            DiffMode::Unstaged => "Unstaged",
            DiffMode::Staged => "Staged",
            DiffMode::BranchComparison => "Branch vs main",
        }
    }

    /// The mode `Tab` switches to.
    pub fn next(self) -> Self {
        match self {
            DiffMode::Unstaged => DiffMode::Staged,
            DiffMode::Staged => DiffMode::BranchComparison,
            DiffMode::BranchComparison => DiffMode::Unstaged,
        }
    }
}

/// Commands sent from the main thread to the git background worker thread.
#[derive(Debug)]
pub enum GitRequest {
    /// List the files changed in the given mode.
    ListChanges(DiffMode),
}

/// Result payload sent from the git background thread back to the main thread.
///
/// Carried inside `AppEvent::GitResult(Box<GitResultPayload>)`.
#[derive(Debug)]
pub struct GitResultPayload {
    /// The diff mode that was requested.
    pub mode: DiffMode,
    /// Changed files in diff order. Empty if git reported an error.
    pub files: Vec<FileSummary>,
}
