/// A review session tied to one reviewed content set.
///
/// Sessions are keyed by UUID v4 text. Each unique combination of `repo_path`,
/// `diff_mode`, and `diff_args` produces a separate session on first launch;
/// subsequent launches resume the most-recent matching session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,           // UUID v4 text
    pub repo_path: String,
    pub diff_mode: String,
    pub diff_args: String,
    pub created_at: i64,      // Unix timestamp seconds
    pub updated_at: i64,      // Unix timestamp seconds
}

impl Session {
    /// Identity of the content set this session reviews, as handed to the
    /// tree dispatcher when the session starts.
    pub fn identity(&self) -> String {
        session_identity(&self.repo_path, &self.diff_mode, &self.diff_args)
    }
}

/// Builds the content-set identity for `repo_path + diff_mode + diff_args`.
pub fn session_identity(repo_path: &str, diff_mode: &str, diff_args: &str) -> String {
    if diff_args.is_empty() {
        format!("{repo_path}#{diff_mode}")
    } else {
        format!("{repo_path}#{diff_mode}#{diff_args}")
    }
}

/// Per-file reviewed state within a session.
///
/// `reviewed_at` is set when `reviewed` transitions to `true`, cleared on untoggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReviewState {
    pub session_id: String,
    pub file_path: String,
    pub reviewed: bool,
    pub reviewed_at: Option<i64>,
}
