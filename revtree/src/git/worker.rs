//! Background thread that owns git2::Repository for its lifetime.
//!
//! git2::Repository is !Send, so it is opened inside the thread, not passed in.
//! All communication is via channels: GitRequest in, AppEvent::GitResult out.

use std::cell::RefCell;

use crossbeam_channel::Receiver;
use git2::{Delta, Diff, DiffOptions, Repository};
use tokio::sync::mpsc::UnboundedSender;

use crate::event::AppEvent;
use crate::git::types::{DiffMode, FileSummary, GitRequest, GitResultPayload};

/// Entry point for the background thread that owns the git Repository.
///
/// Opens the Repository at `path` and loops over incoming `GitRequest` messages
/// until the channel is closed (sender dropped). Results are sent back via
/// `event_tx` as `AppEvent::GitResult`.
pub fn git_worker_loop(
    path: String,
    rx: Receiver<GitRequest>,
    event_tx: UnboundedSender<AppEvent>,
) {
    let repo = match Repository::open(&path) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(%path, error = %e, "cannot open repository");
            return;
        }
    };

    for request in rx {
        let payload = handle_request(&repo, request);
        if event_tx.send(AppEvent::GitResult(Box::new(payload))).is_err() {
            break;
        }
    }
}

/// Runs one request. On git2 errors, returns an empty file list.
fn handle_request(repo: &Repository, request: GitRequest) -> GitResultPayload {
    let GitRequest::ListChanges(mode) = request;
    match get_diff_for_mode(repo, mode) {
        Ok(diff) => {
            let files = extract_files(&diff);
            tracing::debug!(mode = mode.as_str(), files = files.len(), "listed changes");
            GitResultPayload { mode, files }
        }
        Err(e) => {
            tracing::warn!(mode = mode.as_str(), error = %e, "git diff failed");
            GitResultPayload { mode, files: Vec::new() }
        }
    }
}

/// Obtains a git2::Diff for `mode`.
///
/// Returns git2::Error on any failure (repo missing HEAD, no branch named "main", etc.).
fn get_diff_for_mode(repo: &Repository, mode: DiffMode) -> Result<Diff<'_>, git2::Error> {
    match mode {
        DiffMode::Unstaged => {
            let mut opts = DiffOptions::new();
            opts.include_untracked(true).recurse_untracked_dirs(true);
            repo.diff_index_to_workdir(None, Some(&mut opts))
        }
        DiffMode::Staged => {
            let head_tree = repo.head()?.peel_to_commit()?.tree()?;
            let mut opts = DiffOptions::new();
            repo.diff_tree_to_index(Some(&head_tree), None, Some(&mut opts))
        }
        DiffMode::BranchComparison => {
            let base_tree = repo.revparse_single("main")?.peel_to_commit()?.tree()?;
            let head_tree = repo.head()?.peel_to_commit()?.tree()?;
            let mut opts = DiffOptions::new();
            repo.diff_tree_to_tree(Some(&base_tree), Some(&head_tree), Some(&mut opts))
        }
    }
}

/// Collects per-file status info and added/removed line counts from diff deltas.
///
/// The file callback fires once per delta in order, so `files.last_mut()` in the
/// line callback always refers to the current file.
fn extract_files(diff: &Diff<'_>) -> Vec<FileSummary> {
    let files: RefCell<Vec<FileSummary>> = RefCell::new(Vec::new());

    let _ = diff.foreach(
        &mut |delta, _progress| {
            let file = match delta.status() {
                Delta::Deleted => delta.old_file(),
                _ => delta.new_file(),
            };
            let path = file
                .path()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_else(|| "unknown".to_owned());
            files.borrow_mut().push(FileSummary { path, status: status_char(delta.status()), added: 0, removed: 0 });
            true
        },
        None,
        None,
        Some(&mut |_delta, _hunk, line| {
            let mut files = files.borrow_mut();
            if let Some(f) = files.last_mut() {
                match line.origin() {
                    '+' => f.added += 1,
                    '-' => f.removed += 1,
                    _ => {}
                }
            }
            true
        }),
    );

    files.into_inner()
}

fn status_char(delta: Delta) -> char {
    match delta {
        Delta::Added | Delta::Untracked => 'A',
        Delta::Deleted => 'D',
        Delta::Renamed => 'R',
        _ => 'M',
    }
}
