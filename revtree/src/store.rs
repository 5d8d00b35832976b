//! Authoritative reviewed flags as seen by the tree engine.
//!
//! [`ReviewSource`] caches the rows of the current review session and
//! implements [`LeafStateSource`] over them. With a SQLite backend, writes are
//! committed on a tokio task and confirmed later through
//! `AppEvent::ReviewWritten`; until the session's rows have loaded, every key
//! reads as not yet available. Without a database (the store failed to open),
//! flags live in memory for the lifetime of the process and writes apply on the
//! spot.

use std::collections::HashMap;

use revtree_core::types::FileReviewState;
use revtree_core::{db, LeafStateSource, LeafWrite, WriteOutcome};
use tokio::sync::mpsc::UnboundedSender;
use tokio_rusqlite::Connection;

use crate::event::AppEvent;

enum Backend {
    Sqlite {
        conn: Connection,
        tx: UnboundedSender<AppEvent>,
    },
    Memory,
}

/// Reviewed flags of one content set, keyed by repository-relative path.
pub struct ReviewSource {
    backend: Backend,
    identity: Option<String>,
    session_id: Option<String>,
    reviewed: HashMap<String, bool>,
    loaded: bool,
}

/// What the main loop must fetch after a session change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLoad {
    pub identity: String,
    pub repo_path: String,
    pub diff_mode: String,
}

impl ReviewSource {
    pub fn sqlite(conn: Connection, tx: UnboundedSender<AppEvent>) -> Self {
        Self::with_backend(Backend::Sqlite { conn, tx })
    }

    pub fn memory() -> Self {
        Self::with_backend(Backend::Memory)
    }

    fn with_backend(backend: Backend) -> Self {
        Self {
            backend,
            identity: None,
            session_id: None,
            reviewed: HashMap::new(),
            loaded: false,
        }
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Switches to the content set `identity`, dropping cached flags of the
    /// previous one.
    ///
    /// Returns `true` if the flags must now be loaded from SQLite and handed
    /// back through [`ReviewSource::load`]. A memory backend starts empty and
    /// is ready at once.
    pub fn begin(&mut self, identity: &str) -> bool {
        if self.identity.as_deref() == Some(identity) {
            return false;
        }
        self.identity = Some(identity.to_owned());
        self.session_id = None;
        self.reviewed.clear();
        match self.backend {
            Backend::Sqlite { .. } => {
                self.loaded = false;
                true
            }
            Backend::Memory => {
                self.loaded = true;
                false
            }
        }
    }

    /// Fills the cache with the stored rows of `session_id`.
    pub fn load(&mut self, session_id: String, rows: Vec<FileReviewState>) {
        self.reviewed = rows.into_iter().map(|row| (row.file_path, row.reviewed)).collect();
        self.session_id = Some(session_id);
        self.loaded = true;
    }

    /// Records a write the store has committed.
    pub fn record(&mut self, key: &str, checked: bool) {
        self.reviewed.insert(key.to_owned(), checked);
    }

    /// Connection handle for background loads; `None` for the memory backend.
    pub fn connection(&self) -> Option<Connection> {
        match &self.backend {
            Backend::Sqlite { conn, .. } => Some(conn.clone()),
            Backend::Memory => None,
        }
    }

    /// Session row id of the loaded content set, used to stamp it on quit.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

impl LeafStateSource for ReviewSource {
    fn read(&self, key: &str) -> Option<bool> {
        if !self.loaded {
            return None;
        }
        Some(self.reviewed.get(key).copied().unwrap_or(false))
    }

    fn write(&mut self, write: &LeafWrite) -> WriteOutcome {
        let (conn, tx) = match &self.backend {
            Backend::Memory => {
                self.record(&write.key, write.checked);
                return WriteOutcome::Applied;
            }
            Backend::Sqlite { conn, tx } => (conn.clone(), tx.clone()),
        };
        let (Some(identity), Some(session_id)) = (self.identity.clone(), self.session_id.clone())
        else {
            tracing::warn!(key = %write.key, "write before the review session loaded; dropped");
            return WriteOutcome::Queued;
        };

        let LeafWrite { key, checked, .. } = write.clone();
        tokio::spawn(async move {
            match db::set_file_reviewed(&conn, &session_id, &key, checked).await {
                Ok(()) => {
                    let _ = tx.send(AppEvent::ReviewWritten { identity, key, checked });
                }
                Err(e) => tracing::error!(%key, error = %e, "failed to store reviewed flag"),
            }
        });
        WriteOutcome::Queued
    }
}

/// Resolves the DB session for `load` and fetches its rows, posting
/// `AppEvent::ReviewsLoaded` when done.
pub fn spawn_session_load(conn: Connection, load: SessionLoad, tx: UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let result = async {
            let session =
                db::detect_or_create_session(&conn, &load.repo_path, &load.diff_mode, "").await?;
            let rows = db::load_file_review_state(&conn, &session.id).await?;
            Ok::<_, tokio_rusqlite::Error>((session.id, rows))
        }
        .await;
        match result {
            Ok((session_id, rows)) => {
                tracing::debug!(identity = %load.identity, rows = rows.len(), "review rows loaded");
                let _ = tx.send(AppEvent::ReviewsLoaded { identity: load.identity, session_id, rows });
            }
            Err(e) => {
                tracing::error!(identity = %load.identity, error = %e, "failed to load review session");
            }
        }
    });
}
