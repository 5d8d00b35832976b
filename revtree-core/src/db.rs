//! SQLite store for the authoritative reviewed flags.
//!
//! The aggregation engine keeps nothing across restarts; this store is the
//! external source it reads leaf states from and writes bulk commands to.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::types::{FileReviewState, Session};

/// Opens (or creates) the SQLite database at `path`, configures WAL mode,
/// and applies schema migrations via the `schema_version` table.
///
/// It sets `busy_timeout` via the `Connection` method (not a PRAGMA string) to
/// ensure the setting takes effect regardless of pragma caching.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the file cannot be opened, WAL configuration
/// fails, or schema DDL fails.
pub async fn open_db(path: &str) -> Result<Connection, tokio_rusqlite::Error> {
    let conn = Connection::open(path).await?;

    conn.call(|db| {
        db.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;",
        )?;
        db.busy_timeout(Duration::from_secs(5))?;
        db.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        crate::schema::migrate(db)?;
        Ok::<_, rusqlite::Error>(())
    })
    .await?;

    tracing::debug!(path, "review store opened");
    Ok(conn)
}

/// Returns the current Unix timestamp in seconds.
fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Finds the most recent session for `repo_path + diff_mode + diff_args`, or creates one.
///
/// On resume: updates `updated_at` to the current time via `BEGIN IMMEDIATE`.
/// On create: generates a new UUID v4, inserts the session via `BEGIN IMMEDIATE`.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the query or write transaction fails.
pub async fn detect_or_create_session(
    conn: &Connection,
    repo_path: &str,
    diff_mode: &str,
    diff_args: &str,
) -> Result<Session, tokio_rusqlite::Error> {
    let repo_path = repo_path.to_owned();
    let diff_mode = diff_mode.to_owned();
    let diff_args = diff_args.to_owned();

    conn.call(move |db| {
        let existing: Option<Session> = db
            .query_row(
                "SELECT id, repo_path, diff_mode, diff_args, created_at, updated_at
                 FROM sessions
                 WHERE repo_path = ?1 AND diff_mode = ?2 AND diff_args = ?3
                 ORDER BY updated_at DESC
                 LIMIT 1",
                rusqlite::params![&repo_path, &diff_mode, &diff_args],
                |r| {
                    Ok(Session {
                        id: r.get(0)?,
                        repo_path: r.get(1)?,
                        diff_mode: r.get(2)?,
                        diff_args: r.get(3)?,
                        created_at: r.get(4)?,
                        updated_at: r.get(5)?,
                    })
                },
            )
            .optional()?;

        let now = now_secs();
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let session = match existing {
            Some(mut session) => {
                tx.execute(
                    "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
                    rusqlite::params![now, &session.id],
                )?;
                session.updated_at = now;
                session
            }
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO sessions (id, repo_path, diff_mode, diff_args, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    rusqlite::params![&id, &repo_path, &diff_mode, &diff_args, now],
                )?;
                Session { id, repo_path, diff_mode, diff_args, created_at: now, updated_at: now }
            }
        };
        tx.commit()?;
        Ok::<_, rusqlite::Error>(session)
    })
    .await
}

/// Loads the stored reviewed state for every file within `session_id`.
///
/// Files with no row are absent from the result; callers treat them as unreviewed.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the query fails.
pub async fn load_file_review_state(
    conn: &Connection,
    session_id: &str,
) -> Result<Vec<FileReviewState>, tokio_rusqlite::Error> {
    let session_id = session_id.to_owned();

    conn.call(move |db| {
        let mut stmt = db.prepare(
            "SELECT session_id, file_path, reviewed, reviewed_at
             FROM file_review_state WHERE session_id = ?1",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![&session_id], |r| {
                Ok(FileReviewState {
                    session_id: r.get(0)?,
                    file_path: r.get(1)?,
                    reviewed: r.get(2)?,
                    reviewed_at: r.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok::<_, rusqlite::Error>(rows)
    })
    .await
}

/// Sets the reviewed flag for `file_path` within `session_id`.
///
/// Upserts inside `BEGIN IMMEDIATE`. Writing the value a file already has
/// leaves its `reviewed_at` untouched; a transition to reviewed stamps the
/// current time and a transition back clears it.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the upsert transaction fails.
pub async fn set_file_reviewed(
    conn: &Connection,
    session_id: &str,
    file_path: &str,
    reviewed: bool,
) -> Result<(), tokio_rusqlite::Error> {
    let session_id = session_id.to_owned();
    let file_path = file_path.to_owned();

    conn.call(move |db| {
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        write_reviewed(&tx, &session_id, &file_path, reviewed, now_secs())?;
        tx.commit()?;
        Ok::<_, rusqlite::Error>(())
    })
    .await
}

/// Flips the reviewed flag for `file_path` within `session_id`.
///
/// Returns the new reviewed state (`true` = reviewed, `false` = unreviewed).
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the read or upsert transaction fails.
pub async fn toggle_file_reviewed(
    conn: &Connection,
    session_id: &str,
    file_path: &str,
) -> Result<bool, tokio_rusqlite::Error> {
    let session_id = session_id.to_owned();
    let file_path = file_path.to_owned();

    conn.call(move |db| {
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let current: bool = tx
            .query_row(
                "SELECT reviewed FROM file_review_state
                 WHERE session_id = ?1 AND file_path = ?2",
                rusqlite::params![&session_id, &file_path],
                |r| r.get::<_, bool>(0),
            )
            .optional()?
            .unwrap_or(false);
        let new_state = !current;
        write_reviewed(&tx, &session_id, &file_path, new_state, now_secs())?;
        tx.commit()?;
        Ok::<_, rusqlite::Error>(new_state)
    })
    .await
}

fn write_reviewed(
    tx: &rusqlite::Transaction<'_>,
    session_id: &str,
    file_path: &str,
    reviewed: bool,
    now: i64,
) -> rusqlite::Result<()> {
    let reviewed_at: Option<i64> = if reviewed { Some(now) } else { None };
    tx.execute(
        "INSERT INTO file_review_state (session_id, file_path, reviewed, reviewed_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(session_id, file_path)
         DO UPDATE SET reviewed = excluded.reviewed,
                       reviewed_at = CASE
                           WHEN file_review_state.reviewed = excluded.reviewed
                               THEN file_review_state.reviewed_at
                           ELSE excluded.reviewed_at
                       END",
        rusqlite::params![session_id, file_path, reviewed, reviewed_at],
    )?;
    Ok(())
}

/// Updates the `updated_at` timestamp for `session_id` to the current time.
///
/// Called on quit so `detect_or_create_session` resumes the right session.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the `BEGIN IMMEDIATE` transaction fails.
pub async fn update_session_timestamp(
    conn: &Connection,
    session_id: &str,
) -> Result<(), tokio_rusqlite::Error> {
    let session_id = session_id.to_owned();

    conn.call(move |db| {
        let now = now_secs();
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute(
            "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
            rusqlite::params![now, &session_id],
        )?;
        tx.commit()?;
        Ok::<_, rusqlite::Error>(())
    })
    .await
}
