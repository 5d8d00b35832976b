/// DDL to create the schema_version tracking table.
///
/// Applied unconditionally on every DB open (before checking the version),
/// using `IF NOT EXISTS` so it is safe to run multiple times.
pub const SCHEMA_VERSION_DDL: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    ) STRICT;
";

/// DDL for the v1 schema.
///
/// - `sessions`: one row per reviewed content set (repository + diff mode +
///   arguments), keyed by UUID v4 text.
/// - `file_review_state`: the authoritative reviewed flag of each file within
///   a session. A file with no row has never been marked and reads as
///   unreviewed.
pub const SCHEMA_V1_SQL: &str = "
    CREATE TABLE IF NOT EXISTS sessions (
        id          TEXT    PRIMARY KEY,
        repo_path   TEXT    NOT NULL,
        diff_mode   TEXT    NOT NULL,
        diff_args   TEXT    NOT NULL DEFAULT '',
        created_at  INTEGER NOT NULL,
        updated_at  INTEGER NOT NULL
    ) STRICT;

    CREATE TABLE IF NOT EXISTS file_review_state (
        session_id  TEXT    NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        file_path   TEXT    NOT NULL,
        reviewed    INTEGER NOT NULL DEFAULT 0,
        reviewed_at INTEGER,
        PRIMARY KEY (session_id, file_path)
    ) STRICT;
";

/// v2: lookup index for session resumption by content-set identity.
pub const SCHEMA_V2_SQL: &str = "
    CREATE INDEX IF NOT EXISTS sessions_by_identity
        ON sessions (repo_path, diff_mode, diff_args, updated_at);
";

/// Forward-only migrations, applied in order. Index `i` migrates to version `i + 1`.
const MIGRATIONS: &[&str] = &[SCHEMA_V1_SQL, SCHEMA_V2_SQL];

/// Latest schema version this build knows how to produce.
pub const CURRENT_VERSION: i64 = MIGRATIONS.len() as i64;

/// Migrates the DB to [`CURRENT_VERSION`].
///
/// Idempotent: safe to call on every startup. Each missing step runs in its
/// own `BEGIN IMMEDIATE` transaction together with its version row.
///
/// # Errors
///
/// Returns `rusqlite::Error` if the DDL fails or the version row cannot be read.
pub fn migrate(db: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    db.execute_batch(SCHEMA_VERSION_DDL)?;

    let version: i64 = db
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    for (step, sql) in MIGRATIONS.iter().enumerate() {
        let target = step as i64 + 1;
        if version >= target {
            continue;
        }
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute_batch(sql)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [target])?;
        tx.commit()?;
        tracing::debug!(version = target, "applied schema migration");
    }

    Ok(())
}
