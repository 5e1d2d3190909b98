//! SQLite schema DDL and migration framework for stored annotation ranges.
//!
//! [`SCHEMA_STATEMENTS`] only creates the bookkeeping tables. Everything
//! that holds range data is created by numbered steps in [`MIGRATIONS`], so
//! a fresh store and an upgraded one go through the same code.

use rusqlite::Connection;
use tracing::{info, warn};

use crate::errors::FrameRangeResult;

pub type MigrationStep = fn(&Connection) -> FrameRangeResult<()>;

/// Ordered migration steps; entry `i` upgrades a store from version `i` to
/// version `i + 1`.
pub const MIGRATIONS: &[MigrationStep] = &[create_range_tables];

/// Current schema version: the number of migration steps.
pub const SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

/// Bookkeeping DDL, safe to replay on an initialised database.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS store_meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );",
    "CREATE TABLE IF NOT EXISTS migration_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_version INTEGER NOT NULL,
        to_version INTEGER NOT NULL,
        status TEXT NOT NULL,
        error_message TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
];

const SAVEPOINT: &str = "framerange_migrate_step";

// ─── Migration framework ────────────────────────────────────────────────────

/// Bring the store from its recorded version up to [`SCHEMA_VERSION`].
///
/// Each step runs inside its own savepoint: a failing step is rolled back,
/// logged to `migration_history` as failed, and its error returned. Stores
/// that report a newer version than this build knows are left untouched.
pub fn migrate_schema(conn: &Connection) -> FrameRangeResult<()> {
    let start = get_schema_version(conn);
    if start > SCHEMA_VERSION {
        warn!(
            stored = start,
            known = SCHEMA_VERSION,
            "range store schema is newer than this build"
        );
        return Ok(());
    }

    for (index, step) in MIGRATIONS.iter().enumerate().skip(start.max(0) as usize) {
        let from = index as i32;
        run_step(conn, from, *step)?;
        info!(from, to = from + 1, "migrated range store schema");
    }
    Ok(())
}

fn run_step(conn: &Connection, from: i32, step: MigrationStep) -> FrameRangeResult<()> {
    let to = from + 1;
    conn.execute_batch(&format!("SAVEPOINT {SAVEPOINT};"))?;

    let applied = step(conn)
        .and_then(|()| set_schema_version(conn, to))
        .and_then(|()| record_migration_step(conn, from, to, "success", None));

    match applied {
        Ok(()) => {
            conn.execute_batch(&format!("RELEASE SAVEPOINT {SAVEPOINT};"))?;
            Ok(())
        }
        Err(e) => {
            warn!(from, to, "range store migration failed: {e}");
            let _ = conn.execute_batch(&format!(
                "ROLLBACK TO SAVEPOINT {SAVEPOINT}; RELEASE SAVEPOINT {SAVEPOINT};"
            ));
            let _ = record_migration_step(conn, from, to, "failed", Some(&e.to_string()));
            Err(e)
        }
    }
}

/// Recorded schema version; 0 when the key is absent or unparseable.
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row(
        "SELECT value FROM store_meta WHERE key = 'schema_version';",
        [],
        |row| row.get::<_, String>(0),
    )
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(0)
}

fn set_schema_version(conn: &Connection, version: i32) -> FrameRangeResult<()> {
    conn.execute(
        "INSERT INTO store_meta(key, value) VALUES('schema_version', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        rusqlite::params![version.to_string()],
    )?;
    Ok(())
}

fn record_migration_step(
    conn: &Connection,
    from: i32,
    to: i32,
    status: &str,
    error: Option<&str>,
) -> FrameRangeResult<()> {
    conn.execute(
        "INSERT INTO migration_history(from_version, to_version, status, error_message) \
         VALUES (?1, ?2, ?3, ?4);",
        rusqlite::params![from, to, status, error],
    )?;
    Ok(())
}

// ─── Steps ──────────────────────────────────────────────────────────────────

/// v0 -> v1: one document row per video.
fn create_range_tables(conn: &Connection) -> FrameRangeResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS video_annotation_ranges (
            id TEXT PRIMARY KEY,
            video_id TEXT NOT NULL UNIQUE,
            range_labels_json TEXT NOT NULL DEFAULT '[]',
            interval_count INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT DEFAULT CURRENT_TIMESTAMP
        );
        CREATE INDEX IF NOT EXISTS idx_ranges_updated_at
            ON video_annotation_ranges(updated_at);
        CREATE INDEX IF NOT EXISTS idx_ranges_interval_count
            ON video_annotation_ranges(interval_count);",
    )?;
    Ok(())
}
