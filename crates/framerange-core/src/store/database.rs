//! SQLite document store for video annotation ranges.
//!
//! Each public method opens its own connection, so a `Database` is just a
//! resolved path and can be shared freely between threads. Serializing
//! concurrent writers to the same video is the caller's job (see
//! [`crate::store::locks::VideoLocks`]).

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::errors::{FrameRangeError, FrameRangeResult};
use crate::models::{RangeLabel, VideoAnnotationRangeDocument};
use crate::range::{VideoAnnotationRange, DEFAULT_LOOKUP_CACHE_CAPACITY};
use crate::store::schema;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Helper: tilde expansion
// ---------------------------------------------------------------------------

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut expanded = PathBuf::from(home);
            if path.len() > 2 {
                expanded.push(&path[2..]);
            }
            return expanded;
        }
    }
    PathBuf::from(path)
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// SQLite store holding one range document per video.
#[derive(Clone, Debug)]
pub struct Database {
    db_path: PathBuf,
    cache_capacity: usize,
}

impl Database {
    /// Create a new `Database`. The path is expanded and parent directories
    /// are created if they do not already exist.
    pub fn new(db_path: impl AsRef<Path>) -> FrameRangeResult<Self> {
        let db_str = db_path.as_ref().to_string_lossy();
        let expanded = expand_tilde(&db_str);
        let resolved = if expanded.is_absolute() {
            expanded
        } else {
            std::env::current_dir()?.join(&expanded)
        };
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            db_path: resolved,
            cache_capacity: DEFAULT_LOOKUP_CACHE_CAPACITY,
        })
    }

    /// Lookup-cache capacity given to ranges loaded from this store.
    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a new SQLite connection to `self.db_path` with foreign keys on
    /// and a busy timeout for concurrent writers.
    fn connect(&self) -> FrameRangeResult<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    // -----------------------------------------------------------------------
    // Schema / meta
    // -----------------------------------------------------------------------

    /// Initialise the database schema: set WAL mode, create all tables and
    /// indexes, then run pending migrations.
    pub fn init_schema(&self) -> FrameRangeResult<()> {
        let conn = self.connect()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        for stmt in schema::SCHEMA_STATEMENTS {
            conn.execute_batch(stmt)?;
        }
        schema::migrate_schema(&conn)?;
        info!(path = %self.db_path.display(), "range store ready");
        Ok(())
    }

    pub fn schema_version(&self) -> FrameRangeResult<i32> {
        let conn = self.connect()?;
        Ok(schema::get_schema_version(&conn))
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    /// Insert or replace the stored document for `range.video_id()`.
    pub fn save(&self, range: &VideoAnnotationRange) -> FrameRangeResult<()> {
        let conn = self.connect()?;
        let range_labels_json = serde_json::to_string(range.range_labels())?;
        conn.execute(
            "INSERT INTO video_annotation_ranges(id, video_id, range_labels_json, interval_count) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(video_id) DO UPDATE SET \
                id = excluded.id, \
                range_labels_json = excluded.range_labels_json, \
                interval_count = excluded.interval_count, \
                updated_at = CURRENT_TIMESTAMP;",
            params![
                range.id(),
                range.video_id(),
                range_labels_json,
                range.len() as i64
            ],
        )?;
        info!(
            video_id = %range.video_id(),
            intervals = range.len(),
            "saved range annotation"
        );
        Ok(())
    }

    /// Load the stored range for `video_id`, or `None` when nothing is stored.
    ///
    /// Stored intervals are validated and renormalized on the way in.
    pub fn load(&self, video_id: &str) -> FrameRangeResult<Option<VideoAnnotationRange>> {
        let conn = self.connect()?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT id, range_labels_json FROM video_annotation_ranges WHERE video_id = ?1;",
                params![video_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((id, range_labels_json)) = row else {
            debug!(video_id, "no stored range annotation");
            return Ok(None);
        };

        let range_labels: Vec<RangeLabel> =
            serde_json::from_str(&range_labels_json).map_err(|e| {
                FrameRangeError::Database(format!(
                    "corrupt range document for video {video_id}: {e}"
                ))
            })?;
        let doc = VideoAnnotationRangeDocument {
            id,
            video_id: video_id.to_string(),
            range_labels,
        };
        Ok(Some(VideoAnnotationRange::from_document(
            doc,
            self.cache_capacity,
        )))
    }

    /// Delete the stored range for `video_id`; returns whether a row was removed.
    pub fn delete(&self, video_id: &str) -> FrameRangeResult<bool> {
        let conn = self.connect()?;
        let removed = conn.execute(
            "DELETE FROM video_annotation_ranges WHERE video_id = ?1;",
            params![video_id],
        )?;
        if removed > 0 {
            info!(video_id, "deleted range annotation");
        }
        Ok(removed > 0)
    }

    pub fn list_video_ids(&self) -> FrameRangeResult<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT video_id FROM video_annotation_ranges ORDER BY video_id;")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    pub fn count(&self) -> FrameRangeResult<i64> {
        let conn = self.connect()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM video_annotation_ranges;",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
