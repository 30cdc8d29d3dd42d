// src/workspace/reader.rs
// Read-only SQLite access to the IDE's workspace stores.
//
// Connections are opened per call and never cached: they are cheap, the IDE
// owns the file, and the file can rotate underneath a long-lived handle.

use crate::error::DbError;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Per-query timeout; also used as the SQLite busy timeout so we coexist
/// with the IDE's live writer.
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Discovery scan wall-clock bound.
const DISCOVER_TIMEOUT: Duration = Duration::from_secs(5);

/// Above this many candidate files the scan switches to summary mode.
const SUMMARY_MODE_THRESHOLD: usize = 100;

/// Fraction of candidates kept in summary mode.
const SUMMARY_MODE_SAMPLE: usize = 5; // keep 1 in 5 (20%)

/// The IDE's per-workspace database file name.
pub const STATE_DB_NAME: &str = "state.vscdb";

/// A read-only handle to one workspace database. Closes on drop.
pub struct WorkspaceDb {
    conn: Connection,
    path: PathBuf,
}

impl WorkspaceDb {
    /// Open a workspace database read-only and validate its shape.
    #[instrument(name = "workspace.open", skip_all, fields(path = %path.display()))]
    pub fn open_readonly(path: &Path) -> Result<Self, DbError> {
        if !path.exists() {
            return Err(DbError::NotFound(path.display().to_string()));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref code, _)
                if code.code == rusqlite::ffi::ErrorCode::PermissionDenied
                    || code.code == rusqlite::ffi::ErrorCode::CannotOpen =>
            {
                DbError::Access(format!("{}: {}", path.display(), e))
            }
            other => DbError::Query(other),
        })?;

        conn.busy_timeout(QUERY_TIMEOUT).map_err(DbError::Query)?;

        let db = Self {
            conn,
            path: path.to_path_buf(),
        };
        db.validate_schema()?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Verify `ItemTable(key TEXT, value BLOB)` exists before the first query.
    /// Catches files that are SQLite but not an IDE store.
    fn validate_schema(&self) -> Result<(), DbError> {
        let table_exists: bool = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'ItemTable'",
                [],
                |_| Ok(true),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    DbError::Schema(format!("{}: no ItemTable table", self.path.display()))
                }
                rusqlite::Error::SqliteFailure(ref code, _)
                    if code.code == rusqlite::ffi::ErrorCode::NotADatabase =>
                {
                    DbError::Schema(format!("{}: not a SQLite database", self.path.display()))
                }
                other => DbError::Query(other),
            })?;
        if !table_exists {
            return Err(DbError::Schema(format!(
                "{}: no ItemTable table",
                self.path.display()
            )));
        }

        let mut stmt = self
            .conn
            .prepare("PRAGMA table_info(ItemTable)")
            .map_err(DbError::Query)?;
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(DbError::Query)?
            .filter_map(|r| r.ok())
            .collect();
        if !columns.iter().any(|c| c == "key") || !columns.iter().any(|c| c == "value") {
            return Err(DbError::Schema(format!(
                "{}: ItemTable missing key/value columns (found {:?})",
                self.path.display(),
                columns
            )));
        }
        Ok(())
    }

    /// Fetch a single value by exact key.
    pub fn value_for_key(&self, key: &str) -> Result<Option<Vec<u8>>, DbError> {
        match self.conn.query_row(
            "SELECT value FROM ItemTable WHERE key = ?1",
            [key],
            |row| row.get::<_, Vec<u8>>(0),
        ) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::Query(e)),
        }
    }

    /// Fetch `(key, value)` rows whose key starts with the given prefix.
    pub fn values_with_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, DbError> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM ItemTable WHERE key LIKE ?1 ESCAPE '\\'")
            .map_err(DbError::Query)?;
        let rows = stmt
            .query_map([pattern], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })
            .map_err(DbError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DbError::Query)?;
        Ok(rows)
    }

    /// Run `PRAGMA integrity_check`. Expensive; explicit opt-in only.
    pub fn integrity_check(&self) -> Result<bool, DbError> {
        let result: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .map_err(DbError::Query)?;
        Ok(result == "ok")
    }
}

/// Recursively scan a directory for `state.vscdb` files.
///
/// Bounded by `max_depth` and a wall-clock timeout. Repositories of IDE
/// storage can hold hundreds of workspaces; above the threshold the scan
/// samples one candidate in five and records that it did so.
#[instrument(name = "workspace.discover", skip_all, fields(dir = %dir.display(), candidate_count, summary_mode))]
pub fn discover(dir: &Path, max_depth: usize) -> Vec<PathBuf> {
    let start = Instant::now();
    let mut candidates = Vec::new();

    for entry in walkdir::WalkDir::new(dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if start.elapsed() > DISCOVER_TIMEOUT {
            warn!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Workspace discovery timed out, returning partial results"
            );
            break;
        }
        if entry.file_type().is_file() && entry.file_name() == STATE_DB_NAME {
            candidates.push(entry.into_path());
        }
    }

    let span = tracing::Span::current();
    span.record("candidate_count", candidates.len());

    if candidates.len() > SUMMARY_MODE_THRESHOLD {
        span.record("summary_mode", true);
        crate::telemetry::counter("workspace.discover_summary_mode", 1);
        debug!(
            total = candidates.len(),
            "Too many candidate stores, sampling 20%"
        );
        candidates = candidates
            .into_iter()
            .enumerate()
            .filter(|(i, _)| i % SUMMARY_MODE_SAMPLE == 0)
            .map(|(_, p)| p)
            .collect();
    } else {
        span.record("summary_mode", false);
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store(path: &Path, rows: &[(&str, &str)]) {
        let conn = Connection::open(path).expect("create fixture db");
        conn.execute("CREATE TABLE ItemTable (key TEXT, value BLOB)", [])
            .expect("create table");
        for (key, value) in rows {
            conn.execute(
                "INSERT INTO ItemTable (key, value) VALUES (?1, ?2)",
                rusqlite::params![key, value.as_bytes()],
            )
            .expect("insert row");
        }
    }

    #[test]
    fn test_open_missing_file_is_not_found() {
        let err = WorkspaceDb::open_readonly(Path::new("/nonexistent/state.vscdb"))
            .err()
            .expect("should fail");
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[test]
    fn test_open_non_sqlite_is_schema_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(STATE_DB_NAME);
        std::fs::write(&path, "not a database at all").expect("write junk");
        let err = WorkspaceDb::open_readonly(&path).err().expect("should fail");
        assert!(matches!(err, DbError::Schema(_)), "got {err:?}");
    }

    #[test]
    fn test_open_wrong_schema_is_schema_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(STATE_DB_NAME);
        let conn = Connection::open(&path).expect("create db");
        conn.execute("CREATE TABLE Other (id INTEGER)", [])
            .expect("create table");
        drop(conn);
        let err = WorkspaceDb::open_readonly(&path).err().expect("should fail");
        assert!(matches!(err, DbError::Schema(_)));
    }

    #[test]
    fn test_value_for_key_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(STATE_DB_NAME);
        make_store(&path, &[("composer.composerData", "{\"allComposers\":[]}")]);

        let db = WorkspaceDb::open_readonly(&path).expect("open");
        let value = db
            .value_for_key("composer.composerData")
            .expect("query")
            .expect("present");
        assert_eq!(value, b"{\"allComposers\":[]}");
        assert_eq!(db.value_for_key("missing").expect("query"), None);
    }

    #[test]
    fn test_values_with_prefix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(STATE_DB_NAME);
        make_store(
            &path,
            &[
                ("bubble:c1:b1", "{}"),
                ("bubble:c1:b2", "{}"),
                ("bubble:c2:b1", "{}"),
                ("other", "{}"),
            ],
        );

        let db = WorkspaceDb::open_readonly(&path).expect("open");
        let rows = db.values_with_prefix("bubble:c1:").expect("query");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_integrity_check_ok() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(STATE_DB_NAME);
        make_store(&path, &[]);
        let db = WorkspaceDb::open_readonly(&path).expect("open");
        assert!(db.integrity_check().expect("pragma"));
    }

    #[test]
    fn test_discover_finds_nested_stores() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ws1 = dir.path().join("hash-a");
        let ws2 = dir.path().join("hash-b");
        std::fs::create_dir_all(&ws1).expect("mkdir");
        std::fs::create_dir_all(&ws2).expect("mkdir");
        make_store(&ws1.join(STATE_DB_NAME), &[]);
        make_store(&ws2.join(STATE_DB_NAME), &[]);
        std::fs::write(dir.path().join("state.txt"), "decoy").expect("write");

        let mut found = discover(dir.path(), 3);
        found.sort();
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("hash-a/state.vscdb"));
    }
}
