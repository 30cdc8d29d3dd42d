// src/journal/writer.rs
// Append-only journal file writer with on-demand directory creation.

use crate::error::{Result, ScribeError};
use chrono::NaiveDate;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Separator between appended blocks in a daily file.
const BLOCK_SEPARATOR: &str = "\n---\n\n";

/// Path of the daily journal file for a date.
pub fn daily_path(journal_root: &Path, date: NaiveDate) -> PathBuf {
    journal_root
        .join("daily")
        .join(format!("{}-journal.md", date.format("%Y-%m-%d")))
}

/// Create a directory if needed, keeping permission failures distinct from
/// other I/O errors.
pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| ScribeError::from_io(e, dir))
}

/// Append a rendered block to the daily file for `date`, creating parent
/// directories on demand. Returns the file path.
///
/// Entries are appended, never replaced: re-running on the same commit
/// produces a duplicate entry, and the caller is responsible for dedup if it
/// wants it.
#[instrument(name = "journal.write", skip_all, fields(path))]
pub fn write_block(journal_root: &Path, date: NaiveDate, block: &str) -> Result<PathBuf> {
    let path = daily_path(journal_root, date);
    tracing::Span::current().record("path", path.display().to_string());

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let existing = path.exists() && std::fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| ScribeError::from_io(e, &path))?;

    if existing {
        file.write_all(BLOCK_SEPARATOR.as_bytes())
            .map_err(|e| ScribeError::from_io(e, &path))?;
    }
    file.write_all(block.as_bytes())
        .map_err(|e| ScribeError::from_io(e, &path))?;
    if !block.ends_with('\n') {
        file.write_all(b"\n")
            .map_err(|e| ScribeError::from_io(e, &path))?;
    }

    crate::telemetry::outcome_counter("journal.entries_written", true);
    Ok(path)
}

/// Append a rendered journal entry.
pub fn write_entry(
    journal_root: &Path,
    entry: &crate::journal::entry::JournalEntry,
    date: NaiveDate,
) -> Result<PathBuf> {
    write_block(journal_root, date, &entry.render_markdown())
}
