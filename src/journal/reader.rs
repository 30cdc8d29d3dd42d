// src/journal/reader.rs
// Most recent prior entry, read back for continuity.

use crate::journal::entry::split_entries;
use crate::journal::writer::daily_path;
use chrono::NaiveDate;
use std::path::Path;
use tracing::debug;

/// Find the most recent entry at or before `date`.
///
/// Checks the current day's file first (an earlier commit today is the most
/// recent context), then walks backward over the daily directory listing.
/// Returns the raw Markdown of the last entry block, or None when the
/// journal has no history yet.
pub fn previous_entry(journal_root: &Path, date: NaiveDate) -> Option<String> {
    // Today's file may already hold entries from earlier commits.
    if let Some(block) = last_entry_of(&daily_path(journal_root, date)) {
        return Some(block);
    }

    let daily_dir = journal_root.join("daily");
    let mut dates: Vec<NaiveDate> = std::fs::read_dir(&daily_dir)
        .ok()?
        .filter_map(|e| e.ok())
        .filter_map(|e| parse_daily_date(&e.file_name().to_string_lossy()))
        .filter(|d| *d < date)
        .collect();
    dates.sort_unstable();

    for d in dates.into_iter().rev() {
        if let Some(block) = last_entry_of(&daily_path(journal_root, d)) {
            return Some(block);
        }
    }
    debug!(root = %journal_root.display(), "No prior journal entries found");
    None
}

/// Parse `YYYY-MM-DD-journal.md` into its date.
pub(crate) fn parse_daily_date(file_name: &str) -> Option<NaiveDate> {
    let stem = file_name.strip_suffix("-journal.md")?;
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

fn last_entry_of(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    split_entries(&content).last().map(|s| s.to_string())
}
