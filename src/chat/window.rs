// src/chat/window.rs
// Commit time windows: which stretch of chat history can belong to a commit.

use crate::error::{Result, ScribeError};
use crate::git::commit::commit_info;
use std::path::Path;

/// Upper cap on window length when no parent bound exists (initial commits)
/// or when parent timestamps are pathological.
const MAX_WINDOW_MS: i64 = 48 * 60 * 60 * 1000;

/// Inclusive time bounds in milliseconds since epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn duration_ms(&self) -> i64 {
        self.end - self.start
    }
}

/// Compute the time window for a commit.
///
/// `start` is the first parent's author time; merge commits are treated as
/// normal commits against their first parent. The initial commit gets a flat
/// 48 h window, which also serves as the cap when a parent timestamp is
/// newer than the commit itself (clock skew, rebases).
pub fn window_for(repo: &Path, rev: &str) -> Result<TimeWindow> {
    let info = commit_info(repo, rev).map_err(ScribeError::Git)?;
    let end = info.author_time_ms;

    let start = match info.first_parent() {
        Some(parent) => {
            let parent_info = commit_info(repo, parent).map_err(ScribeError::Git)?;
            let parent_time = parent_info.author_time_ms;
            if parent_time > end {
                end - MAX_WINDOW_MS
            } else {
                parent_time
            }
        }
        None => end - MAX_WINDOW_MS,
    };

    Ok(TimeWindow::new(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn git(dir: &Path, args: &[&str], author_date: &str) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_AUTHOR_NAME", "Test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "Test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .env("GIT_AUTHOR_DATE", author_date)
            .env("GIT_COMMITTER_DATE", author_date)
            .status()
            .expect("run git");
        assert!(status.success(), "git {args:?} failed");
    }

    fn commit_file(dir: &Path, name: &str, epoch_secs: i64) {
        std::fs::write(dir.join(name), name).expect("write");
        git(dir, &["add", "."], &format!("{epoch_secs} +0000"));
        git(
            dir,
            &["commit", "-q", "-m", name],
            &format!("{epoch_secs} +0000"),
        );
    }

    #[test]
    fn test_initial_commit_window_is_48h() {
        let tmp = tempfile::tempdir().expect("tempdir");
        git(tmp.path(), &["init", "-q"], "1747400000 +0000");
        commit_file(tmp.path(), "a.txt", 1747400000);

        let window = window_for(tmp.path(), "HEAD").expect("window");
        assert_eq!(window.end, 1747400000000);
        assert_eq!(window.duration_ms(), MAX_WINDOW_MS);
    }

    #[test]
    fn test_window_starts_at_parent_author_time() {
        let tmp = tempfile::tempdir().expect("tempdir");
        git(tmp.path(), &["init", "-q"], "1747400000 +0000");
        commit_file(tmp.path(), "a.txt", 1747400000);
        commit_file(tmp.path(), "b.txt", 1747450000);

        let window = window_for(tmp.path(), "HEAD").expect("window");
        assert_eq!(window.start, 1747400000000);
        assert_eq!(window.end, 1747450000000);
    }

    #[test]
    fn test_merge_uses_first_parent() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let repo = tmp.path();
        git(repo, &["init", "-q"], "1747400000 +0000");
        commit_file(repo, "a.txt", 1747400000);
        git(repo, &["checkout", "-q", "-b", "feature"], "1747410000 +0000");
        commit_file(repo, "f.txt", 1747410000);
        git(repo, &["checkout", "-q", "-"], "1747420000 +0000");
        commit_file(repo, "m.txt", 1747420000);
        git(
            repo,
            &["merge", "-q", "--no-ff", "-m", "merge", "feature"],
            "1747430000 +0000",
        );

        let window = window_for(repo, "HEAD").expect("window");
        // First parent is the mainline commit at 1747420000
        assert_eq!(window.start, 1747420000000);
        assert_eq!(window.end, 1747430000000);
    }
}
