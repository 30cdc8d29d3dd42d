// src/git/commit.rs
// Commit metadata via the git CLI

use super::{git_cmd, validate_ref};
use std::path::Path;

/// Metadata for a single commit.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// Full 40-char hash.
    pub hash: String,
    pub author: String,
    /// Author time in milliseconds since epoch.
    pub author_time_ms: i64,
    /// Full commit message.
    pub message: String,
    /// Parent hashes; empty for the repository's initial commit.
    pub parents: Vec<String>,
}

impl CommitInfo {
    pub fn short_hash(&self) -> &str {
        &self.hash[..self.hash.len().min(7)]
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// First parent, if any. Merge commits are treated as normal commits
    /// against their first parent; secondary-parent history is ignored.
    pub fn first_parent(&self) -> Option<&str> {
        self.parents.first().map(String::as_str)
    }
}

/// Field separator for the log format; does not occur in commit messages.
const FIELD_SEP: char = '\u{1f}';

/// Fetch commit metadata for a rev (hash, symbolic ref, HEAD).
pub fn commit_info(repo: &Path, rev: &str) -> Result<CommitInfo, String> {
    validate_ref(rev)?;
    let format = format!("%H{FIELD_SEP}%an <%ae>{FIELD_SEP}%at{FIELD_SEP}%P{FIELD_SEP}%B");
    let output = git_cmd(repo, &["show", "-s", &format!("--format={format}"), rev])?;
    parse_commit_record(&output).ok_or_else(|| format!("Unparseable commit record for '{rev}'"))
}

pub(crate) fn parse_commit_record(record: &str) -> Option<CommitInfo> {
    let mut parts = record.splitn(5, FIELD_SEP);
    let hash = parts.next()?.trim().to_string();
    if hash.len() != 40 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let author = parts.next()?.trim().to_string();
    let author_time_secs: i64 = parts.next()?.trim().parse().ok()?;
    let parents: Vec<String> = parts
        .next()?
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let message = parts.next().unwrap_or("").trim().to_string();

    Some(CommitInfo {
        hash,
        author,
        author_time_ms: author_time_secs * 1000,
        message,
        parents,
    })
}

/// Current HEAD commit hash, if the path is a repository with commits.
pub fn head_commit(repo: &Path) -> Option<String> {
    let hash = git_cmd(repo, &["rev-parse", "HEAD"]).ok()?;
    if hash.len() == 40 && hash.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(hash)
    } else {
        None
    }
}

/// Whether a commit has no parents.
pub fn is_initial_commit(info: &CommitInfo) -> bool {
    info.parents.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hash: &str, parents: &str) -> String {
        format!(
            "{hash}{FIELD_SEP}Dev Eloper <dev@example.com>{FIELD_SEP}1747400000{FIELD_SEP}{parents}{FIELD_SEP}fix: unbreak the thing\n\nlonger body\n"
        )
    }

    #[test]
    fn test_parse_commit_record() {
        let hash = "a".repeat(40);
        let parent = "b".repeat(40);
        let info = parse_commit_record(&record(&hash, &parent)).expect("parse");
        assert_eq!(info.hash, hash);
        assert_eq!(info.author, "Dev Eloper <dev@example.com>");
        assert_eq!(info.author_time_ms, 1747400000000);
        assert_eq!(info.parents, vec![parent]);
        assert!(info.message.starts_with("fix: unbreak the thing"));
        assert!(!info.is_merge());
    }

    #[test]
    fn test_parse_initial_commit_has_no_parents() {
        let hash = "c".repeat(40);
        let info = parse_commit_record(&record(&hash, "")).expect("parse");
        assert!(info.parents.is_empty());
        assert!(is_initial_commit(&info));
    }

    #[test]
    fn test_parse_merge_commit() {
        let hash = "a".repeat(40);
        let p1 = "b".repeat(40);
        let p2 = "c".repeat(40);
        let info = parse_commit_record(&record(&hash, &format!("{p1} {p2}"))).expect("parse");
        assert!(info.is_merge());
        assert_eq!(info.first_parent(), Some(p1.as_str()));
    }

    #[test]
    fn test_parse_rejects_bad_hash() {
        assert!(parse_commit_record(&record("abc123", "")).is_none());
    }

    #[test]
    fn test_short_hash() {
        let hash = "deadbeef".to_string() + &"0".repeat(32);
        let info = parse_commit_record(&record(&hash, "")).expect("parse");
        assert_eq!(info.short_hash(), "deadbee");
    }
}
