// src/git/context.rs
// Git evidence collection for journal entries.
//
// Changes under the journal root are filtered out before stats and diff are
// computed; otherwise every generated entry would feed the next one.

use super::commit::{CommitInfo, commit_info};
use super::{git_cmd, git_cmd_opt};
use crate::error::{Result, ScribeError};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// git's well-known empty tree object, used to diff the initial commit.
const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// Rough magnitude of a commit, used to steer prompt verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    Small,
    Medium,
    Large,
}

impl SizeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    fn classify(file_count: usize, line_count: i64) -> Self {
        if file_count > 20 || line_count > 1000 {
            Self::Large
        } else if file_count > 3 || line_count > 100 {
            Self::Medium
        } else {
            Self::Small
        }
    }
}

/// File counts by change kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStats {
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
}

/// Everything the generators may know about a commit.
#[derive(Debug, Clone)]
pub struct GitContext {
    pub commit_hash: String,
    pub author: String,
    /// Author time in milliseconds since epoch.
    pub author_time_ms: i64,
    pub message: String,
    pub parent_hash: Option<String>,
    /// Changed paths with self-writes already removed.
    pub changed_files: Vec<String>,
    /// Unified diff limited to the changed files above. Binary bodies are
    /// omitted by git itself; their paths remain.
    pub diff_summary: String,
    pub file_stats: FileStats,
    pub size_class: SizeClass,
    pub is_merge: bool,
}

impl GitContext {
    pub fn short_hash(&self) -> &str {
        &self.commit_hash[..self.commit_hash.len().min(7)]
    }

    /// True when nothing outside the journal root changed. Such commits are
    /// skipped by the tool surface.
    pub fn is_journal_only(&self) -> bool {
        self.changed_files.is_empty()
    }
}

/// Normalize a journal root to a repo-relative prefix for path filtering.
fn journal_prefix(repo: &Path, journal_root: &Path) -> PathBuf {
    journal_root
        .strip_prefix(repo)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| journal_root.to_path_buf())
}

/// Whether a repo-relative changed path lands under the journal root.
fn is_self_write(path: &str, prefix: &Path) -> bool {
    Path::new(path).starts_with(prefix)
}

/// Collect the git evidence for one commit.
#[instrument(name = "git.collect_context", skip_all, fields(commit = rev, changed_files, size_class))]
pub fn collect_git_context(repo: &Path, rev: &str, journal_root: &Path) -> Result<GitContext> {
    let info = commit_info(repo, rev).map_err(ScribeError::Git)?;
    let prefix = journal_prefix(repo, journal_root);

    let (changed, stats) = changed_files_with_stats(repo, &info, &prefix)?;
    let line_count = diff_line_count(repo, &info, &changed);
    let diff_summary = if changed.is_empty() {
        String::new()
    } else {
        diff_for_files(repo, &info, &changed)?
    };

    let size_class = SizeClass::classify(changed.len(), line_count);
    let span = tracing::Span::current();
    span.record("changed_files", changed.len());
    span.record("size_class", size_class.as_str());

    Ok(GitContext {
        parent_hash: info.first_parent().map(str::to_string),
        is_merge: info.is_merge(),
        commit_hash: info.hash,
        author: info.author,
        author_time_ms: info.author_time_ms,
        message: info.message,
        changed_files: changed,
        diff_summary,
        file_stats: stats,
        size_class,
    })
}

/// The ref to diff against: first parent, or the empty tree for the
/// repository's initial commit.
fn base_ref(info: &CommitInfo) -> String {
    info.first_parent()
        .map(str::to_string)
        .unwrap_or_else(|| EMPTY_TREE.to_string())
}

fn changed_files_with_stats(
    repo: &Path,
    info: &CommitInfo,
    journal_prefix: &Path,
) -> Result<(Vec<String>, FileStats)> {
    let base = base_ref(info);
    let output = git_cmd(
        repo,
        &["diff-tree", "-r", "--name-status", &base, &info.hash],
    )
    .map_err(ScribeError::Git)?;

    let mut files = Vec::new();
    let mut stats = FileStats::default();
    for line in output.lines() {
        let mut parts = line.split('\t');
        let Some(status) = parts.next() else { continue };
        // Renames/copies list the destination last
        let Some(path) = parts.last() else { continue };
        let path = path.trim();
        if path.is_empty() {
            continue;
        }
        if is_self_write(path, journal_prefix) {
            debug!(path, "Filtered self-write from git context");
            continue;
        }
        match status.chars().next() {
            Some('A') => stats.added += 1,
            Some('D') => stats.deleted += 1,
            _ => stats.modified += 1,
        }
        files.push(path.to_string());
    }
    Ok((files, stats))
}

/// Total changed lines across the kept files, from numstat. Binary files
/// report "-" and are counted as zero.
fn diff_line_count(repo: &Path, info: &CommitInfo, files: &[String]) -> i64 {
    if files.is_empty() {
        return 0;
    }
    let base = base_ref(info);
    let mut args = vec!["diff", "--numstat", &base, &info.hash, "--"];
    args.extend(files.iter().map(String::as_str));
    let Some(output) = git_cmd_opt(repo, &args) else {
        return 0;
    };
    parse_numstat_lines(&output)
}

pub(crate) fn parse_numstat_lines(stdout: &str) -> i64 {
    let mut total = 0;
    for line in stdout.lines() {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() >= 3 {
            if let (Ok(added), Ok(removed)) = (parts[0].parse::<i64>(), parts[1].parse::<i64>()) {
                total += added + removed;
            }
        }
    }
    total
}

fn diff_for_files(repo: &Path, info: &CommitInfo, files: &[String]) -> Result<String> {
    let base = base_ref(info);
    let mut args = vec!["diff", "--unified=3", &base, &info.hash, "--"];
    args.extend(files.iter().map(String::as_str));
    git_cmd(repo, &args).map_err(ScribeError::Git)
}
