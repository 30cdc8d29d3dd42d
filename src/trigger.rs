// src/trigger.rs
// Post-commit trigger worker.
//
// Execution order is contractual: the entry is generated and written to
// completion before any summary work starts. Summary-first would race the
// in-flight journal write and roll up a half-written day.

use crate::config::ScribeConfig;
use crate::error::{Result, ScribeError};
use crate::generate::orchestrator::{entry_stamp, orchestrate};
use crate::git;
use crate::journal::reader::parse_daily_date;
use crate::journal::summary::generate_due_summaries;
use crate::journal::writer::write_entry;
use crate::llm::{LlmClient, build_client};
use chrono::NaiveDate;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{info, instrument, warn};

/// A lock younger than this belongs to a live invocation; older ones are
/// stale leftovers from a crash.
const LOCK_STALE_AFTER: Duration = Duration::from_secs(5 * 60);

/// Rotate the hook log above this size.
const HOOK_LOG_MAX_BYTES: u64 = 1024 * 1024;

/// Result of one entry-generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Nothing outside the journal root changed; no entry written.
    Skipped,
    Written {
        path: PathBuf,
        date: NaiveDate,
    },
}

/// Generate and write the entry for one commit. Shared by the hook worker
/// and the tool surface.
pub async fn generate_entry_for(
    repo: &Path,
    rev: &str,
    config: &ScribeConfig,
    client: Arc<dyn LlmClient>,
) -> Result<EntryOutcome> {
    let journal_root = config.journal.resolved_root(repo);

    // Journal-only commits are the writer's own output landing in git;
    // producing an entry for them would loop forever.
    let precheck = {
        let repo = repo.to_path_buf();
        let rev = rev.to_string();
        let journal_root = journal_root.clone();
        tokio::task::spawn_blocking(move || {
            git::collect_git_context(&repo, &rev, &journal_root)
        })
        .await
        .map_err(ScribeError::from)??
    };
    if precheck.is_journal_only() {
        info!(commit = precheck.short_hash(), "Journal-only commit, skipping entry");
        return Ok(EntryOutcome::Skipped);
    }

    let entry = orchestrate(repo, rev, &journal_root, client, config).await?;
    let (date, _) = entry_stamp(precheck.author_time_ms);
    let path = write_entry(&journal_root, &entry, date)?;
    info!(path = %path.display(), "Journal entry written");
    Ok(EntryOutcome::Written { path, date })
}

/// The post-commit worker. Logs every failure and swallows it; a journal
/// problem must never surface as a git problem.
#[instrument(name = "trigger.post_commit", skip_all)]
pub async fn run_post_commit(repo: &Path) {
    if let Err(e) = run_post_commit_inner(repo).await {
        warn!(error = %e, "Post-commit trigger failed");
        hook_log(
            repo,
            &format!("post-commit failed [{}]: {}", e.category(), e),
        );
    }
}

async fn run_post_commit_inner(repo: &Path) -> Result<()> {
    let config = ScribeConfig::load(repo);
    let journal_root = config.journal.resolved_root(repo);

    let Some(_lock) = HookLock::acquire(&journal_root)? else {
        info!("Another invocation holds the journal lock; skipping");
        hook_log(repo, "skipped: concurrent invocation holds the lock");
        return Ok(());
    };

    let Some(head) = git::head_commit(repo) else {
        return Err(ScribeError::Git("no HEAD commit".into()));
    };

    // InvalidKey fails everything up front: no section could succeed, and
    // the entry file must not be touched.
    let client = build_client(&config)?;

    // Remember where the journal ended before this entry lands, so the gap
    // walk knows which periods completed in the meantime.
    let last_date = latest_daily_date(&journal_root);

    let outcome = generate_entry_for(repo, &head, &config, client.clone()).await?;

    let current_date = match &outcome {
        EntryOutcome::Written { date, .. } => *date,
        EntryOutcome::Skipped => {
            // Entry skipped, but calendar boundaries may still have passed.
            let info = git::commit_info(repo, &head).map_err(ScribeError::Git)?;
            entry_stamp(info.author_time_ms).0
        }
    };

    let written = generate_due_summaries(
        &journal_root,
        &client,
        last_date.unwrap_or(current_date),
        current_date,
    )
    .await;
    if !written.is_empty() {
        info!(count = written.len(), "Summaries generated");
    }

    Ok(())
}

/// Latest date with a daily journal file, if any.
pub fn latest_daily_date(journal_root: &Path) -> Option<NaiveDate> {
    let entries = std::fs::read_dir(journal_root.join("daily")).ok()?;
    entries
        .filter_map(|e| e.ok())
        .filter_map(|e| parse_daily_date(&e.file_name().to_string_lossy()))
        .max()
}

/// Advisory lock serializing hook invocations on one journal.
struct HookLock {
    path: PathBuf,
}

impl HookLock {
    fn acquire(journal_root: &Path) -> Result<Option<Self>> {
        crate::journal::writer::ensure_dir(journal_root)?;
        let path = journal_root.join(".scribe.lock");

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Some(Self { path }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let age = std::fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|t| SystemTime::now().duration_since(t).ok());
                match age {
                    Some(age) if age > LOCK_STALE_AFTER => {
                        warn!(path = %path.display(), "Breaking stale journal lock");
                        let _ = std::fs::remove_file(&path);
                        match std::fs::OpenOptions::new()
                            .write(true)
                            .create_new(true)
                            .open(&path)
                        {
                            Ok(mut file) => {
                                let _ = writeln!(file, "{}", std::process::id());
                                Ok(Some(Self { path }))
                            }
                            Err(_) => Ok(None),
                        }
                    }
                    _ => Ok(None),
                }
            }
            Err(e) => Err(ScribeError::from_io(e, &path)),
        }
    }
}

impl Drop for HookLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Append a line to the rotating hook log under `.git/hooks/`. Messages can
/// embed provider error bodies, so they pass through the sanitizer first.
pub fn hook_log(repo: &Path, message: &str) {
    let message = crate::telemetry::sanitize::sanitize(message);
    let dir = repo.join(".git/hooks");
    if !dir.is_dir() {
        return;
    }
    let path = dir.join("scribe.log");

    if let Ok(meta) = std::fs::metadata(&path) {
        if meta.len() > HOOK_LOG_MAX_BYTES {
            let _ = std::fs::rename(&path, dir.join("scribe.log.1"));
        }
    }

    if let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let _ = writeln!(file, "[{stamp}] {message}");
    }
}
