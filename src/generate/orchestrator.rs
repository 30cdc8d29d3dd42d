// src/generate/orchestrator.rs
// Four-layer entry generation: trigger → orchestration → context → sections.
//
// This is the only fan-out point in the system. Context collection runs its
// three branches concurrently, then every section generator runs
// concurrently against the combined context. Section calls are individual,
// not batched: per-section failure isolation and telemetry granularity
// depend on it.

use crate::chat;
use crate::config::ScribeConfig;
use crate::error::{Result, ScribeError};
use crate::generate::context::JournalContext;
use crate::generate::sections::generate_section;
use crate::git::{self, GitContext};
use crate::journal::entry::{JournalEntry, SECTION_ORDER};
use crate::journal::reader::previous_entry;
use crate::llm::LlmClient;
use crate::workspace::Message;
use chrono::{Local, NaiveDate, TimeZone};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

/// Whole-orchestration budget. Exceeding it yields a partial entry.
const TOTAL_BUDGET: Duration = Duration::from_secs(90);

/// Local date and `HH:MM AM/PM` stamp for a commit's author time. Deriving
/// the stamp from the commit rather than the wall clock keeps regenerated
/// entries byte-identical for identical evidence.
pub fn entry_stamp(author_time_ms: i64) -> (NaiveDate, String) {
    let local = Local
        .timestamp_millis_opt(author_time_ms)
        .single()
        .unwrap_or_else(Local::now);
    (local.date_naive(), local.format("%I:%M %p").to_string())
}

/// Generate the journal entry for one commit.
///
/// Chat collection degrades to "no chat available" on store errors; git
/// context is the one mandatory evidence stream. A provider-rejected API
/// key is fatal even mid-run: no section can succeed, so the orchestration
/// errors instead of assembling an entry of empty defaults. The caller
/// writes the returned entry; this function never touches the journal.
#[instrument(name = "orchestrate", skip_all, fields(commit = rev, partial))]
pub async fn orchestrate(
    repo: &Path,
    rev: &str,
    journal_root: &Path,
    client: Arc<dyn LlmClient>,
    config: &ScribeConfig,
) -> Result<JournalEntry> {
    // Layer 1: validate the request before spending anything on it.
    if rev.trim().is_empty() {
        return Err(ScribeError::BadRequest("empty commit rev".into()));
    }
    let info = git::commit_info(repo, rev).map_err(ScribeError::Git)?;
    let (entry_date, timestamp) = entry_stamp(info.author_time_ms);

    // Layer 3: context collection, three branches concurrent.
    let (chat_result, git_result, previous) = tokio::join!(
        collect_chat_branch(repo.to_path_buf(), info.hash.clone()),
        collect_git_branch(
            repo.to_path_buf(),
            info.hash.clone(),
            journal_root.to_path_buf()
        ),
        collect_previous_branch(journal_root.to_path_buf(), entry_date),
    );

    let git_context = git_result?;
    let chat_history = chat_result.unwrap_or_else(|e| {
        warn!(error = %e, "No chat available; generating from git evidence alone");
        Vec::new()
    });

    // Boundary refinement, then the soft cap on the filtered stream.
    let chat_history = if chat_history.is_empty() {
        chat_history
    } else {
        let (filtered, outcome) = chat::filter_for_commit(
            &client,
            chat_history,
            &git_context,
            previous.as_deref(),
            config.boundary.min_confidence,
        )
        .await;
        info!(
            messages_in = outcome.messages_in,
            messages_out = outcome.messages_out,
            fallback = outcome.fallback_used,
            "Boundary filter applied"
        );
        let (capped, _trimmed) = chat::apply_message_cap(filtered, config.chat.max_messages);
        capped
    };

    let ctx = Arc::new(JournalContext {
        chat_history,
        git_context,
        previous_entry: previous,
    });

    // Layer 4: all generators concurrent, assembled in canonical order
    // regardless of completion order.
    let mut entry = JournalEntry::new(timestamp, ctx.git_context.short_hash().to_string());
    let deadline = tokio::time::Instant::now() + TOTAL_BUDGET;

    let mut set = JoinSet::new();
    for kind in SECTION_ORDER {
        if !kind.has_generator() {
            continue;
        }
        let client = client.clone();
        let ctx = ctx.clone();
        set.spawn(async move { (kind, generate_section(client, kind, ctx).await) });
    }

    let mut partial = false;
    loop {
        match tokio::time::timeout_at(deadline, set.join_next()).await {
            Ok(Some(Ok((kind, Ok(section))))) => {
                debug_assert_eq!(section.kind(), kind);
                entry.set_section(section);
            }
            Ok(Some(Ok((kind, Err(e))))) => {
                // A rejected key fails every section the same way; the whole
                // orchestration aborts and the entry file is never touched.
                set.abort_all();
                while set.join_next().await.is_some() {}
                warn!(
                    section = kind.header(),
                    error = %e,
                    "Fatal generator error; aborting orchestration"
                );
                crate::telemetry::outcome_counter("orchestrator.entries", false);
                return Err(e);
            }
            Ok(Some(Err(join_err))) => {
                warn!(error = %join_err, "Section task failed; keeping empty default");
            }
            Ok(None) => break,
            Err(_) => {
                // Budget exhausted: cancel in-flight generators, ship what
                // completed. Cancelled sections keep their empty defaults.
                partial = true;
                set.abort_all();
                while set.join_next().await.is_some() {}
                warn!(
                    budget_secs = TOTAL_BUDGET.as_secs(),
                    "Orchestration budget exceeded; assembling partial entry"
                );
                crate::telemetry::counter("orchestrator.budget_exceeded", 1);
                break;
            }
        }
    }

    tracing::Span::current().record("partial", partial);
    crate::telemetry::outcome_counter("orchestrator.entries", true);
    Ok(entry)
}

async fn collect_chat_branch(repo: PathBuf, rev: String) -> Result<Vec<Message>> {
    tokio::task::spawn_blocking(move || chat::collect_chat(&repo, &rev))
        .await
        .map_err(ScribeError::from)?
}

async fn collect_git_branch(
    repo: PathBuf,
    rev: String,
    journal_root: PathBuf,
) -> Result<GitContext> {
    tokio::task::spawn_blocking(move || git::collect_git_context(&repo, &rev, &journal_root))
        .await
        .map_err(ScribeError::from)?
}

async fn collect_previous_branch(journal_root: PathBuf, date: NaiveDate) -> Option<String> {
    tokio::task::spawn_blocking(move || previous_entry(&journal_root, date))
        .await
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AiError;
    use crate::journal::entry::{SectionKind, SectionResult};
    use crate::llm::{ChatMessage, ChatResult, Provider};
    use std::process::Command;
    use std::sync::Mutex;

    /// Scripted client: answers every request from a canned map keyed on a
    /// marker found in the system prompt.
    struct ScriptedClient {
        responses: Mutex<Vec<(&'static str, String)>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<(&'static str, String)>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete_json(
            &self,
            messages: Vec<ChatMessage>,
        ) -> crate::error::Result<ChatResult> {
            let system = messages
                .first()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            let responses = self.responses.lock().map_err(|_| {
                ScribeError::from(AiError::ProviderFailure("poisoned".into()))
            })?;
            for (marker, body) in responses.iter() {
                if system.contains(marker) {
                    return Ok(ChatResult {
                        request_id: "test".into(),
                        content: body.clone(),
                        usage: None,
                        duration_ms: 1,
                    });
                }
            }
            Err(AiError::ProviderFailure("no scripted response".into()).into())
        }

        fn provider_type(&self) -> Provider {
            Provider::OpenAi
        }

        fn model_name(&self) -> String {
            "scripted".into()
        }
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_AUTHOR_NAME", "Test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "Test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .status()
            .expect("run git");
        assert!(status.success());
    }

    fn scripted_sections() -> Vec<(&'static str, String)> {
        vec![
            (
                "thirty seconds",
                r#"{"summary": "Added the widget parser."}"#.into(),
            ),
            (
                "technical shape",
                r#"{"synopsis": "New parser module in src."}"#.into(),
            ),
            (
                "concrete things",
                r#"{"accomplishments": ["widget parser"]}"#.into(),
            ),
            ("friction", r#"{"frustrations": []}"#.into()),
            ("mood", r#"{"mood": "", "indicators": ""}"#.into()),
            ("substantive exchanges", r#"{"notes": []}"#.into()),
            (
                "string-to-string map",
                r#"{"files_changed": "1", "size": "small"}"#.into(),
            ),
        ]
    }

    #[tokio::test]
    async fn test_orchestrate_produces_complete_entry_without_chat() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let repo = tmp.path();
        git(repo, &["init", "-q"]);
        std::fs::write(repo.join("widget.rs"), "struct Widget;\n").expect("write");
        git(repo, &["add", "."]);
        git(repo, &["commit", "-q", "-m", "add widget"]);

        let client: Arc<dyn LlmClient> = Arc::new(ScriptedClient::new(scripted_sections()));
        let config = ScribeConfig::default();
        let journal_root = repo.join("journal");

        let entry = orchestrate(repo, "HEAD", &journal_root, client, &config)
            .await
            .expect("orchestrate");

        // Every canonical section present, populated or empty
        for kind in SECTION_ORDER {
            assert!(entry.sections.contains_key(&kind), "missing {kind:?}");
        }
        assert_eq!(
            entry.sections.get(&SectionKind::Summary),
            Some(&SectionResult::Summary {
                summary: "Added the widget parser.".into()
            })
        );
        // Terminal commands stays empty by design
        assert!(
            entry
                .sections
                .get(&SectionKind::TerminalCommands)
                .expect("terminal section")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_orchestrate_survives_total_generator_failure() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let repo = tmp.path();
        git(repo, &["init", "-q"]);
        std::fs::write(repo.join("a.rs"), "fn a() {}\n").expect("write");
        git(repo, &["add", "."]);
        git(repo, &["commit", "-q", "-m", "a"]);

        let client: Arc<dyn LlmClient> = Arc::new(ScriptedClient::new(vec![]));
        let config = ScribeConfig::default();

        let entry = orchestrate(repo, "HEAD", &repo.join("journal"), client, &config)
            .await
            .expect("orchestrate");
        // One bad section never kills an entry; all defaults here
        for kind in SECTION_ORDER {
            assert!(
                entry.sections.get(&kind).expect("section").is_empty(),
                "{kind:?} should be empty"
            );
        }
    }

    #[tokio::test]
    async fn test_orchestrate_fails_on_rejected_key() {
        struct RejectingClient;
        #[async_trait::async_trait]
        impl LlmClient for RejectingClient {
            async fn complete_json(
                &self,
                _messages: Vec<ChatMessage>,
            ) -> crate::error::Result<ChatResult> {
                Err(AiError::InvalidKey.into())
            }
            fn provider_type(&self) -> Provider {
                Provider::OpenAi
            }
            fn model_name(&self) -> String {
                "rejecting".into()
            }
        }

        let tmp = tempfile::tempdir().expect("tempdir");
        let repo = tmp.path();
        git(repo, &["init", "-q"]);
        std::fs::write(repo.join("a.rs"), "fn a() {}\n").expect("write");
        git(repo, &["add", "."]);
        git(repo, &["commit", "-q", "-m", "a"]);

        let client: Arc<dyn LlmClient> = Arc::new(RejectingClient);
        let err = orchestrate(
            repo,
            "HEAD",
            &repo.join("journal"),
            client,
            &ScribeConfig::default(),
        )
        .await
        .err()
        .expect("rejected key must fail the orchestration");
        assert_eq!(err.category(), "InvalidKey");
    }

    #[tokio::test]
    async fn test_orchestrate_rejects_empty_rev() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let client: Arc<dyn LlmClient> = Arc::new(ScriptedClient::new(vec![]));
        let err = orchestrate(
            tmp.path(),
            "  ",
            &tmp.path().join("journal"),
            client,
            &ScribeConfig::default(),
        )
        .await
        .err()
        .expect("should fail");
        assert_eq!(err.category(), "BadRequest");
    }

    #[test]
    fn test_entry_stamp_is_deterministic() {
        let (d1, t1) = entry_stamp(1747412765000);
        let (d2, t2) = entry_stamp(1747412765000);
        assert_eq!(d1, d2);
        assert_eq!(t1, t2);
        // HH:MM AM/PM shape
        assert!(t1.ends_with("AM") || t1.ends_with("PM"), "got {t1}");
    }
}
