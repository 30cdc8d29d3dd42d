// src/generate/context.rs
// The combined evidence handed to every section generator.

use crate::git::GitContext;
use crate::workspace::Message;
use std::fmt::Write as _;

/// Everything a generator may ground a statement in. Generators never
/// re-enter the data pipeline; this is the whole world.
#[derive(Debug, Clone)]
pub struct JournalContext {
    /// Chronologically ordered, boundary-filtered chat.
    pub chat_history: Vec<Message>,
    pub git_context: GitContext,
    /// Raw Markdown of the most recent prior entry.
    pub previous_entry: Option<String>,
}

impl JournalContext {
    /// Render the evidence as prompt text shared by all generators.
    pub fn render(&self) -> String {
        let mut out = String::new();

        let git = &self.git_context;
        let _ = writeln!(out, "## Commit");
        let _ = writeln!(out, "hash: {}", git.commit_hash);
        let _ = writeln!(out, "author: {}", git.author);
        let _ = writeln!(out, "message: {}", git.message);
        let _ = writeln!(out, "size: {}", git.size_class.as_str());
        let _ = writeln!(
            out,
            "files changed ({} added, {} modified, {} deleted):",
            git.file_stats.added, git.file_stats.modified, git.file_stats.deleted
        );
        for file in &git.changed_files {
            let _ = writeln!(out, "- {file}");
        }

        if !git.diff_summary.is_empty() {
            let _ = writeln!(out, "\n## Diff");
            let _ = writeln!(out, "{}", git.diff_summary);
        }

        let _ = writeln!(out, "\n## Chat transcript");
        if self.chat_history.is_empty() {
            let _ = writeln!(out, "(no chat evidence for this commit)");
        } else {
            let _ = writeln!(
                out,
                "(chronological; insights from early messages carry equal weight)"
            );
            for message in &self.chat_history {
                let _ = writeln!(out, "[{}] {}", message.role.as_str(), message.text);
            }
        }

        if let Some(ref previous) = self.previous_entry {
            let _ = writeln!(out, "\n## Previous journal entry");
            let _ = writeln!(out, "{previous}");
        }

        out
    }
}

/// Test fixture shared across the generate module's tests.
#[cfg(test)]
pub(crate) fn fixture_git_context() -> GitContext {
    use crate::git::{FileStats, SizeClass};
    GitContext {
        commit_hash: "deadbeefcafebabe".into(),
        author: "Dev Eloper <dev@example.com>".into(),
        author_time_ms: 1747412765000,
        message: "fix: stable merge order".into(),
        parent_hash: Some("0123456789abcdef".into()),
        changed_files: vec!["src/merge.rs".into()],
        diff_summary: "diff --git a/src/merge.rs b/src/merge.rs\n+sorted".into(),
        file_stats: FileStats {
            added: 0,
            modified: 1,
            deleted: 0,
        },
        size_class: SizeClass::Small,
        is_merge: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::Role;

    #[test]
    fn test_render_includes_all_evidence() {
        let ctx = JournalContext {
            chat_history: vec![Message {
                bubble_id: "b1".into(),
                composer_id: "c1".into(),
                role: Role::User,
                text: "why does the order flip?".into(),
                timestamp: 1747412765000,
            }],
            git_context: super::fixture_git_context(),
            previous_entry: Some("### 08:00 AM — Commit 0123456".into()),
        };
        let rendered = ctx.render();
        assert!(rendered.contains("fix: stable merge order"));
        assert!(rendered.contains("[user] why does the order flip?"));
        assert!(rendered.contains("Previous journal entry"));
        assert!(rendered.contains("equal weight"));
    }

    #[test]
    fn test_render_empty_chat_is_explicit() {
        let ctx = JournalContext {
            chat_history: vec![],
            git_context: super::fixture_git_context(),
            previous_entry: None,
        };
        let rendered = ctx.render();
        assert!(rendered.contains("(no chat evidence for this commit)"));
    }
}
