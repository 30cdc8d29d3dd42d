// src/chat/mod.rs
// Chat evidence collection: workspace discovery through message merge.
//
// - window: commit time windows
// - boundary: AI-driven trim to the current commit's work

pub mod boundary;
pub mod window;

pub use boundary::filter_for_commit;
pub use window::{TimeWindow, window_for};

use crate::error::{DbError, Result};
use crate::workspace::{
    self, Message, WorkspaceDb, merge_messages, messages_for, sessions_overlapping,
};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, instrument, warn};

/// Directory depth of `<workspaceStorage>/<hash>/state.vscdb`.
const DISCOVER_DEPTH: usize = 2;

/// Collect the chat messages that may belong to a commit.
///
/// Composes the platform resolver, store reader, and session provider,
/// bounded by the commit's time window. Uses session-overlap semantics, not
/// strict containment: messages of an overlapping session that fall slightly
/// outside the window are retained, and the boundary filter refines them.
///
/// Degrades gracefully: an unreadable store is a warning, not a failure, and
/// an entry can still be generated from git evidence alone.
#[instrument(name = "chat.collect", skip_all, fields(commit = rev, messages_out))]
pub fn collect_chat(repo: &Path, rev: &str) -> Result<Vec<Message>> {
    let window = window_for(repo, rev)?;
    collect_chat_in_window(&window)
}

/// Window-driven collection, separated for tests and reuse.
pub fn collect_chat_in_window(window: &TimeWindow) -> Result<Vec<Message>> {
    let roots = workspace::resolve_workspace_roots();
    if roots.is_empty() {
        debug!("No workspace storage roots found; proceeding without chat");
        return Ok(Vec::new());
    }

    let mut all_messages = Vec::new();
    for root in &roots {
        for db_path in workspace::reader::discover(root, DISCOVER_DEPTH) {
            let db = match WorkspaceDb::open_readonly(&db_path) {
                Ok(db) => db,
                Err(e @ (DbError::NotFound(_) | DbError::Access(_))) => {
                    warn!(path = %db_path.display(), error = %e, "Chat store unavailable, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(path = %db_path.display(), error = %e, "Chat store unreadable, skipping");
                    continue;
                }
            };

            let sessions = match sessions_overlapping(&db, window) {
                Ok(s) => s,
                Err(e) => {
                    warn!(path = %db_path.display(), error = %e, "Session enumeration failed, skipping store");
                    continue;
                }
            };

            for session in &sessions {
                match messages_for(&db, session) {
                    Ok(mut messages) => all_messages.append(&mut messages),
                    Err(e) => {
                        warn!(
                            composer_id = %session.composer_id,
                            error = %e,
                            "Message extraction failed for session"
                        );
                    }
                }
            }
        }
    }

    let merged = dedup_by_bubble_id(merge_messages(all_messages));
    tracing::Span::current().record("messages_out", merged.len());
    crate::telemetry::gauge("chat.messages_collected", merged.len() as f64);
    Ok(merged)
}

/// Drop duplicate bubbles, first occurrence wins. The same store can be
/// discovered through more than one root (WSL mounts), so duplicates are
/// expected, and `bubbleId` is the identity key.
fn dedup_by_bubble_id(messages: Vec<Message>) -> Vec<Message> {
    let mut seen = HashSet::new();
    messages
        .into_iter()
        .filter(|m| seen.insert(m.bubble_id.clone()))
        .collect()
}

/// Apply the soft message cap, trimming oldest messages first.
///
/// Runs after the boundary filter: a pre-filter cap could discard the very
/// bubble the filter would anchor on. Returns the kept messages and the
/// trimmed count.
pub fn apply_message_cap(messages: Vec<Message>, max_messages: usize) -> (Vec<Message>, usize) {
    if messages.len() <= max_messages {
        return (messages, 0);
    }
    let trimmed = messages.len() - max_messages;
    crate::telemetry::counter("chat.messages_trimmed", trimmed as u64);
    warn!(
        trimmed,
        max_messages, "Chat exceeded soft cap; trimming oldest messages"
    );
    let kept = messages.into_iter().skip(trimmed).collect();
    (kept, trimmed)
}
