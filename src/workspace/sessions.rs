// src/workspace/sessions.rs
// Session enumeration and bubble extraction from the workspace store.
//
// One conversation ("composer") holds an ordered list of bubbles. The store
// keeps session metadata under a single JSON key and one row per bubble,
// keyed `bubble:<composerId>:<bubbleId>`.

use crate::chat::window::TimeWindow;
use crate::error::DbError;
use crate::workspace::reader::WorkspaceDb;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Key holding the composer metadata list.
const COMPOSER_DATA_KEY: &str = "composer.composerData";

/// Bubble author role. Internal reasoning and tool payloads never surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// The store encodes the author as an integer: 1 = user, 2 = assistant.
    fn from_bubble_type(t: i64) -> Option<Self> {
        match t {
            1 => Some(Self::User),
            2 => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// One chat message. `bubble_id` is the identity key; content hashes are
/// unsafe because identical short utterances recur within a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub bubble_id: String,
    pub composer_id: String,
    pub role: Role,
    pub text: String,
    /// Milliseconds since epoch.
    pub timestamp: i64,
}

/// One conversation thread with its bubble order as stored.
#[derive(Debug, Clone)]
pub struct Session {
    pub composer_id: String,
    pub created_at: i64,
    pub last_updated_at: i64,
    /// Bubble IDs in native conversation order (array position, not time).
    pub bubble_ids: Vec<String>,
}

impl Session {
    /// A session overlaps a window iff it was last touched after the window
    /// opened and created before the window closed. This admits sessions
    /// straddling either boundary.
    pub fn overlaps(&self, window: &TimeWindow) -> bool {
        self.last_updated_at > window.start && self.created_at < window.end
    }
}

#[derive(Debug, Deserialize)]
struct ComposerData {
    #[serde(rename = "allComposers", default)]
    all_composers: Vec<ComposerRecord>,
}

#[derive(Debug, Deserialize)]
struct ComposerRecord {
    #[serde(rename = "composerId")]
    composer_id: String,
    #[serde(rename = "createdAt", default)]
    created_at: i64,
    #[serde(rename = "lastUpdatedAt", default)]
    last_updated_at: i64,
    #[serde(rename = "fullConversationHeadersOnly", default)]
    headers: Vec<BubbleHeader>,
}

#[derive(Debug, Deserialize)]
struct BubbleHeader {
    #[serde(rename = "bubbleId")]
    bubble_id: String,
}

#[derive(Debug, Deserialize)]
struct BubbleRecord {
    #[serde(default)]
    text: Option<String>,
    #[serde(rename = "type", default)]
    bubble_type: i64,
    #[serde(rename = "createdAt", default)]
    created_at: Option<i64>,
}

/// Enumerate sessions in the store that overlap the given window.
#[instrument(name = "sessions.overlapping", skip_all, fields(session_count))]
pub fn sessions_overlapping(
    db: &WorkspaceDb,
    window: &TimeWindow,
) -> Result<Vec<Session>, DbError> {
    let Some(raw) = db.value_for_key(COMPOSER_DATA_KEY)? else {
        debug!(path = %db.path().display(), "No composer metadata in store");
        return Ok(Vec::new());
    };

    let data: ComposerData = serde_json::from_slice(&raw).map_err(|e| {
        DbError::Schema(format!(
            "{}: composer metadata is not valid JSON: {}",
            db.path().display(),
            e
        ))
    })?;

    let sessions: Vec<Session> = data
        .all_composers
        .into_iter()
        .map(|c| Session {
            composer_id: c.composer_id,
            created_at: c.created_at,
            last_updated_at: c.last_updated_at,
            bubble_ids: c.headers.into_iter().map(|h| h.bubble_id).collect(),
        })
        .filter(|s| s.overlaps(window))
        .collect();

    tracing::Span::current().record("session_count", sessions.len());
    Ok(sessions)
}

/// Extract the messages of one session in native conversation order.
///
/// Only the `text` field is read for either role; `thinking` and
/// `toolFormerData` payloads are never surfaced. Messages that are empty
/// after trimming are dropped here, which is the contract the rest of the
/// pipeline relies on.
#[instrument(name = "sessions.messages_for", skip_all, fields(composer_id = %session.composer_id, message_count))]
pub fn messages_for(db: &WorkspaceDb, session: &Session) -> Result<Vec<Message>, DbError> {
    let mut messages = Vec::with_capacity(session.bubble_ids.len());

    for bubble_id in &session.bubble_ids {
        let key = format!("bubble:{}:{}", session.composer_id, bubble_id);
        let Some(raw) = db.value_for_key(&key)? else {
            debug!(key, "Bubble listed on session but missing from store");
            continue;
        };

        let bubble: BubbleRecord = match serde_json::from_slice(&raw) {
            Ok(b) => b,
            Err(e) => {
                debug!(key, error = %e, "Skipping unparseable bubble");
                continue;
            }
        };

        let Some(role) = Role::from_bubble_type(bubble.bubble_type) else {
            continue;
        };
        let text = bubble.text.unwrap_or_default();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }

        messages.push(Message {
            bubble_id: bubble_id.clone(),
            composer_id: session.composer_id.clone(),
            role,
            text: trimmed.to_string(),
            timestamp: bubble.created_at.unwrap_or(session.created_at),
        });
    }

    tracing::Span::current().record("message_count", messages.len());
    Ok(messages)
}

/// Merge messages from multiple sessions into one deterministic order.
///
/// The sort key is `(timestamp, composer_id)`: timestamps routinely collide
/// to the millisecond between parallel sessions, and the composer tiebreaker
/// keeps entries reproducible. The sort is stable, so native order survives
/// within a session at equal timestamps.
pub fn merge_messages(mut messages: Vec<Message>) -> Vec<Message> {
    messages.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.composer_id.cmp(&b.composer_id))
    });
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(composer_id: &str, created_at: i64, last_updated_at: i64) -> Session {
        Session {
            composer_id: composer_id.into(),
            created_at,
            last_updated_at,
            bubble_ids: vec![],
        }
    }

    fn msg(bubble_id: &str, composer_id: &str, timestamp: i64, text: &str) -> Message {
        Message {
            bubble_id: bubble_id.into(),
            composer_id: composer_id.into(),
            role: Role::User,
            text: text.into(),
            timestamp,
        }
    }

    #[test]
    fn test_overlap_straddling_start() {
        let window = TimeWindow::new(1000, 2000);
        // Began before the window, extended into it
        assert!(session("a", 500, 1500).overlaps(&window));
    }

    #[test]
    fn test_overlap_straddling_end() {
        let window = TimeWindow::new(1000, 2000);
        assert!(session("a", 1500, 3000).overlaps(&window));
    }

    #[test]
    fn test_no_overlap_before() {
        let window = TimeWindow::new(1000, 2000);
        assert!(!session("a", 100, 900).overlaps(&window));
    }

    #[test]
    fn test_no_overlap_after() {
        let window = TimeWindow::new(1000, 2000);
        assert!(!session("a", 2500, 3000).overlaps(&window));
    }

    #[test]
    fn test_boundary_touch_is_not_overlap() {
        // lastUpdatedAt == start fails the strict comparison
        let window = TimeWindow::new(1000, 2000);
        assert!(!session("a", 100, 1000).overlaps(&window));
        assert!(!session("a", 2000, 3000).overlaps(&window));
    }

    #[test]
    fn test_merge_orders_by_timestamp_then_composer() {
        // Two sessions, identical timestamps to the millisecond
        let merged = merge_messages(vec![
            msg("b1", "3d6b52bd", 1747412765000, "B1"),
            msg("a1", "07dc3efa", 1747412765000, "A1"),
        ]);
        assert_eq!(merged[0].text, "A1");
        assert_eq!(merged[1].text, "B1");
    }

    #[test]
    fn test_merge_is_stable_within_session() {
        let merged = merge_messages(vec![
            msg("b1", "c1", 100, "first"),
            msg("b2", "c1", 100, "second"),
        ]);
        assert_eq!(merged[0].text, "first");
        assert_eq!(merged[1].text, "second");
    }

    #[test]
    fn test_role_from_bubble_type() {
        assert_eq!(Role::from_bubble_type(1), Some(Role::User));
        assert_eq!(Role::from_bubble_type(2), Some(Role::Assistant));
        assert_eq!(Role::from_bubble_type(7), None);
    }

    mod store {
        use super::*;
        use crate::workspace::reader::STATE_DB_NAME;
        use rusqlite::Connection;

        fn fixture_db(dir: &std::path::Path) -> WorkspaceDb {
            let path = dir.join(STATE_DB_NAME);
            let conn = Connection::open(&path).expect("create fixture");
            conn.execute("CREATE TABLE ItemTable (key TEXT, value BLOB)", [])
                .expect("create table");

            let composer_data = serde_json::json!({
                "allComposers": [{
                    "composerId": "c-1",
                    "createdAt": 1000i64,
                    "lastUpdatedAt": 5000i64,
                    "fullConversationHeadersOnly": [
                        {"bubbleId": "b-1"},
                        {"bubbleId": "b-2"},
                        {"bubbleId": "b-3"},
                        {"bubbleId": "b-4"}
                    ]
                }]
            });
            conn.execute(
                "INSERT INTO ItemTable (key, value) VALUES (?1, ?2)",
                rusqlite::params![
                    COMPOSER_DATA_KEY,
                    composer_data.to_string().as_bytes()
                ],
            )
            .expect("insert composer data");

            let bubbles = [
                ("b-1", serde_json::json!({"text": "how do I fix the race?", "type": 1, "createdAt": 1100i64})),
                // Whitespace-only text must be dropped
                ("b-2", serde_json::json!({"text": "   ", "type": 2, "createdAt": 1200i64})),
                // Internal reasoning and tool payloads are ignored fields
                ("b-3", serde_json::json!({
                    "text": "use a mutex around the writer",
                    "type": 2,
                    "createdAt": 1300i64,
                    "thinking": {"text": "never surfaced"},
                    "toolFormerData": {"tool": "grep"}
                })),
                // Missing createdAt falls back to the session's createdAt
                ("b-4", serde_json::json!({"text": "thanks", "type": 1})),
            ];
            for (id, body) in bubbles {
                conn.execute(
                    "INSERT INTO ItemTable (key, value) VALUES (?1, ?2)",
                    rusqlite::params![
                        format!("bubble:c-1:{id}"),
                        body.to_string().as_bytes()
                    ],
                )
                .expect("insert bubble");
            }
            drop(conn);
            WorkspaceDb::open_readonly(&path).expect("open readonly")
        }

        #[test]
        fn test_extraction_skips_empty_and_keeps_order() {
            let dir = tempfile::tempdir().expect("tempdir");
            let db = fixture_db(dir.path());

            let window = TimeWindow::new(0, 10_000);
            let sessions = sessions_overlapping(&db, &window).expect("sessions");
            assert_eq!(sessions.len(), 1);

            let messages = messages_for(&db, &sessions[0]).expect("messages");
            assert_eq!(messages.len(), 3);
            assert_eq!(messages[0].text, "how do I fix the race?");
            assert_eq!(messages[0].role, Role::User);
            assert_eq!(messages[1].text, "use a mutex around the writer");
            assert_eq!(messages[1].role, Role::Assistant);
            assert_eq!(messages[2].text, "thanks");
            assert_eq!(messages[2].timestamp, 1000);
            // No message is ever empty after trim
            assert!(messages.iter().all(|m| !m.text.trim().is_empty()));
        }

        #[test]
        fn test_window_excludes_session() {
            let dir = tempfile::tempdir().expect("tempdir");
            let db = fixture_db(dir.path());
            let window = TimeWindow::new(6000, 9000);
            let sessions = sessions_overlapping(&db, &window).expect("sessions");
            assert!(sessions.is_empty());
        }
    }
}
