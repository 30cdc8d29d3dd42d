// src/workspace/mod.rs
// Read-only access to the IDE's chat workspace storage
//
// - platform: cross-OS discovery of workspace storage roots
// - reader: read-only SQLite access with schema validation
// - sessions: session enumeration and bubble extraction

pub mod platform;
pub mod reader;
pub mod sessions;

pub use platform::{resolve_workspace_roots, resolve_workspace_roots_uncached};
pub use reader::WorkspaceDb;
pub use sessions::{Message, Role, Session, merge_messages, messages_for, sessions_overlapping};
