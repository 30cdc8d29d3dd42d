// src/journal/entry.rs
// Journal entry model and Markdown rendering.
//
// Sections render in a fixed order, and an empty section still renders its
// header: downstream parsing relies on the grammar being regular.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// The canonical section set, in rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SectionKind {
    Summary,
    TechnicalSynopsis,
    Accomplishments,
    Frustrations,
    ToneMood,
    DiscussionNotes,
    TerminalCommands,
    CommitMetadata,
}

/// Canonical order for assembly and rendering.
pub const SECTION_ORDER: [SectionKind; 8] = [
    SectionKind::Summary,
    SectionKind::TechnicalSynopsis,
    SectionKind::Accomplishments,
    SectionKind::Frustrations,
    SectionKind::ToneMood,
    SectionKind::DiscussionNotes,
    SectionKind::TerminalCommands,
    SectionKind::CommitMetadata,
];

impl SectionKind {
    pub fn header(&self) -> &'static str {
        match self {
            Self::Summary => "Summary",
            Self::TechnicalSynopsis => "Technical Synopsis",
            Self::Accomplishments => "Accomplishments",
            Self::Frustrations => "Frustrations",
            Self::ToneMood => "Tone/Mood",
            Self::DiscussionNotes => "Discussion Notes",
            Self::TerminalCommands => "Terminal Commands",
            Self::CommitMetadata => "Commit Metadata",
        }
    }

    /// Sections that are produced by a generator. Terminal Commands has no
    /// evidence-collection path; it renders empty to keep the grammar stable.
    pub fn has_generator(&self) -> bool {
        !matches!(self, Self::TerminalCommands)
    }
}

/// One quoted exchange in the discussion notes. Quotes are verbatim and
/// attribution must be unambiguous; a bare string is allowed for notes that
/// paraphrase a decision without quoting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DiscussionNote {
    Quoted { speaker: String, quote: String },
    Plain(String),
}

/// A generated section. Missing fields default to empty, never null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionResult {
    Summary { summary: String },
    TechnicalSynopsis { synopsis: String },
    Accomplishments { accomplishments: Vec<String> },
    Frustrations { frustrations: Vec<String> },
    ToneMood { mood: String, indicators: String },
    DiscussionNotes { notes: Vec<DiscussionNote> },
    TerminalCommands { commands: Vec<String> },
    CommitMetadata { fields: BTreeMap<String, String> },
}

impl SectionResult {
    /// The empty default for a section, used when a generator fails or when
    /// evidence is insufficient.
    pub fn empty(kind: SectionKind) -> Self {
        match kind {
            SectionKind::Summary => Self::Summary {
                summary: String::new(),
            },
            SectionKind::TechnicalSynopsis => Self::TechnicalSynopsis {
                synopsis: String::new(),
            },
            SectionKind::Accomplishments => Self::Accomplishments {
                accomplishments: Vec::new(),
            },
            SectionKind::Frustrations => Self::Frustrations {
                frustrations: Vec::new(),
            },
            SectionKind::ToneMood => Self::ToneMood {
                mood: String::new(),
                indicators: String::new(),
            },
            SectionKind::DiscussionNotes => Self::DiscussionNotes { notes: Vec::new() },
            SectionKind::TerminalCommands => Self::TerminalCommands {
                commands: Vec::new(),
            },
            SectionKind::CommitMetadata => Self::CommitMetadata {
                fields: BTreeMap::new(),
            },
        }
    }

    pub fn kind(&self) -> SectionKind {
        match self {
            Self::Summary { .. } => SectionKind::Summary,
            Self::TechnicalSynopsis { .. } => SectionKind::TechnicalSynopsis,
            Self::Accomplishments { .. } => SectionKind::Accomplishments,
            Self::Frustrations { .. } => SectionKind::Frustrations,
            Self::ToneMood { .. } => SectionKind::ToneMood,
            Self::DiscussionNotes { .. } => SectionKind::DiscussionNotes,
            Self::TerminalCommands { .. } => SectionKind::TerminalCommands,
            Self::CommitMetadata { .. } => SectionKind::CommitMetadata,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Summary { summary } => summary.trim().is_empty(),
            Self::TechnicalSynopsis { synopsis } => synopsis.trim().is_empty(),
            Self::Accomplishments { accomplishments } => accomplishments.is_empty(),
            Self::Frustrations { frustrations } => frustrations.is_empty(),
            Self::ToneMood { mood, indicators } => {
                mood.trim().is_empty() && indicators.trim().is_empty()
            }
            Self::DiscussionNotes { notes } => notes.is_empty(),
            Self::TerminalCommands { commands } => commands.is_empty(),
            Self::CommitMetadata { fields } => fields.is_empty(),
        }
    }

    fn render_body(&self, out: &mut String) {
        match self {
            Self::Summary { summary } => {
                if !summary.trim().is_empty() {
                    let _ = writeln!(out, "{}", summary.trim());
                }
            }
            Self::TechnicalSynopsis { synopsis } => {
                if !synopsis.trim().is_empty() {
                    let _ = writeln!(out, "{}", synopsis.trim());
                }
            }
            Self::Accomplishments { accomplishments } => {
                for item in accomplishments {
                    let _ = writeln!(out, "- {}", item.trim());
                }
            }
            Self::Frustrations { frustrations } => {
                for item in frustrations {
                    let _ = writeln!(out, "- {}", item.trim());
                }
            }
            Self::ToneMood { mood, indicators } => {
                if !mood.trim().is_empty() {
                    let _ = writeln!(out, "- **Mood**: {}", mood.trim());
                }
                if !indicators.trim().is_empty() {
                    let _ = writeln!(out, "- **Indicators**: {}", indicators.trim());
                }
            }
            Self::DiscussionNotes { notes } => {
                for note in notes {
                    match note {
                        DiscussionNote::Quoted { speaker, quote } => {
                            let _ = writeln!(out, "- **{}**: \"{}\"", speaker.trim(), quote.trim());
                        }
                        DiscussionNote::Plain(text) => {
                            let _ = writeln!(out, "- {}", text.trim());
                        }
                    }
                }
            }
            Self::TerminalCommands { commands } => {
                for command in commands {
                    let _ = writeln!(out, "- `{}`", command.trim());
                }
            }
            Self::CommitMetadata { fields } => {
                for (key, value) in fields {
                    let _ = writeln!(out, "- **{}**: {}", key, value);
                }
            }
        }
    }
}

/// One journal entry, keyed by the short commit hash.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    /// Formatted `HH:MM AM/PM`, derived from the commit's author time so
    /// that regenerating from the same evidence renders identical bytes.
    pub timestamp: String,
    /// Short commit hash.
    pub commit_hash: String,
    pub sections: BTreeMap<SectionKind, SectionResult>,
}

impl JournalEntry {
    pub fn new(timestamp: String, commit_hash: String) -> Self {
        let mut sections = BTreeMap::new();
        for kind in SECTION_ORDER {
            sections.insert(kind, SectionResult::empty(kind));
        }
        Self {
            timestamp,
            commit_hash,
            sections,
        }
    }

    pub fn set_section(&mut self, result: SectionResult) {
        self.sections.insert(result.kind(), result);
    }

    /// Render the entry to Markdown with the fixed section grammar.
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "### {} — Commit {}", self.timestamp, self.commit_hash);
        for kind in SECTION_ORDER {
            let _ = writeln!(out);
            let _ = writeln!(out, "#### {}", kind.header());
            if let Some(section) = self.sections.get(&kind) {
                if !section.is_empty() {
                    let _ = writeln!(out);
                    section.render_body(&mut out);
                }
            }
        }
        out
    }
}

/// Render a manually-added block (reflection or context capture) with the
/// same header grammar entries use.
pub fn render_manual_block(timestamp: &str, label: &str, text: &str) -> String {
    format!("### {} — {}\n\n{}\n", timestamp, label, text.trim())
}

/// Split a daily file into its entry blocks. Each block starts at an H3
/// entry header; leading content before the first header is dropped, and the
/// `---` separator between appended blocks belongs to neither side.
pub fn split_entries(content: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut start: Option<usize> = None;
    for (offset, line) in line_offsets(content) {
        if line.starts_with("### ") {
            if let Some(s) = start {
                blocks.push(clean_block(&content[s..offset]));
            }
            start = Some(offset);
        }
    }
    if let Some(s) = start {
        blocks.push(clean_block(&content[s..]));
    }
    blocks
}

fn clean_block(block: &str) -> &str {
    let block = block.trim_end();
    block
        .strip_suffix("---")
        .map(str::trim_end)
        .unwrap_or(block)
}

fn line_offsets(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content.split_inclusive('\n').scan(0usize, |offset, line| {
        let start = *offset;
        *offset += line.len();
        Some((start, line))
    })
}
