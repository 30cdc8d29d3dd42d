// src/generate/sections.rs
// One typed LLM invocation per journal section.
//
// A generator can fail (timeout, bad JSON, schema mismatch) without taking
// the entry down: every failure collapses to the section's empty default.

use crate::error::{AiError, Result, ScribeError};
use crate::generate::context::JournalContext;
use crate::generate::prompts;
use crate::journal::entry::{DiscussionNote, SectionKind, SectionResult};
use crate::llm::json::parse_json_hardened;
use crate::llm::{ChatMessage, LlmClient};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{instrument, warn};

/// Soft budget; breaches are recorded, not enforced.
const SOFT_BUDGET: Duration = Duration::from_secs(5);
/// Hard budget; a generator past this returns its empty default.
const HARD_BUDGET: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct SummaryPayload {
    #[serde(default)]
    summary: String,
}

#[derive(Deserialize)]
struct SynopsisPayload {
    #[serde(default)]
    synopsis: String,
}

#[derive(Deserialize)]
struct AccomplishmentsPayload {
    #[serde(default)]
    accomplishments: Vec<String>,
}

#[derive(Deserialize)]
struct FrustrationsPayload {
    #[serde(default)]
    frustrations: Vec<String>,
}

#[derive(Deserialize)]
struct ToneMoodPayload {
    #[serde(default)]
    mood: String,
    #[serde(default)]
    indicators: String,
}

#[derive(Deserialize)]
struct DiscussionNotesPayload {
    #[serde(default)]
    notes: Vec<DiscussionNote>,
}

fn section_prompt(kind: SectionKind) -> Option<&'static str> {
    match kind {
        SectionKind::Summary => Some(prompts::SUMMARY_PROMPT),
        SectionKind::TechnicalSynopsis => Some(prompts::TECHNICAL_SYNOPSIS_PROMPT),
        SectionKind::Accomplishments => Some(prompts::ACCOMPLISHMENTS_PROMPT),
        SectionKind::Frustrations => Some(prompts::FRUSTRATIONS_PROMPT),
        SectionKind::ToneMood => Some(prompts::TONE_MOOD_PROMPT),
        SectionKind::DiscussionNotes => Some(prompts::DISCUSSION_NOTES_PROMPT),
        SectionKind::TerminalCommands => None,
        SectionKind::CommitMetadata => Some(prompts::COMMIT_METADATA_PROMPT),
    }
}

/// Parse a generator response into its typed section. Validation is the
/// serde schema; a mismatch is an error the caller converts to the default.
fn parse_section(kind: SectionKind, content: &str) -> std::result::Result<SectionResult, String> {
    match kind {
        SectionKind::Summary => {
            let payload: SummaryPayload = parse_json_hardened(content)?;
            Ok(SectionResult::Summary {
                summary: payload.summary,
            })
        }
        SectionKind::TechnicalSynopsis => {
            let payload: SynopsisPayload = parse_json_hardened(content)?;
            Ok(SectionResult::TechnicalSynopsis {
                synopsis: payload.synopsis,
            })
        }
        SectionKind::Accomplishments => {
            let payload: AccomplishmentsPayload = parse_json_hardened(content)?;
            Ok(SectionResult::Accomplishments {
                accomplishments: payload.accomplishments,
            })
        }
        SectionKind::Frustrations => {
            let payload: FrustrationsPayload = parse_json_hardened(content)?;
            Ok(SectionResult::Frustrations {
                frustrations: payload.frustrations,
            })
        }
        SectionKind::ToneMood => {
            let payload: ToneMoodPayload = parse_json_hardened(content)?;
            Ok(SectionResult::ToneMood {
                mood: payload.mood,
                indicators: payload.indicators,
            })
        }
        SectionKind::DiscussionNotes => {
            let payload: DiscussionNotesPayload = parse_json_hardened(content)?;
            Ok(SectionResult::DiscussionNotes {
                notes: payload.notes,
            })
        }
        SectionKind::TerminalCommands => Ok(SectionResult::empty(kind)),
        SectionKind::CommitMetadata => {
            // Tolerate non-string scalars; the section contract is a flat
            // string map.
            let raw: BTreeMap<String, serde_json::Value> = parse_json_hardened(content)?;
            let fields = raw
                .into_iter()
                .filter_map(|(k, v)| {
                    let value = match v {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Number(n) => n.to_string(),
                        serde_json::Value::Bool(b) => b.to_string(),
                        _ => return None,
                    };
                    Some((k, value))
                })
                .collect();
            Ok(SectionResult::CommitMetadata { fields })
        }
    }
}

/// Generate one section. Failures collapse to the section's empty default,
/// with one exception: a rejected API key is returned as an error, because
/// no section can succeed without a key and the entry must not be written.
#[instrument(name = "section.generate", skip_all, fields(section = kind.header(), duration_ms, fell_back))]
pub async fn generate_section(
    client: Arc<dyn LlmClient>,
    kind: SectionKind,
    ctx: Arc<JournalContext>,
) -> Result<SectionResult> {
    let Some(prompt) = section_prompt(kind) else {
        return Ok(SectionResult::empty(kind));
    };

    let system = format!("{}\n\n{}", prompts::GENERATOR_PREAMBLE, prompt);
    let messages = vec![ChatMessage::system(system), ChatMessage::user(ctx.render())];

    let start = Instant::now();
    let result = tokio::time::timeout(HARD_BUDGET, client.complete_json(messages)).await;
    let elapsed = start.elapsed();

    let span = tracing::Span::current();
    span.record("duration_ms", elapsed.as_millis() as u64);
    if elapsed > SOFT_BUDGET {
        crate::telemetry::counter("section.soft_budget_exceeded", 1);
    }

    let section = match result {
        Err(_) => {
            warn!(section = kind.header(), "Generator exceeded hard budget");
            crate::telemetry::counter("section.hard_budget_exceeded", 1);
            None
        }
        Ok(Err(ScribeError::Ai(AiError::InvalidKey))) => {
            warn!(section = kind.header(), "API key rejected by provider");
            crate::telemetry::outcome_counter("section.generated", false);
            return Err(AiError::InvalidKey.into());
        }
        Ok(Err(e)) => {
            warn!(section = kind.header(), error = %e, "Generator call failed");
            None
        }
        Ok(Ok(reply)) => match parse_section(kind, &reply.content) {
            Ok(section) => Some(section),
            Err(e) => {
                warn!(section = kind.header(), error = %e, "Generator response failed validation");
                None
            }
        },
    };

    let fell_back = section.is_none();
    span.record("fell_back", fell_back);
    crate::telemetry::outcome_counter("section.generated", !fell_back);
    Ok(section.unwrap_or_else(|| SectionResult::empty(kind)))
}
