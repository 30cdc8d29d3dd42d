// src/chat/boundary.rs
// AI boundary filter: where does this commit's work begin in the chat?
//
// Multi-commit sessions would otherwise bleed earlier commits' discussion
// into every entry. A side-model call picks the first bubble belonging to
// the current commit; everything before it is dropped. The window's upper
// bound already trims the tail, so the filter never cuts from the end.

use crate::generate::prompts::BOUNDARY_SYSTEM;
use crate::git::GitContext;
use crate::llm::json::parse_json_hardened;
use crate::llm::{ChatMessage, LlmClient};
use crate::workspace::Message;
use serde::Deserialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Below this confidence the model is guessing; keep everything. A
/// too-inclusive entry beats a dropped one.
const FALLBACK_CONFIDENCE: i64 = 5;

#[derive(Debug, Deserialize)]
struct BoundaryPayload {
    #[serde(rename = "bubbleId", default)]
    bubble_id: Option<String>,
    #[serde(default)]
    confidence: Option<i64>,
}

/// Outcome of one boundary decision, for telemetry and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryOutcome {
    pub messages_in: usize,
    pub messages_out: usize,
    pub confidence: Option<i64>,
    pub fallback_used: bool,
    pub ambiguous: bool,
}

/// Trim a message stream to the current commit's work.
///
/// Trust ladder: confidence at or above `min_confidence` is trusted;
/// between 5 and the threshold it is trusted but recorded as ambiguous;
/// below 5, or on any invalid response or unknown bubbleId, every message
/// is kept.
#[instrument(name = "boundary.filter", skip_all, fields(
    messages_in = messages.len(),
    messages_out,
    confidence,
    fallback_used,
))]
pub async fn filter_for_commit(
    client: &Arc<dyn LlmClient>,
    messages: Vec<Message>,
    git_context: &GitContext,
    previous_entry: Option<&str>,
    min_confidence: u8,
) -> (Vec<Message>, BoundaryOutcome) {
    if messages.is_empty() {
        return (
            messages,
            BoundaryOutcome {
                messages_in: 0,
                messages_out: 0,
                confidence: None,
                fallback_used: false,
                ambiguous: false,
            },
        );
    }

    let request = vec![
        ChatMessage::system(BOUNDARY_SYSTEM),
        ChatMessage::user(render_boundary_input(&messages, git_context, previous_entry)),
    ];

    let decision = match client.complete_json(request).await {
        Ok(result) => parse_json_hardened::<BoundaryPayload>(&result.content).ok(),
        Err(e) => {
            warn!(error = %e, "Boundary model call failed; keeping all messages");
            None
        }
    };

    let outcome = apply_decision(messages, decision, min_confidence);
    record_outcome(&outcome.1);
    outcome
}

/// Pure decision logic, separated from the model call for tests.
fn apply_decision(
    messages: Vec<Message>,
    decision: Option<BoundaryPayload>,
    min_confidence: u8,
) -> (Vec<Message>, BoundaryOutcome) {
    let messages_in = messages.len();

    let keep_all = |messages: Vec<Message>, confidence: Option<i64>| {
        let outcome = BoundaryOutcome {
            messages_in,
            messages_out: messages_in,
            confidence,
            fallback_used: true,
            ambiguous: false,
        };
        (messages, outcome)
    };

    let Some(payload) = decision else {
        return keep_all(messages, None);
    };
    let (Some(bubble_id), Some(confidence)) = (payload.bubble_id, payload.confidence) else {
        return keep_all(messages, payload.confidence);
    };

    if confidence < FALLBACK_CONFIDENCE {
        info!(confidence, "Boundary confidence too low; keeping all messages");
        return keep_all(messages, Some(confidence));
    }

    let Some(index) = messages.iter().position(|m| m.bubble_id == bubble_id) else {
        warn!(bubble_id, "Boundary bubbleId not in transcript; keeping all messages");
        return keep_all(messages, Some(confidence));
    };

    let ambiguous = confidence < i64::from(min_confidence);
    let kept: Vec<Message> = messages.into_iter().skip(index).collect();
    let outcome = BoundaryOutcome {
        messages_in,
        messages_out: kept.len(),
        confidence: Some(confidence),
        fallback_used: false,
        ambiguous,
    };
    (kept, outcome)
}

fn render_boundary_input(
    messages: &[Message],
    git_context: &GitContext,
    previous_entry: Option<&str>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## Commit under consideration");
    let _ = writeln!(out, "message: {}", git_context.message);
    let _ = writeln!(out, "changed files:");
    for file in &git_context.changed_files {
        let _ = writeln!(out, "- {file}");
    }
    if !git_context.diff_summary.is_empty() {
        let _ = writeln!(out, "\n## Diff summary");
        let _ = writeln!(out, "{}", git_context.diff_summary);
    }
    if let Some(previous) = previous_entry {
        let _ = writeln!(out, "\n## Previous journal entry");
        let _ = writeln!(out, "{previous}");
    }
    let _ = writeln!(out, "\n## Transcript (chronological)");
    for message in messages {
        let _ = writeln!(
            out,
            "[{}] ({}) {}",
            message.bubble_id,
            message.role.as_str(),
            message.text
        );
    }
    out
}

fn record_outcome(outcome: &BoundaryOutcome) {
    let span = tracing::Span::current();
    span.record("messages_out", outcome.messages_out);
    if let Some(confidence) = outcome.confidence {
        span.record("confidence", confidence);
    }
    span.record("fallback_used", outcome.fallback_used);

    crate::telemetry::gauge("boundary.messages_in", outcome.messages_in as f64);
    crate::telemetry::gauge("boundary.messages_out", outcome.messages_out as f64);
    if outcome.messages_in > 0 {
        let reduction =
            100.0 * (outcome.messages_in - outcome.messages_out) as f64 / outcome.messages_in as f64;
        crate::telemetry::gauge("boundary.reduction_pct", reduction);
    }
    if let Some(confidence) = outcome.confidence {
        crate::telemetry::gauge("boundary.confidence", confidence as f64);
    }
    if outcome.fallback_used {
        crate::telemetry::counter("boundary.fallback_used", 1);
    }
    if outcome.ambiguous {
        crate::telemetry::counter("boundary.ambiguous", 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::Role;

    fn transcript(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| Message {
                bubble_id: format!("bbl-{i}"),
                composer_id: "c1".into(),
                role: if i % 2 == 0 { Role::User } else { Role::Assistant },
                text: format!("message {i}"),
                timestamp: 1_700_000_000_000 + i as i64,
            })
            .collect()
    }

    fn payload(bubble_id: &str, confidence: i64) -> BoundaryPayload {
        BoundaryPayload {
            bubble_id: Some(bubble_id.into()),
            confidence: Some(confidence),
        }
    }

    #[test]
    fn test_high_confidence_trusts_boundary() {
        let (kept, outcome) = apply_decision(transcript(50), Some(payload("bbl-17", 9)), 8);
        assert_eq!(kept.len(), 33);
        assert_eq!(kept[0].bubble_id, "bbl-17");
        assert!(!outcome.fallback_used);
        assert!(!outcome.ambiguous);
        assert_eq!(outcome.confidence, Some(9));
    }

    #[test]
    fn test_low_confidence_keeps_all() {
        let (kept, outcome) = apply_decision(transcript(50), Some(payload("bbl-17", 4)), 8);
        assert_eq!(kept.len(), 50);
        assert!(outcome.fallback_used);
    }

    #[test]
    fn test_mid_confidence_trusts_but_marks_ambiguous() {
        let (kept, outcome) = apply_decision(transcript(50), Some(payload("bbl-17", 6)), 8);
        assert_eq!(kept.len(), 33);
        assert!(!outcome.fallback_used);
        assert!(outcome.ambiguous);
    }

    #[test]
    fn test_unknown_bubble_id_keeps_all() {
        let (kept, outcome) = apply_decision(transcript(10), Some(payload("bbl-999", 10)), 8);
        assert_eq!(kept.len(), 10);
        assert!(outcome.fallback_used);
    }

    #[test]
    fn test_missing_fields_keep_all() {
        let decision = BoundaryPayload {
            bubble_id: None,
            confidence: Some(9),
        };
        let (kept, outcome) = apply_decision(transcript(10), Some(decision), 8);
        assert_eq!(kept.len(), 10);
        assert!(outcome.fallback_used);
    }

    #[test]
    fn test_no_decision_keeps_all() {
        let (kept, outcome) = apply_decision(transcript(10), None, 8);
        assert_eq!(kept.len(), 10);
        assert!(outcome.fallback_used);
    }

    #[test]
    fn test_boundary_at_first_message_keeps_everything_without_fallback() {
        let (kept, outcome) = apply_decision(transcript(10), Some(payload("bbl-0", 10)), 8);
        assert_eq!(kept.len(), 10);
        assert!(!outcome.fallback_used);
    }

    #[test]
    fn test_payload_parses_from_llm_json() {
        let parsed: BoundaryPayload =
            parse_json_hardened(r#"{"bubbleId": "bbl-3", "confidence": 7}"#).expect("parse");
        assert_eq!(parsed.bubble_id.as_deref(), Some("bbl-3"));
        assert_eq!(parsed.confidence, Some(7));
    }
}
