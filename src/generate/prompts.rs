// src/generate/prompts.rs
// Prompt assets for the boundary filter and section generators.
//
// The JSON schema named in each prompt is the contract; responses are
// validated against typed structs, and a mismatch falls back to the
// section's empty default.

/// Shared rules prepended to every section generator prompt.
pub const GENERATOR_PREAMBLE: &str = "\
You write one section of a developer's journal entry about a single git commit.

Rules:
- Ground every statement in the chat transcript, the diff, or the previous \
journal entry. If the evidence is insufficient, return the empty value for \
the schema; never speculate.
- Write about the developer in third person or neutral voice. Never use \
first person.
- Never attribute feelings the developer did not express themselves.
- The chat transcript is chronologically ordered; insights from early \
messages carry equal weight to later ones.
- Respond with a single JSON object matching the requested schema exactly.";

pub const SUMMARY_PROMPT: &str = "\
Summarize what this commit accomplished and why, in a short paragraph a \
teammate could read in thirty seconds.

Schema: {\"summary\": string}";

pub const TECHNICAL_SYNOPSIS_PROMPT: &str = "\
Describe the technical shape of the change: which files and subsystems were \
touched, the approach taken, and any notable implementation details visible \
in the diff.

Schema: {\"synopsis\": string}";

pub const ACCOMPLISHMENTS_PROMPT: &str = "\
List the concrete things that got done in this commit, one item per \
accomplishment. An empty list is correct when the evidence shows none.

Schema: {\"accomplishments\": [string]}";

pub const FRUSTRATIONS_PROMPT: &str = "\
List difficulties or friction the developer explicitly ran into, as stated \
in the chat or commit message. Do not infer frustration from the code alone.

Schema: {\"frustrations\": [string]}";

pub const TONE_MOOD_PROMPT: &str = "\
Characterize the developer's mood during this work, only from language they \
used themselves in the chat. Quote the indicators. Return empty strings when \
the chat gives no signal.

Schema: {\"mood\": string, \"indicators\": string}";

pub const DISCUSSION_NOTES_PROMPT: &str = "\
Extract the substantive exchanges from the chat: technical decisions, \
tradeoffs, and direction changes. Quotes must be verbatim from the \
transcript and speaker attribution must be unambiguous; select for \
technical or decision content, not emotional tone. A note may be either a \
verbatim quote with its speaker or a short neutral statement of a decision.

Schema: {\"notes\": [{\"speaker\": string, \"quote\": string} | string]}";

pub const COMMIT_METADATA_PROMPT: &str = "\
Produce a flat string-to-string map of commit facts: files changed, \
insertions/deletions if visible, size classification, merge status, and \
anything else directly present in the commit evidence.

Schema: {\"key\": \"value\", ...} (flat map, string values)";

/// Boundary filter prompt. The task is boundary-only, never summarization.
pub const BOUNDARY_SYSTEM: &str = "\
You locate where work on a specific git commit begins inside a chat \
transcript. This is a boundary-finding task only; do not summarize or \
evaluate the conversation.

You receive the transcript in chronological order with each message's \
bubbleId, the commit's diff summary and changed files, and the previous \
journal entry when one exists. The previous entry shows where the prior \
commit's work ended; messages belonging to it are before the boundary.

Return the bubbleId of the FIRST message that belongs to work on THIS \
commit, copied verbatim from the transcript. Never cut messages from the \
end of the transcript.

Ambiguity is expected with multi-commit sessions; express it honestly in \
the confidence field (1 = guessing, 10 = certain).

Schema: {\"bubbleId\": string, \"confidence\": integer 1-10}";

/// Rollup prompt shared by all summary periods.
pub const SUMMARY_SYSTEM: &str = "\
You write a rollup summary of a developer's journal for one period. Ground \
every statement in the source material provided; never invent work that is \
not recorded. Organize by theme, not by timestamp, and keep it scannable. \
Write in third person or neutral voice.

Respond with a single JSON object: {\"summary\": string} where the string \
is the Markdown body of the summary.";
