// src/llm/types.rs
// Shared LLM types for requests and responses (OpenAI-compatible format)

use serde::{Deserialize, Serialize};

/// Message in a completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "system" | "user" | "assistant"
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Usage statistics
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Result of a completion request
#[derive(Debug, Clone)]
pub struct ChatResult {
    pub request_id: String,
    pub content: String,
    pub usage: Option<Usage>,
    pub duration_ms: u64,
}
