// src/llm/openai.rs
// OpenAI-compatible completions client (non-streaming, JSON response mode)

use crate::error::{AiError, Result};
use crate::llm::http_client::LlmHttpClient;
use crate::llm::provider::{LlmClient, Provider};
use crate::llm::types::{ChatMessage, ChatResult, Usage};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Hard per-request timeout; the orchestrator layers its own deadlines on top.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for any provider speaking the OpenAI completions dialect.
pub struct OpenAiClient {
    provider: Provider,
    api_key: String,
    model: String,
    http: LlmHttpClient,
}

#[derive(Deserialize)]
struct CompletionsResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(provider: Provider, api_key: String, model: String) -> Self {
        let model = if model.trim().is_empty() {
            provider.default_model().to_string()
        } else {
            model
        };
        Self {
            provider,
            api_key,
            model,
            http: LlmHttpClient::new(REQUEST_TIMEOUT, CONNECT_TIMEOUT),
        }
    }

    fn request_body(&self, messages: &[ChatMessage]) -> Result<String> {
        // temperature 0 keeps entries byte-identical for identical evidence
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0,
            "response_format": {"type": "json_object"},
        });
        Ok(serde_json::to_string(&body)?)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    #[instrument(skip(self, messages), fields(request_id, model = %self.model, message_count = messages.len()))]
    async fn complete_json(&self, messages: Vec<ChatMessage>) -> Result<ChatResult> {
        let request_id = uuid::Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        let body = self.request_body(&messages)?;
        let start = Instant::now();
        let raw = self
            .http
            .execute_with_retry(&request_id, self.provider.api_url(), &self.api_key, body)
            .await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        let parsed: CompletionsResponse = serde_json::from_str(&raw)
            .map_err(|e| AiError::InvalidResponse(format!("completions envelope: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AiError::InvalidResponse("empty completion content".into()))?;

        if let Some(ref u) = parsed.usage {
            debug!(
                request_id = %request_id,
                prompt_tokens = u.prompt_tokens,
                completion_tokens = u.completion_tokens,
                duration_ms,
                "LLM usage"
            );
        }
        crate::telemetry::duration_ms("llm.request_duration_ms", duration_ms as f64);

        Ok(ChatResult {
            request_id,
            content,
            usage: parsed.usage,
            duration_ms,
        })
    }

    fn provider_type(&self) -> Provider {
        self.provider
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_model_falls_back_to_default() {
        let client = OpenAiClient::new(Provider::OpenAi, "key".into(), "  ".into());
        assert_eq!(client.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn test_custom_model_kept() {
        let client = OpenAiClient::new(Provider::OpenAi, "key".into(), "gpt-4o".into());
        assert_eq!(client.model_name(), "gpt-4o");
    }

    #[test]
    fn test_request_body_sets_json_mode_and_zero_temperature() {
        let client = OpenAiClient::new(Provider::OpenAi, "key".into(), "gpt-4o".into());
        let body = client
            .request_body(&[ChatMessage::user("hello")])
            .expect("body");
        let value: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(value["temperature"], 0);
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["content"], "hello");
    }

    #[test]
    fn test_parse_completions_response() {
        let raw = serde_json::json!({
            "choices": [{"message": {"content": "{\"summary\": \"did things\"}"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })
        .to_string();
        let parsed: CompletionsResponse = serde_json::from_str(&raw).expect("parse");
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("{\"summary\": \"did things\"}")
        );
        assert_eq!(parsed.usage.map(|u| u.total_tokens), Some(15));
    }
}
