// src/llm/provider.rs
// LLM provider abstraction layer

use crate::config::ScribeConfig;
use crate::error::{AiError, Result};
use crate::llm::openai::OpenAiClient;
use crate::llm::types::{ChatMessage, ChatResult};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// LLM provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenAi,
    DeepSeek,
}

impl Provider {
    /// Parse provider from string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "deepseek" => Some(Self::DeepSeek),
            _ => None,
        }
    }

    /// Completions endpoint for this provider
    pub fn api_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1/chat/completions",
            Self::DeepSeek => "https://api.deepseek.com/chat/completions",
        }
    }

    /// Default model for this provider
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::DeepSeek => "deepseek-chat",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::DeepSeek => write!(f, "deepseek"),
        }
    }
}

/// Trait for LLM clients - all providers must implement this
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a completion request expecting a JSON object response.
    async fn complete_json(&self, messages: Vec<ChatMessage>) -> Result<ChatResult>;

    /// Get the provider type
    fn provider_type(&self) -> Provider;

    /// Get the model name
    fn model_name(&self) -> String;
}

/// Build the configured client. Fails with `InvalidKey` when no API key can
/// be resolved: no section can be generated without one, so the whole
/// orchestration is refused up front.
pub fn build_client(config: &ScribeConfig) -> Result<Arc<dyn LlmClient>> {
    let provider = Provider::from_str(&config.ai.provider)
        .ok_or_else(|| crate::error::ScribeError::Config(format!(
            "unknown ai.provider '{}'",
            config.ai.provider
        )))?;
    let api_key = config.api_key().ok_or(AiError::InvalidKey)?;
    Ok(Arc::new(OpenAiClient::new(
        provider,
        api_key,
        config.ai.model.clone(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_str() {
        assert_eq!(Provider::from_str("openai"), Some(Provider::OpenAi));
        assert_eq!(Provider::from_str("OpenAI"), Some(Provider::OpenAi));
        assert_eq!(Provider::from_str("deepseek"), Some(Provider::DeepSeek));
        assert_eq!(Provider::from_str("claude"), None);
        assert_eq!(Provider::from_str(""), None);
    }

    #[test]
    fn test_provider_display() {
        assert_eq!(format!("{}", Provider::OpenAi), "openai");
        assert_eq!(format!("{}", Provider::DeepSeek), "deepseek");
    }

    #[test]
    fn test_default_models() {
        assert_eq!(Provider::OpenAi.default_model(), "gpt-4o-mini");
        assert_eq!(Provider::DeepSeek.default_model(), "deepseek-chat");
    }

    #[test]
    fn test_build_client_without_key_is_invalid_key() {
        let mut config = ScribeConfig::default();
        config.ai.provider = "openai".into();
        config.ai.api_key = None;
        // SAFETY: test-only env mutation
        unsafe { std::env::remove_var("OPENAI_API_KEY") };
        let err = build_client(&config).err().expect("should fail");
        assert_eq!(err.category(), "InvalidKey");
    }

    #[test]
    fn test_build_client_unknown_provider_is_config_error() {
        let mut config = ScribeConfig::default();
        config.ai.provider = "abacus".into();
        let err = build_client(&config).err().expect("should fail");
        assert_eq!(err.category(), "ConfigError");
    }
}
