// src/llm/http_client.rs
// Shared HTTP client configuration for all LLM providers

use crate::error::{AiError, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::warn;

/// Default maximum retry attempts for transient failures
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default base backoff duration between retries (doubles each attempt)
const DEFAULT_BASE_BACKOFF_SECS: u64 = 1;

/// Shared HTTP client configuration for all LLM providers
pub struct LlmHttpClient {
    client: Client,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl LlmHttpClient {
    pub fn new(request_timeout: Duration, connect_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            request_timeout,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: Duration::from_secs(DEFAULT_BASE_BACKOFF_SECS),
        }
    }

    /// Execute HTTP request with retry logic.
    /// Returns the response body as text on success.
    pub async fn execute_with_retry(
        &self,
        request_id: &str,
        url: &str,
        api_key: &str,
        body: String,
    ) -> Result<String> {
        let mut attempts = 0;
        let mut backoff = self.base_backoff;

        loop {
            let response_result = self
                .client
                .post(url)
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .body(body.clone())
                .send()
                .await;

            match response_result {
                Ok(response) => {
                    let status = response.status();
                    if status.as_u16() == 401 || status.as_u16() == 403 {
                        return Err(AiError::InvalidKey.into());
                    }
                    if !status.is_success() {
                        let error_body = response.text().await.unwrap_or_default();

                        // Retry rate limits and server errors
                        if attempts < self.max_attempts
                            && (status.as_u16() == 429 || status.is_server_error())
                        {
                            warn!(
                                request_id = %request_id,
                                status = %status,
                                "Transient error, retrying in {:?}...",
                                backoff
                            );
                            tokio::time::sleep(backoff).await;
                            attempts += 1;
                            backoff *= 2;
                            continue;
                        }

                        return Err(AiError::ProviderFailure(format!(
                            "API error {}: {}",
                            status, error_body
                        ))
                        .into());
                    }

                    return response.text().await.map_err(|e| {
                        AiError::ProviderFailure(format!("Failed to read response body: {e}"))
                            .into()
                    });
                }
                Err(e) => {
                    if e.is_timeout() {
                        return Err(
                            AiError::Timeout(self.request_timeout.as_secs()).into()
                        );
                    }
                    if attempts < self.max_attempts {
                        warn!(
                            request_id = %request_id,
                            error = %e,
                            "Request failed, retrying in {:?}...",
                            backoff
                        );
                        tokio::time::sleep(backoff).await;
                        attempts += 1;
                        backoff *= 2;
                        continue;
                    }
                    return Err(AiError::ProviderFailure(format!(
                        "Request failed after retries: {e}"
                    ))
                    .into());
                }
            }
        }
    }
}
