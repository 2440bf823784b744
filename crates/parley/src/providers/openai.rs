// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use async_trait::async_trait;
use llm_contracts::{
    BackendConfig, GenerationRequest, LLMError, LLMResult, ProviderResponse, TextGenerator,
};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Chat-completions client for Ollama's OpenAI-compatible endpoint or a hosted API.
#[derive(Debug, Clone)]
pub struct OpenAICompatibleGenerator {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl OpenAICompatibleGenerator {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout_seconds: u64,
        max_retries: u32,
    ) -> LLMResult<Self> {
        let timeout = Duration::from_secs(timeout_seconds);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LLMError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            endpoint: endpoint.into(),
            timeout,
            max_retries: max_retries.max(1),
            backoff: DEFAULT_BACKOFF,
        })
    }

    pub fn from_config(config: &BackendConfig) -> LLMResult<Self> {
        Self::new(
            config.endpoint.clone(),
            config.api_key.clone(),
            config.timeout_seconds,
            config.max_retries,
        )
    }

    /// Base wait between network retries; doubled per attempt up to 8x.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn status_error(status: StatusCode, body: String) -> LLMError {
        match status {
            StatusCode::TOO_MANY_REQUESTS => LLMError::RateLimit,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                LLMError::Authentication(format!("API error {status}: {body}"))
            }
            s if s.is_server_error() => LLMError::Provider(format!("API error {status}: {body}")),
            _ => LLMError::Configuration(format!("Request rejected {status}: {body}")),
        }
    }

    async fn execute_request_with_retry(&self, payload: &Value) -> LLMResult<Value> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let wait = self.backoff * 2_u32.pow(attempt.min(3));
                debug!(attempt = attempt, wait_ms = wait.as_millis() as u64, "Retrying request");
                tokio::time::sleep(wait).await;
            }

            let mut request = self
                .client
                .post(&self.endpoint)
                .header("Content-Type", "application/json")
                .json(payload);
            if let Some(key) = &self.api_key {
                request = request.header("Authorization", format!("Bearer {key}"));
            }

            match tokio::time::timeout(self.timeout, request.send()).await {
                Ok(Ok(response)) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json().await.map_err(|e| {
                            LLMError::Serialisation(format!("Failed to parse response: {e}"))
                        });
                    }
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    let error = Self::status_error(status, body);
                    warn!(status = status.as_u16(), attempt = attempt, "Generation request failed");
                    if !error.is_transient() {
                        return Err(error);
                    }
                    last_error = Some(error);
                }
                Ok(Err(e)) => {
                    last_error = Some(LLMError::Network(format!("Request failed: {e}")));
                }
                Err(_) => {
                    last_error = Some(LLMError::Timeout);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LLMError::Internal("Unknown error".to_string())))
    }
}

#[async_trait]
impl TextGenerator for OpenAICompatibleGenerator {
    async fn generate(&self, request: GenerationRequest) -> LLMResult<String> {
        let payload = serde_json::to_value(request.to_provider_request())
            .map_err(|e| LLMError::Serialisation(e.to_string()))?;
        let body = self.execute_request_with_retry(&payload).await?;
        let response = ProviderResponse::from_chat_completion(&body, &request.model)?;
        debug!(
            model = %response.model,
            completion_tokens = response.usage.completion_tokens,
            "Generation complete"
        );
        Ok(response.content)
    }

    fn provider_name(&self) -> &'static str {
        "openai-compatible"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let e = OpenAICompatibleGenerator::status_error(StatusCode::TOO_MANY_REQUESTS, String::new());
        assert!(matches!(e, LLMError::RateLimit));
        let e = OpenAICompatibleGenerator::status_error(StatusCode::BAD_GATEWAY, "x".into());
        assert!(e.is_transient());
        let e = OpenAICompatibleGenerator::status_error(StatusCode::BAD_REQUEST, "x".into());
        assert!(!e.is_transient());
        let e = OpenAICompatibleGenerator::status_error(StatusCode::UNAUTHORIZED, "x".into());
        assert!(matches!(e, LLMError::Authentication(_)));
    }
}
