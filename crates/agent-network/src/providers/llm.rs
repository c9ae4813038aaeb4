//! OpenAI-compatible chat completions client
//!
//! Works against any server exposing `POST {base_url}/chat/completions`
//! (OpenAI, Ollama's `/v1` endpoint, vLLM, ...).

use super::{LlmProvider, ProviderResult};
use crate::error::ProviderError;
use async_trait::async_trait;
use dealflow_common::LlmConfig;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for an OpenAI-compatible completion endpoint
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleLlm {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl OpenAiCompatibleLlm {
    /// Build a client from the `[llm]` config section.
    ///
    /// The API key is resolved once here: inline `api_key` first, then the
    /// environment variable named by `api_key_env`. A missing key is allowed
    /// for local servers that do not check it.
    pub fn from_config(config: &LlmConfig) -> ProviderResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::unavailable(format!("failed to build HTTP client: {}", e)))?;

        let api_key = config.resolve_api_key();
        if api_key.is_none() {
            warn!(
                "No LLM API key configured (checked llm.api_key and ${})",
                config.api_key_env
            );
        }

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            timeout,
        })
    }

    fn map_transport_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else if err.is_decode() {
            ProviderError::malformed(err.to_string())
        } else {
            ProviderError::unavailable(err.to_string())
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleLlm {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> ProviderResult<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            return Err(ProviderError::unavailable(format!(
                "completion endpoint returned HTTP {}",
                status
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(ProviderError::Empty);
        }

        debug!("Completion returned {} chars", content.len());
        Ok(content)
    }
}
