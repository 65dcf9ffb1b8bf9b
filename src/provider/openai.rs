//! OpenAI chat-completions client (small-budget provider family).

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{is_context_length_message, RecapError};
use crate::provider::{build_http_client, ProviderProfile, TextProvider};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Chat-completions request message.
#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

/// Chat-completions request body.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
}

/// Chat-completions response choice.
#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

/// Chat-completions response message.
#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Chat-completions response body.
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

/// Structured error body returned by the chat-completions endpoint.
#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
}

/// OpenAI API client.
#[derive(Debug)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    /// Creates a client from the `OPENAI_API_KEY` environment variable.
    pub fn from_env(model: Option<String>) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RecapError::Configuration(
                "OpenAI API key not found. Set the OPENAI_API_KEY environment variable".to_string(),
            )
        })?;
        Self::new(api_key, model)
    }

    /// Creates a client with an explicit credential.
    pub fn new(api_key: String, model: Option<String>) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Overrides the API base URL (test seam).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Maps a non-success chat-completions error body onto the crate error
/// taxonomy. The endpoint reports token-limit rejections with the
/// `context_length_exceeded` code; older deployments only mention the
/// limit in the message text.
fn map_error_body(status: reqwest::StatusCode, body: &str) -> RecapError {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if parsed.error.code.as_deref() == Some("context_length_exceeded")
            || is_context_length_message(&parsed.error.message)
        {
            return RecapError::ContextLength(parsed.error.message);
        }
    }
    if is_context_length_message(body) {
        return RecapError::ContextLength(body.to_string());
    }
    RecapError::ProviderTransport(format!("HTTP {status}: {body}"))
}

impl TextProvider for OpenAiProvider {
    fn generate<'a>(
        &'a self,
        model: &'a str,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            debug!(
                prompt_len = prompt.len(),
                model = %model,
                "Preparing OpenAI API request"
            );

            let request = ChatRequest {
                model: model.to_string(),
                messages: vec![Message {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                }],
                // Low temperature for consistent structured output.
                temperature: 0.1,
            };

            let url = format!("{}/v1/chat/completions", self.base_url);
            info!(url = %url, model = %model, "Sending request to OpenAI API");

            let response = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("content-type", "application/json")
                .json(&request)
                .send()
                .await
                .map_err(|e| RecapError::ProviderTransport(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_else(|e| {
                    debug!("Failed to read error response body: {e}");
                    String::new()
                });
                return Err(map_error_body(status, &error_text).into());
            }

            let body: ChatResponse = response
                .json()
                .await
                .map_err(|e| RecapError::ProviderFormat(e.to_string()))?;

            let text = body
                .choices
                .first()
                .map(|c| c.message.content.clone())
                .ok_or_else(|| RecapError::ProviderFormat("No choices in response".to_string()))?;

            debug!(
                response_len = text.len(),
                "Extracted text content from OpenAI API response"
            );

            Ok(text)
        })
    }

    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            family: "openai".to_string(),
            model: self.model.clone(),
            max_context_tokens: 16_385,
            reserved_output_tokens: 4_096,
        }
    }
}
