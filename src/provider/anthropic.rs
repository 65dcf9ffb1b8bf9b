//! Anthropic messages-API client (large-budget provider family).

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{is_context_length_message, RecapError};
use crate::provider::{build_http_client, ProviderProfile, TextProvider};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";

/// Messages-API request message.
#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

/// Messages-API request body.
#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: i32,
    messages: Vec<Message>,
}

/// Messages-API response content block.
#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: String,
}

/// Messages-API response body.
#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

/// Anthropic API client.
#[derive(Debug)]
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    /// Creates a client from the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env(model: Option<String>) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            RecapError::Configuration(
                "Anthropic API key not found. Set the ANTHROPIC_API_KEY environment variable"
                    .to_string(),
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

impl TextProvider for AnthropicProvider {
    fn generate<'a>(
        &'a self,
        model: &'a str,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            debug!(
                prompt_len = prompt.len(),
                model = %model,
                "Preparing Anthropic API request"
            );

            let request = MessagesRequest {
                model: model.to_string(),
                max_tokens: self.profile().reserved_output_tokens as i32,
                messages: vec![Message {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                }],
            };

            let url = format!("{}/v1/messages", self.base_url);
            info!(url = %url, model = %model, "Sending request to Anthropic API");

            let response = self
                .client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
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
                if is_context_length_message(&error_text) {
                    return Err(RecapError::ContextLength(error_text).into());
                }
                return Err(
                    RecapError::ProviderTransport(format!("HTTP {status}: {error_text}")).into(),
                );
            }

            let body: MessagesResponse = response
                .json()
                .await
                .map_err(|e| RecapError::ProviderFormat(e.to_string()))?;

            let text = body
                .content
                .first()
                .filter(|c| c.content_type == "text")
                .map(|c| c.text.clone())
                .ok_or_else(|| {
                    RecapError::ProviderFormat("No text content in response".to_string())
                })?;

            debug!(
                response_len = text.len(),
                "Extracted text content from Anthropic API response"
            );

            Ok(text)
        })
    }

    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            family: "anthropic".to_string(),
            model: self.model.clone(),
            max_context_tokens: 200_000,
            reserved_output_tokens: 8_192,
        }
    }
}
