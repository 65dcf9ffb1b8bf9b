//! Text-generation provider trait and implementations.

pub mod anthropic;
pub mod budget;
pub mod openai;
pub mod response;
pub mod retry;
pub mod test_utils;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use crate::error::RecapError;

/// HTTP request timeout for provider API calls.
///
/// Set to 5 minutes to accommodate large prompts and long model responses
/// while preventing indefinite hangs.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Metadata about a provider implementation.
#[derive(Clone, Debug)]
pub struct ProviderProfile {
    /// Provider family name.
    pub family: String,
    /// Default model identifier.
    pub model: String,
    /// Maximum context window in tokens (input + output).
    pub max_context_tokens: usize,
    /// Tokens reserved for the model's response.
    pub reserved_output_tokens: usize,
}

impl ProviderProfile {
    /// Maximum input tokens available after reserving output tokens.
    #[must_use]
    pub fn input_budget(&self) -> usize {
        self.max_context_tokens
            .saturating_sub(self.reserved_output_tokens)
    }
}

/// Trait for text-generation provider clients.
///
/// One operation: send a prompt to a model, get raw text back. Failures
/// must be distinguishable as missing credential
/// ([`RecapError::Configuration`]), context-length exceeded
/// ([`RecapError::ContextLength`]), or other transport error
/// ([`RecapError::ProviderTransport`]).
pub trait TextProvider: Send + Sync + std::fmt::Debug {
    /// Sends a prompt to the given model and returns the raw response text.
    fn generate<'a>(
        &'a self,
        model: &'a str,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

    /// Returns metadata about this provider.
    fn profile(&self) -> ProviderProfile;
}

/// Builds an HTTP client with the standard request timeout.
pub(crate) fn build_http_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

/// Creates a provider client by family name.
///
/// `model` overrides the family default when given. Unknown families are
/// a fatal configuration error.
pub fn create(family: &str, model: Option<String>) -> Result<Box<dyn TextProvider>> {
    match family {
        "openai" => Ok(Box::new(openai::OpenAiProvider::from_env(model)?)),
        "anthropic" => Ok(Box::new(anthropic::AnthropicProvider::from_env(model)?)),
        _ => Err(RecapError::Configuration(format!("Unknown provider family: {family}")).into()),
    }
}
