//! Scripted provider for tests.
//!
//! Available outside `#[cfg(test)]` so integration tests can drive the
//! pipeline without a network.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::provider::{ProviderProfile, TextProvider};

/// Mock provider with a pre-programmed queue of responses.
///
/// Responses are returned in FIFO order. When the queue is exhausted,
/// subsequent calls return `Err("no more scripted responses")`.
///
/// Every call records the prompt so tests can inspect what was
/// dispatched and how many requests were made.
#[derive(Debug)]
pub struct ScriptedProvider {
    responses: Arc<Mutex<VecDeque<Result<String>>>>,
    profile: ProviderProfile,
    recorded_prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProvider {
    /// Creates a mock provider that returns the given responses in order.
    #[must_use]
    pub fn new(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            profile: ProviderProfile {
                family: "scripted".to_string(),
                model: "scripted-model".to_string(),
                max_context_tokens: 200_000,
                reserved_output_tokens: 8_192,
            },
            recorded_prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the mock with a custom context window size.
    ///
    /// Useful for forcing the chunking path with a small budget.
    #[must_use]
    pub fn with_context_tokens(mut self, max_context_tokens: usize) -> Self {
        self.profile.max_context_tokens = max_context_tokens;
        self
    }

    /// Returns the mock with a custom reserved-output size.
    #[must_use]
    pub fn with_reserved_output_tokens(mut self, reserved: usize) -> Self {
        self.profile.reserved_output_tokens = reserved;
        self
    }

    /// All prompts dispatched to this provider, in order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.recorded_prompts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Number of requests made so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.recorded_prompts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Number of unconsumed scripted responses.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl TextProvider for ScriptedProvider {
    fn generate<'a>(
        &'a self,
        _model: &'a str,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        let responses = self.responses.clone();
        let recorded = self.recorded_prompts.clone();
        let prompt = prompt.to_string();
        Box::pin(async move {
            recorded
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(prompt);
            responses
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("no more scripted responses")))
        })
    }

    fn profile(&self) -> ProviderProfile {
        self.profile.clone()
    }
}
