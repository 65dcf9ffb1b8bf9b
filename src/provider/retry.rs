//! Retry-with-fallback policy for provider calls.
//!
//! Every provider call site goes through one [`CallPolicy`] so the
//! retry/fallback rules live in exactly one place: a context-length
//! failure is retried once against the secondary provider with the
//! identical prompt, and any other error propagates to the caller.

use anyhow::Result;
use tracing::{debug, warn};

use crate::error::{classify, ErrorClass};
use crate::provider::TextProvider;

/// Retry/fallback policy shared by all provider call sites.
#[derive(Clone, Copy, Debug)]
pub struct CallPolicy {
    /// Maximum attempts for format-level retries at parsing call sites.
    pub max_attempts: usize,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl CallPolicy {
    /// Issues one provider call with the context-length fallback rule.
    ///
    /// On a context-length error the identical prompt is retried exactly
    /// once against `fallback` (when present); the fallback's outcome is
    /// final for that condition. All other errors are returned as-is.
    pub async fn generate(
        &self,
        primary: &dyn TextProvider,
        fallback: Option<&dyn TextProvider>,
        prompt: &str,
    ) -> Result<String> {
        let model = primary.profile().model;
        match primary.generate(&model, prompt).await {
            Ok(text) => Ok(text),
            Err(err) if classify(&err) == ErrorClass::ContextLength => {
                let Some(secondary) = fallback else {
                    debug!("Context window exceeded and no fallback provider configured");
                    return Err(err);
                };
                let profile = secondary.profile();
                warn!(
                    family = %profile.family,
                    model = %profile.model,
                    "Context window exceeded; retrying once against fallback provider"
                );
                secondary.generate(&profile.model, prompt).await
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::RecapError;
    use crate::provider::test_utils::ScriptedProvider;

    #[tokio::test]
    async fn success_needs_no_fallback() {
        let primary = ScriptedProvider::new(vec![Ok("hello".to_string())]);
        let fallback = ScriptedProvider::new(vec![]);
        let policy = CallPolicy::default();

        let text = policy
            .generate(&primary, Some(&fallback), "prompt")
            .await
            .unwrap();
        assert_eq!(text, "hello");
        assert_eq!(fallback.request_count(), 0);
    }

    #[tokio::test]
    async fn context_length_triggers_exactly_one_fallback_call() {
        let primary = ScriptedProvider::new(vec![Err(anyhow::Error::new(
            RecapError::ContextLength("context_length_exceeded".to_string()),
        ))]);
        let fallback = ScriptedProvider::new(vec![Ok("from fallback".to_string())]);
        let policy = CallPolicy::default();

        let text = policy
            .generate(&primary, Some(&fallback), "the prompt")
            .await
            .unwrap();
        assert_eq!(text, "from fallback");
        assert_eq!(primary.request_count(), 1);
        assert_eq!(fallback.request_count(), 1);
        // Identical prompt forwarded to the secondary provider.
        assert_eq!(fallback.prompts(), vec!["the prompt".to_string()]);
    }

    #[tokio::test]
    async fn transport_error_propagates_without_fallback_call() {
        let primary = ScriptedProvider::new(vec![Err(anyhow::Error::new(
            RecapError::ProviderTransport("connection reset".to_string()),
        ))]);
        let fallback = ScriptedProvider::new(vec![Ok("unused".to_string())]);
        let policy = CallPolicy::default();

        let result = policy.generate(&primary, Some(&fallback), "prompt").await;
        assert!(result.is_err());
        assert_eq!(fallback.request_count(), 0);
    }

    #[tokio::test]
    async fn context_length_without_fallback_returns_error() {
        let primary = ScriptedProvider::new(vec![Err(anyhow::Error::new(
            RecapError::ContextLength("too big".to_string()),
        ))]);
        let policy = CallPolicy::default();

        let result = policy.generate(&primary, None, "prompt").await;
        assert!(result.is_err());
    }
}
