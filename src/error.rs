//! Crate-wide error taxonomy.
//!
//! Each variant maps to one propagation rule: configuration errors abort
//! the whole run, transport errors abort the current branch only, and the
//! remaining kinds are recovered inside the pipeline.

use thiserror::Error;

/// Errors raised by the analysis pipeline and its collaborators.
#[derive(Error, Debug)]
pub enum RecapError {
    /// Missing remote, credential, or other unusable configuration.
    /// Fatal: aborts the entire run before any partial work is produced.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed or incomplete structured output from a provider.
    /// Recovered via bounded retry; the call site degrades on exhaustion.
    #[error("Provider returned malformed output: {0}")]
    ProviderFormat(String),

    /// Network or provider failure other than a context-length condition.
    /// Aborts the current branch only; other branches continue.
    #[error("Provider request failed: {0}")]
    ProviderTransport(String),

    /// The provider reported that the input exceeded its context window.
    /// Recovered via provider fallback or map-reduce chunking; never
    /// surfaced to the caller.
    #[error("Provider context window exceeded: {0}")]
    ContextLength(String),

    /// A ref, commit, or diff could not be read from the repository.
    /// Recovered by skipping the affected diff or file with a warning.
    #[error("Failed to read from the repository: {0}")]
    VersionControlRead(String),
}

/// Coarse classification used by the retry-with-fallback policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Input too large for the active provider.
    ContextLength,
    /// Structured output could not be parsed or validated.
    Format,
    /// Everything else (network, auth, HTTP status).
    Transport,
}

/// Message substrings that identify a context-length condition when a
/// provider does not surface a structured error code.
const CONTEXT_LENGTH_MARKERS: &[&str] = &[
    "context_length_exceeded",
    "maximum context length",
    "prompt is too long",
    "too many tokens",
];

/// Returns true when an error body or message reads like a token-limit
/// rejection.
pub(crate) fn is_context_length_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    CONTEXT_LENGTH_MARKERS.iter().any(|m| lower.contains(m))
}

/// Classifies an error for retry/fallback decisions.
///
/// Typed [`RecapError`] values are matched directly; untyped errors fall
/// back to scanning the message for known token-limit phrasing.
pub fn classify(err: &anyhow::Error) -> ErrorClass {
    if let Some(recap) = err.downcast_ref::<RecapError>() {
        return match recap {
            RecapError::ContextLength(_) => ErrorClass::ContextLength,
            RecapError::ProviderFormat(_) => ErrorClass::Format,
            _ => ErrorClass::Transport,
        };
    }

    if is_context_length_message(&format!("{err:#}")) {
        ErrorClass::ContextLength
    } else {
        ErrorClass::Transport
    }
}

// Note: anyhow already has a blanket impl for thiserror::Error types

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn classify_typed_context_length() {
        let err = anyhow::Error::new(RecapError::ContextLength("too big".to_string()));
        assert_eq!(classify(&err), ErrorClass::ContextLength);
    }

    #[test]
    fn classify_typed_format() {
        let err = anyhow::Error::new(RecapError::ProviderFormat("bad json".to_string()));
        assert_eq!(classify(&err), ErrorClass::Format);
    }

    #[test]
    fn classify_typed_transport() {
        let err = anyhow::Error::new(RecapError::ProviderTransport("timeout".to_string()));
        assert_eq!(classify(&err), ErrorClass::Transport);
    }

    #[test]
    fn classify_untyped_by_message() {
        let err = anyhow::anyhow!("HTTP 400: {{\"code\": \"context_length_exceeded\"}}");
        assert_eq!(classify(&err), ErrorClass::ContextLength);

        let err = anyhow::anyhow!("This model's maximum context length is 16385 tokens");
        assert_eq!(classify(&err), ErrorClass::ContextLength);
    }

    #[test]
    fn classify_untyped_default_is_transport() {
        let err = anyhow::anyhow!("connection reset by peer");
        assert_eq!(classify(&err), ErrorClass::Transport);
    }
}
