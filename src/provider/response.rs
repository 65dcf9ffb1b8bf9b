//! Structured response parsing.
//!
//! Providers are asked for bare JSON but frequently wrap it in markdown
//! code fences anyway. This module strips the fences and decodes the
//! payload, with its own error type so parse failures are distinguishable
//! from the provider call that produced the text.

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors produced while decoding a structured provider response.
///
/// Shape validation (missing or mistyped fields) is handled by serde
/// itself, so decode failures of both kinds surface here.
#[derive(Error, Debug)]
pub enum ResponseParseError {
    /// The response was not valid JSON after fence stripping.
    #[error("Response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Strips a leading/trailing markdown code fence from provider output.
///
/// Handles ```` ```json ```` and bare ```` ``` ```` fences; anything
/// between the first fence line and the closing fence is returned
/// verbatim. Unfenced input is returned trimmed.
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the language tag on the opening fence line, if any.
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => return trimmed,
    };

    match body.rfind("```") {
        Some(pos) => body[..pos].trim(),
        None => body.trim(),
    }
}

/// Parses a structured JSON payload out of raw provider text.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, ResponseParseError> {
    Ok(serde_json::from_str(strip_code_fences(text))?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Reply {
        answer: String,
    }

    #[test]
    fn bare_json_parses() {
        let reply: Reply = parse_structured(r#"{"answer": "ok"}"#).unwrap();
        assert_eq!(reply.answer, "ok");
    }

    #[test]
    fn json_fence_is_stripped() {
        let text = "```json\n{\"answer\": \"ok\"}\n```";
        let reply: Reply = parse_structured(text).unwrap();
        assert_eq!(reply.answer, "ok");
    }

    #[test]
    fn anonymous_fence_is_stripped() {
        let text = "```\n{\"answer\": \"ok\"}\n```";
        let reply: Reply = parse_structured(text).unwrap();
        assert_eq!(reply.answer, "ok");
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let text = "\n\n  ```json\n{\"answer\": \"ok\"}\n```  \n";
        let reply: Reply = parse_structured(text).unwrap();
        assert_eq!(reply.answer, "ok");
    }

    #[test]
    fn prose_fails_with_parse_error() {
        let result: Result<Reply, _> = parse_structured("Sure! Here is the summary you asked for.");
        assert!(matches!(result, Err(ResponseParseError::InvalidJson(_))));
    }

    #[test]
    fn missing_field_fails() {
        let result: Result<Reply, _> = parse_structured(r#"{"other": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn unterminated_fence_still_parses() {
        let text = "```json\n{\"answer\": \"ok\"}";
        let reply: Reply = parse_structured(text).unwrap();
        assert_eq!(reply.answer, "ok");
    }
}
