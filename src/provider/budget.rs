//! Approximate length estimation for provider requests.
//!
//! Everything here is a character-based heuristic, not an exact token
//! count. Callers (and tests) must treat estimates as inexact: they are
//! good enough to decide when to chunk, and the orchestrator's provider
//! fallback covers the cases where the estimate is wrong.

/// Approximate characters per token.
///
/// Modern tokenizers average roughly 3.5 characters per token for English
/// text with code mixed in.
const CHARS_PER_TOKEN: f64 = 3.5;

/// Safety margin multiplier applied to estimates.
///
/// Adds 10% overhead to account for tokenizer variance (special tokens,
/// whitespace handling, non-ASCII characters).
const SAFETY_MARGIN: f64 = 1.10;

/// Estimates the token count for a text string.
///
/// Intentionally conservative: overestimating is safer than
/// underestimating, because an underestimate means a rejected request.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    estimate_tokens_from_char_count(text.len())
}

/// Same heuristic as [`estimate_tokens`] for a pre-computed length.
#[must_use]
pub fn estimate_tokens_from_char_count(char_count: usize) -> usize {
    let raw = char_count as f64 / CHARS_PER_TOKEN;
    (raw * SAFETY_MARGIN).ceil() as usize
}
