//! Hunk-aligned splitting of oversized diff text.
//!
//! A chunk accumulates whole hunks while the running estimated length
//! stays at or below the budget. Hunks are never split internally: a
//! single hunk whose own estimate exceeds the budget is emitted alone
//! and allowed to exceed it. The estimate is character-based and
//! deliberately approximate — do not assert exact token counts against
//! it.

use crate::provider::budget::estimate_tokens_from_char_count;

/// Marker that begins a per-file section in unified diff output.
const FILE_DIFF_MARKER: &str = "diff --git ";

/// Marker that begins a hunk within a file diff.
const HUNK_MARKER: &str = "@@ ";

/// Splits a unified diff into chunks of at most `max_tokens` estimated
/// tokens, cutting only at hunk-header and file-header boundaries.
///
/// The returned chunks are materialized and concatenate back, in order,
/// to the original input. An empty input yields no chunks.
#[must_use]
pub fn split_diff(diff: &str, max_tokens: usize) -> Vec<String> {
    if diff.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for segment in split_at_boundaries(diff) {
        let combined = current.len() + segment.len();
        if !current.is_empty() && estimate_tokens_from_char_count(combined) > max_tokens {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(segment);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Slices the diff into contiguous segments starting at each file or
/// hunk header (at line boundaries). The first segment may be leading
/// text before any marker.
fn split_at_boundaries(diff: &str) -> Vec<&str> {
    let mut positions = vec![0];

    // Position 0 is always a boundary, so only newline-anchored marker
    // occurrences need finding.
    for marker in [FILE_DIFF_MARKER, HUNK_MARKER] {
        let search = format!("\n{marker}");
        let mut start = 0;
        while let Some(pos) = diff[start..].find(&search) {
            // +1 to skip the newline; the segment starts at the marker.
            positions.push(start + pos + 1);
            start += pos + 1;
        }
    }

    positions.sort_unstable();
    positions.dedup();

    positions
        .iter()
        .enumerate()
        .map(|(i, &pos)| {
            let end = positions.get(i + 1).copied().unwrap_or(diff.len());
            &diff[pos..end]
        })
        .filter(|s| !s.is_empty())
        .collect()
}
