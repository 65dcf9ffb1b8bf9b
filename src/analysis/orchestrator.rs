//! Summarization orchestration: per-batch provider calls with retry,
//! provider fallback, map-reduce chunking, and the final per-branch
//! reduce.

use std::collections::HashSet;

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::analysis::chunk::split_diff;
use crate::analysis::FileSummary;
use crate::error::{classify, ErrorClass};
use crate::prompts;
use crate::provider::budget::estimate_tokens;
use crate::provider::response::parse_structured;
use crate::provider::retry::CallPolicy;
use crate::provider::TextProvider;

/// Provider reply shape for one batch (and for the chunk reduce).
#[derive(Debug, Deserialize)]
struct BatchReply {
    #[serde(rename = "highLevelSummary")]
    #[allow(dead_code)]
    high_level_summary: String,
    #[serde(rename = "fileSummaries")]
    file_summaries: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    file: String,
    summary: String,
}

/// Drives provider calls for one branch's batches.
pub struct Summarizer<'a> {
    primary: &'a dyn TextProvider,
    fallback: Option<&'a dyn TextProvider>,
    policy: CallPolicy,
}

impl<'a> Summarizer<'a> {
    /// Creates a summarizer over a primary provider and an optional
    /// secondary used for context-length fallback.
    pub fn new(primary: &'a dyn TextProvider, fallback: Option<&'a dyn TextProvider>) -> Self {
        Self {
            primary,
            fallback,
            policy: CallPolicy::default(),
        }
    }

    /// Summarizes one batch, returning its per-file summaries.
    ///
    /// The structured single-call protocol is the primary path; a batch
    /// whose prompt is estimated to exceed the active provider's budget
    /// goes through map-reduce chunking instead. A degraded batch
    /// contributes no summaries; only transport errors propagate.
    pub async fn summarize_batch(
        &self,
        files: &[String],
        diff: &str,
    ) -> Result<Vec<FileSummary>> {
        let prompt = prompts::batch_prompt(files, diff);
        let input_budget = self.primary.profile().input_budget();

        let reply = if estimate_tokens(&prompt) > input_budget {
            self.map_reduce(files, diff, input_budget).await?
        } else {
            self.call_structured(&prompt).await?
        };

        Ok(reply.map_or_else(Vec::new, |r| collect_file_summaries(r, files)))
    }

    /// Map-reduce protocol for an oversized batch: summarize each chunk
    /// independently, then synthesize one structured result from the
    /// joined chunk summaries.
    async fn map_reduce(
        &self,
        files: &[String],
        diff: &str,
        input_budget: usize,
    ) -> Result<Option<BatchReply>> {
        let overhead = estimate_tokens(&prompts::chunk_prompt(""));
        let chunk_budget = input_budget.saturating_sub(overhead).max(1);
        let chunks = split_diff(diff, chunk_budget);
        debug!(
            chunks = chunks.len(),
            "Batch exceeds the provider budget; applying map-reduce"
        );

        let mut chunk_summaries = Vec::new();
        for chunk in &chunks {
            let prompt = prompts::chunk_prompt(chunk);
            match self.policy.generate(self.primary, self.fallback, &prompt).await {
                Ok(text) => chunk_summaries.push(text.trim().to_string()),
                Err(err) if classify(&err) == ErrorClass::ContextLength => {
                    warn!("Chunk still exceeds every provider budget; skipping it: {err:#}");
                }
                Err(err) => return Err(err),
            }
        }

        if chunk_summaries.is_empty() {
            warn!("Every chunk was skipped; batch contributes no summaries");
            return Ok(None);
        }

        let joined = chunk_summaries.join(prompts::CHUNK_SEPARATOR);
        self.call_structured(&prompts::chunk_reduce_prompt(files, &joined))
            .await
    }

    /// Issues a structured call with format-level retries.
    ///
    /// Returns `Ok(None)` when the call degrades (retries exhausted, or
    /// a context-length failure that survived the provider fallback);
    /// transport errors propagate.
    async fn call_structured(&self, prompt: &str) -> Result<Option<BatchReply>> {
        for attempt in 1..=self.policy.max_attempts {
            let text = match self.policy.generate(self.primary, self.fallback, prompt).await {
                Ok(text) => text,
                Err(err) if classify(&err) == ErrorClass::ContextLength => {
                    warn!("Context window exceeded past fallback; degrading: {err:#}");
                    return Ok(None);
                }
                Err(err) => return Err(err),
            };

            match parse_structured::<BatchReply>(&text) {
                Ok(reply) => return Ok(Some(reply)),
                Err(err) => warn!(attempt, "Unparsable batch reply: {err}"),
            }
        }

        warn!(
            attempts = self.policy.max_attempts,
            "Batch call exhausted retries; contributing no summaries"
        );
        Ok(None)
    }

    /// Final reduce: one narrative for the whole branch from every
    /// (file, summary) pair collected so far.
    ///
    /// Never fails — a provider error here yields a degraded static
    /// narrative rather than aborting the branch.
    pub async fn reduce_branch(&self, branch: &str, summaries: &[FileSummary]) -> String {
        if summaries.is_empty() {
            return fallback_narrative(branch, 0);
        }

        let pairs: Vec<(String, String)> = summaries
            .iter()
            .map(|s| (s.file.clone(), s.summary.clone()))
            .collect();
        let prompt = prompts::branch_reduce_prompt(branch, &pairs);

        match self.policy.generate(self.primary, self.fallback, &prompt).await {
            Ok(text) => text.trim().to_string(),
            Err(err) => {
                warn!("Final reduce failed; using static narrative: {err:#}");
                fallback_narrative(branch, summaries.len())
            }
        }
    }
}

/// Keeps reply entries that name files actually in the batch.
fn collect_file_summaries(reply: BatchReply, files: &[String]) -> Vec<FileSummary> {
    let members: HashSet<&str> = files.iter().map(String::as_str).collect();
    reply
        .file_summaries
        .into_iter()
        .filter(|entry| {
            let known = members.contains(entry.file.as_str());
            if !known {
                debug!(file = %entry.file, "Dropping summary for a file outside the batch");
            }
            known
        })
        .map(|entry| FileSummary {
            file: entry.file,
            summary: entry.summary,
            diff: None,
        })
        .collect()
}

/// Static narrative used when the final reduce cannot be produced.
pub(crate) fn fallback_narrative(branch: &str, file_count: usize) -> String {
    format!("Automated narrative unavailable for branch '{branch}'; {file_count} file(s) were summarized individually.")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::RecapError;
    use crate::provider::test_utils::ScriptedProvider;

    fn batch_reply_json(entries: &[(&str, &str)]) -> String {
        let files: Vec<String> = entries
            .iter()
            .map(|(file, summary)| format!("{{\"file\": \"{file}\", \"summary\": \"{summary}\"}}"))
            .collect();
        format!(
            "{{\"highLevelSummary\": \"overall\", \"fileSummaries\": [{}]}}",
            files.join(", ")
        )
    }

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    fn small_diff() -> String {
        "diff --git a/a.rs b/a.rs\n--- a/a.rs\n+++ b/a.rs\n@@ -1,1 +1,2 @@\n+line\n".to_string()
    }

    #[tokio::test]
    async fn structured_protocol_produces_file_summaries() {
        let provider =
            ScriptedProvider::new(vec![Ok(batch_reply_json(&[("a.rs", "added a line")]))]);
        let summarizer = Summarizer::new(&provider, None);

        let summaries = summarizer
            .summarize_batch(&paths(&["a.rs"]), &small_diff())
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].file, "a.rs");
        assert_eq!(summaries[0].summary, "added a line");
        assert!(summaries[0].diff.is_none(), "diff is attached later, locally");
    }

    #[tokio::test]
    async fn entries_outside_the_batch_are_dropped() {
        let provider = ScriptedProvider::new(vec![Ok(batch_reply_json(&[
            ("a.rs", "real"),
            ("hallucinated.rs", "fake"),
        ]))]);
        let summarizer = Summarizer::new(&provider, None);

        let summaries = summarizer
            .summarize_batch(&paths(&["a.rs"]), &small_diff())
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].file, "a.rs");
    }

    #[tokio::test]
    async fn three_format_failures_degrade_the_batch() {
        let provider = ScriptedProvider::new(vec![
            Ok("prose".to_string()),
            Ok("more prose".to_string()),
            Ok("{\"wrong\": true}".to_string()),
        ]);
        let summarizer = Summarizer::new(&provider, None);

        let summaries = summarizer
            .summarize_batch(&paths(&["a.rs"]), &small_diff())
            .await
            .unwrap();
        assert!(summaries.is_empty());
        assert_eq!(provider.request_count(), 3);
    }

    #[tokio::test]
    async fn transport_error_propagates() {
        let provider = ScriptedProvider::new(vec![Err(anyhow::Error::new(
            RecapError::ProviderTransport("boom".to_string()),
        ))]);
        let summarizer = Summarizer::new(&provider, None);

        let result = summarizer
            .summarize_batch(&paths(&["a.rs"]), &small_diff())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn context_length_error_uses_fallback_once() {
        let primary = ScriptedProvider::new(vec![Err(anyhow::Error::new(
            RecapError::ContextLength("context_length_exceeded".to_string()),
        ))]);
        let fallback = ScriptedProvider::new(vec![Ok(batch_reply_json(&[("a.rs", "ok")]))]);
        let summarizer = Summarizer::new(&primary, Some(&fallback));

        let summaries = summarizer
            .summarize_batch(&paths(&["a.rs"]), &small_diff())
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(primary.request_count(), 1);
        assert_eq!(fallback.request_count(), 1);
    }

    #[tokio::test]
    async fn oversized_batch_is_chunked_then_reduced_once() {
        // Budget of 2000 - 1000 = 1000 input tokens; the diff is ~3x that.
        let reply = batch_reply_json(&[("big.rs", "many changes")]);
        let responses: Vec<Result<String>> = (0..20).map(|_| Ok(reply.clone())).collect();
        let provider = ScriptedProvider::new(responses)
            .with_context_tokens(2_000)
            .with_reserved_output_tokens(1_000);
        let summarizer = Summarizer::new(&provider, None);

        let hunk = format!("@@ -1,1 +1,2 @@\n+{}\n", "x".repeat(800));
        let mut diff = "diff --git a/big.rs b/big.rs\n--- a/big.rs\n+++ b/big.rs\n".to_string();
        for _ in 0..13 {
            diff.push_str(&hunk);
        }

        let summaries = summarizer
            .summarize_batch(&paths(&["big.rs"]), &diff)
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);

        let prompts_sent = provider.prompts();
        let map_calls = prompts_sent
            .iter()
            .filter(|p| p.contains("fragment of a larger change"))
            .count();
        let reduce_calls = prompts_sent
            .iter()
            .filter(|p| p.contains("Synthesize them into a single coherent narrative"))
            .count();
        assert!(map_calls >= 2, "expected >=2 chunk calls, got {map_calls}");
        assert_eq!(reduce_calls, 1, "exactly one reduce call");
    }

    #[tokio::test]
    async fn reduce_branch_returns_provider_narrative() {
        let provider = ScriptedProvider::new(vec![Ok("  The branch adds a parser. \n".to_string())]);
        let summarizer = Summarizer::new(&provider, None);

        let narrative = summarizer
            .reduce_branch(
                "feature/parser",
                &[FileSummary {
                    file: "a.rs".to_string(),
                    summary: "added parser".to_string(),
                    diff: None,
                }],
            )
            .await;
        assert_eq!(narrative, "The branch adds a parser.");
    }

    #[tokio::test]
    async fn reduce_branch_degrades_to_static_narrative() {
        let provider = ScriptedProvider::new(vec![Err(anyhow::anyhow!("network down"))]);
        let summarizer = Summarizer::new(&provider, None);

        let narrative = summarizer
            .reduce_branch(
                "main",
                &[FileSummary {
                    file: "a.rs".to_string(),
                    summary: "changed".to_string(),
                    diff: None,
                }],
            )
            .await;
        assert!(narrative.contains("main"));
        assert!(narrative.contains("1 file(s)"));
    }
}
