//! Prompt templates for the summarization provider.

use crate::analysis::Heuristics;
use crate::git::CommitRecord;

/// Separator placed between chunk summaries before the reduce call.
pub const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

/// Instructions shared by every structured request: bare JSON only.
const JSON_ONLY: &str = "CRITICAL RESPONSE FORMAT: Respond with ONLY the JSON object. \
Do not include explanatory text, markdown code blocks, or commentary. \
Your entire response must be parseable JSON.";

/// Builds the heuristics-update prompt.
///
/// Asks the provider to extend the learned ignore patterns and file
/// groupings based on the commits since the last analysis. The required
/// reply shape is `{"ignore_patterns": [...], "file_groups": [[...]]}`.
#[must_use]
pub fn heuristics_prompt(previous: &Heuristics, commits: &[CommitRecord]) -> String {
    let mut commit_lines = String::new();
    for commit in commits {
        let subject = commit.message.lines().next().unwrap_or("");
        commit_lines.push_str(&format!(
            "- {}: {}\n  files: {}\n",
            &commit.hash[..commit.hash.len().min(8)],
            subject,
            commit.files.join(", ")
        ));
    }

    let previous_json =
        serde_json::to_string(previous).unwrap_or_else(|_| "{\"ignore_patterns\": [], \"file_groups\": []}".to_string());

    format!(
        "You are maintaining heuristics for a git change-summarization tool.\n\
         \n\
         Current heuristics:\n{previous_json}\n\
         \n\
         New commits since the last analysis:\n{commit_lines}\n\
         Suggest additional ignore patterns for low-signal files (generated \
         files, lockfiles, build output) and additional groups of files that \
         tend to change together and should be summarized in one batch.\n\
         \n\
         Respond with a JSON object of this exact shape:\n\
         {{\"ignore_patterns\": [\"pattern\"], \"file_groups\": [[\"path\", \"path\"]]}}\n\
         \n\
         {JSON_ONLY}"
    )
}

/// Builds the structured per-batch summarization prompt.
///
/// The required reply shape is
/// `{"highLevelSummary": "...", "fileSummaries": [{"file": "...", "summary": "..."}]}`.
#[must_use]
pub fn batch_prompt(files: &[String], diff: &str) -> String {
    format!(
        "You are summarizing a set of related changes from a git repository.\n\
         \n\
         Files in this batch:\n{}\n\
         \n\
         Unified diff:\n{diff}\n\
         \n\
         Describe what actually changed, based on the added and removed \
         lines, not on file names alone. Write one short summary per file \
         and one high-level summary for the whole batch.\n\
         \n\
         Respond with a JSON object of this exact shape:\n\
         {{\"highLevelSummary\": \"...\", \"fileSummaries\": [{{\"file\": \"path\", \"summary\": \"...\"}}]}}\n\
         \n\
         {JSON_ONLY}",
        files
            .iter()
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

/// Builds the map-phase prompt for one diff chunk.
#[must_use]
pub fn chunk_prompt(chunk: &str) -> String {
    format!(
        "Summarize the following fragment of a unified diff in a few \
         sentences. Focus on what the added and removed lines actually do. \
         This is one fragment of a larger change; do not speculate about \
         parts you cannot see.\n\
         \n\
         {chunk}"
    )
}

/// Builds the reduce-phase prompt that synthesizes chunk summaries back
/// into one structured batch result.
#[must_use]
pub fn chunk_reduce_prompt(files: &[String], joined_summaries: &str) -> String {
    format!(
        "The following are independent summaries of fragments of one large \
         change set, separated by `---`:\n\
         \n\
         {joined_summaries}\n\
         \n\
         Files covered by the change set:\n{}\n\
         \n\
         Synthesize them into a single coherent narrative. Write one short \
         summary per file and one high-level summary for the whole set.\n\
         \n\
         Respond with a JSON object of this exact shape:\n\
         {{\"highLevelSummary\": \"...\", \"fileSummaries\": [{{\"file\": \"path\", \"summary\": \"...\"}}]}}\n\
         \n\
         {JSON_ONLY}",
        files
            .iter()
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

/// Builds the final per-branch reduce prompt from collected
/// (file, summary) pairs.
#[must_use]
pub fn branch_reduce_prompt(branch: &str, pairs: &[(String, String)]) -> String {
    let listing = pairs
        .iter()
        .map(|(file, summary)| format!("- {file}: {summary}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "The following per-file summaries describe all meaningful changes \
         on branch '{branch}' since it was last synchronized:\n\
         \n\
         {listing}\n\
         \n\
         Write a single narrative paragraph describing what was accomplished \
         on this branch overall. Respond with the paragraph only, as plain \
         text."
    )
}
