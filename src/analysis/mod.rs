//! The analysis pipeline: range resolution, change classification,
//! heuristics, batching, chunking, and summarization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod batch;
pub mod chunk;
pub mod extract;
pub mod heuristics;
pub mod orchestrator;
pub mod pipeline;
pub mod range;

pub use heuristics::Heuristics;
pub use pipeline::{Analyzer, Session};

/// The commit span under analysis for one branch.
///
/// Immutable once resolved. `from` is `None` only for a
/// baseline-establishing run with nothing to analyze.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRange {
    /// Branch name.
    pub branch: String,
    /// Start of the range (exclusive), the last sync point.
    pub from: Option<String>,
    /// End of the range, the current local head.
    pub to: String,
}

/// One file's provider-generated summary.
///
/// `diff` is attached afterward from local change data, never from the
/// provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
    /// Path of the summarized file.
    pub file: String,
    /// Provider-generated summary text.
    pub summary: String,
    /// Unified diff for this file within the analyzed range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

/// Output of one branch's pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchAnalysis {
    /// Branch name.
    pub branch: String,
    /// Single narrative for the whole branch.
    #[serde(rename = "highLevelSummary")]
    pub high_level_summary: String,
    /// Per-file summaries collected across all batches.
    #[serde(rename = "summaries")]
    pub file_summaries: Vec<FileSummary>,
    /// Changed paths excluded from summarization as noise.
    #[serde(rename = "noisyChanges")]
    pub noisy_files: Vec<String>,
    /// Start of the analyzed range (exclusive).
    pub from: Option<String>,
    /// End of the analyzed range.
    pub to: String,
}

/// The unit of persistence: one run's branch analyses.
///
/// Immutable once written, identified by its creation timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Report identifier derived from the creation timestamp.
    pub id: String,
    /// Creation time.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// One entry per analyzed branch.
    pub branches: Vec<BranchAnalysis>,
}

impl AnalysisReport {
    /// Creates a report stamped with the current time.
    #[must_use]
    pub fn new(branches: Vec<BranchAnalysis>) -> Self {
        let created_at = Utc::now();
        Self {
            id: created_at.format("%Y%m%dT%H%M%S%3fZ").to_string(),
            created_at,
            branches,
        }
    }
}
