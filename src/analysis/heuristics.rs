//! Provider-learned grouping and ignore heuristics.
//!
//! Heuristics are process-external state: loaded at the start of a run,
//! merged with provider-proposed updates, and written back at the end of
//! the heuristics step. A malformed provider reply must never corrupt
//! them — on any failure the previous heuristics pass through unchanged.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::git::CommitRecord;
use crate::prompts;
use crate::provider::response::parse_structured;
use crate::provider::retry::CallPolicy;
use crate::provider::TextProvider;

/// Persisted heuristics document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Heuristics {
    /// Substring patterns marking low-signal paths.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    /// Groups of paths that tend to change together, in learned order.
    #[serde(default)]
    pub file_groups: Vec<Vec<String>>,
}

impl Heuristics {
    /// Loads heuristics from a JSON file; a missing file is an empty
    /// document, not an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read heuristics from {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Malformed heuristics document at {}", path.display()))
    }

    /// Writes heuristics back as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self).context("Failed to encode heuristics")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write heuristics to {}", path.display()))
    }

    /// Additively merges provider-proposed heuristics into this document.
    ///
    /// Union semantics: proposals can add patterns and groups but never
    /// remove previously learned ones. Group members are deduplicated
    /// before the size check so a repeated path cannot inflate a group,
    /// and duplicate groups are compared as sets, so member order does
    /// not matter.
    #[must_use]
    pub fn merged(&self, proposal: ProposedHeuristics) -> Self {
        let mut result = self.clone();

        for pattern in proposal.ignore_patterns {
            let pattern = pattern.trim().to_string();
            if !pattern.is_empty() && !result.ignore_patterns.contains(&pattern) {
                result.ignore_patterns.push(pattern);
            }
        }

        for group in proposal.file_groups {
            let mut members: Vec<String> = Vec::new();
            for member in group {
                let member = member.trim().to_string();
                if !member.is_empty() && !members.contains(&member) {
                    members.push(member);
                }
            }
            if members.len() < 2 {
                continue;
            }
            let mut candidate = members.clone();
            candidate.sort();
            let duplicate = result.file_groups.iter().any(|existing| {
                let mut existing = existing.clone();
                existing.sort();
                existing == candidate
            });
            if !duplicate {
                result.file_groups.push(members);
            }
        }

        result
    }
}

/// Provider reply shape for a heuristics update.
///
/// Both fields are required; a reply missing either is rejected and
/// retried.
#[derive(Debug, Deserialize)]
pub struct ProposedHeuristics {
    /// Proposed additional ignore patterns.
    pub ignore_patterns: Vec<String>,
    /// Proposed additional file groups.
    pub file_groups: Vec<Vec<String>>,
}

/// Learns heuristics updates from new commits via the provider.
#[derive(Default)]
pub struct HeuristicsEngine {
    policy: CallPolicy,
}

impl HeuristicsEngine {
    /// Creates an engine with the default retry policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Produces updated heuristics from the commits since the last
    /// analysis.
    ///
    /// Fail-safe by construction: the pipeline must never fail solely
    /// because heuristics could not be updated, so parse failures are
    /// retried up to the policy limit and every other outcome returns
    /// the previous heuristics unchanged. When there are no new commits
    /// the provider is not called at all.
    pub async fn refresh(
        &self,
        provider: &dyn TextProvider,
        fallback: Option<&dyn TextProvider>,
        previous: &Heuristics,
        commits: &[CommitRecord],
    ) -> Heuristics {
        if commits.is_empty() {
            debug!("No new commits; skipping heuristics update");
            return previous.clone();
        }

        let prompt = prompts::heuristics_prompt(previous, commits);

        for attempt in 1..=self.policy.max_attempts {
            let text = match self.policy.generate(provider, fallback, &prompt).await {
                Ok(text) => text,
                Err(err) => {
                    warn!("Heuristics provider call failed; keeping previous heuristics: {err:#}");
                    return previous.clone();
                }
            };

            match parse_structured::<ProposedHeuristics>(&text) {
                Ok(proposal) => return previous.merged(proposal),
                Err(err) => {
                    warn!(attempt, "Unparsable heuristics reply: {err}");
                }
            }
        }

        warn!(
            attempts = self.policy.max_attempts,
            "Heuristics update exhausted retries; keeping previous heuristics"
        );
        previous.clone()
    }
}
