//! Change-set extraction and noisy-file classification.

use std::collections::HashSet;

use anyhow::{Context, Result};

use crate::analysis::{ChangeRange, Heuristics};
use crate::git::{CommitRecord, VersionControl};

/// Base low-signal patterns, always treated as noise.
///
/// Matching is deliberately substring-based, not glob-based: a pattern
/// matches anywhere in the path, including partial segments. This broad
/// matching is policy, not a bug; keep it unless requirements change.
pub const BASE_NOISY_PATTERNS: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "poetry.lock",
    "Gemfile.lock",
    "composer.lock",
];

/// Commits in range plus the classified union of their changed paths.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    /// Commit records, most-recent-first.
    pub commits: Vec<CommitRecord>,
    /// Paths worth summarizing, in first-seen order.
    pub primary_files: Vec<String>,
    /// Paths excluded as noise, in first-seen order.
    pub noisy_files: Vec<String>,
}

/// Lists the commits in a range and classifies their changed paths.
pub fn extract(
    vcs: &dyn VersionControl,
    range: &ChangeRange,
    heuristics: &Heuristics,
) -> Result<ChangeSet> {
    let commits = vcs
        .log(range.from.as_deref(), &range.to)
        .with_context(|| format!("Failed to list commits for branch '{}'", range.branch))?;

    let mut seen = HashSet::new();
    let mut paths = Vec::new();
    for commit in &commits {
        for file in &commit.files {
            if seen.insert(file.clone()) {
                paths.push(file.clone());
            }
        }
    }

    let (primary_files, noisy_files) = classify_paths(&paths, heuristics);

    Ok(ChangeSet {
        commits,
        primary_files,
        noisy_files,
    })
}

/// Splits paths into (primary, noisy) against the base patterns plus the
/// learned ignore patterns. Input order is preserved in both outputs.
pub fn classify_paths(paths: &[String], heuristics: &Heuristics) -> (Vec<String>, Vec<String>) {
    let mut primary = Vec::new();
    let mut noisy = Vec::new();

    for path in paths {
        if is_noisy(path, heuristics) {
            noisy.push(path.clone());
        } else {
            primary.push(path.clone());
        }
    }

    (primary, noisy)
}

fn is_noisy(path: &str, heuristics: &Heuristics) -> bool {
    BASE_NOISY_PATTERNS.iter().any(|p| path.contains(p))
        || heuristics
            .ignore_patterns
            .iter()
            .any(|p| !p.is_empty() && path.contains(p))
}
