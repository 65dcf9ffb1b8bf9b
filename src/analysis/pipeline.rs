//! End-to-end analysis pipeline.
//!
//! One run resolves a range per branch, classifies the changed files,
//! refreshes heuristics, plans batches, summarizes them sequentially,
//! and persists a report. Branches are independent: a failure on one is
//! logged and the run continues with the rest.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Context, Result};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::analysis::batch::plan_batches;
use crate::analysis::extract::extract;
use crate::analysis::heuristics::HeuristicsEngine;
use crate::analysis::orchestrator::Summarizer;
use crate::analysis::range::RangeResolver;
use crate::analysis::{AnalysisReport, BranchAnalysis, FileSummary, Heuristics};
use crate::error::RecapError;
use crate::git::VersionControl;
use crate::provider::TextProvider;
use crate::store::ReportStore;

/// Tracks whether an analysis is currently in progress.
///
/// A second concurrent run is refused rather than queued. With a marker
/// path configured, progress is also visible to other processes: the
/// marker file exists exactly while a run holds the session, so
/// read-only commands can report an active run without joining it.
#[derive(Default)]
pub struct Session {
    analyzing: AtomicBool,
    marker: Option<PathBuf>,
}

impl Session {
    /// Creates an idle, process-local session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session that mirrors its state to a marker file.
    #[must_use]
    pub fn with_marker(path: impl Into<PathBuf>) -> Self {
        Self {
            analyzing: AtomicBool::new(false),
            marker: Some(path.into()),
        }
    }

    /// Whether an analysis run holds the session right now, in this
    /// process or (via the marker file) in another one.
    #[must_use]
    pub fn is_analyzing(&self) -> bool {
        self.analyzing.load(Ordering::SeqCst)
            || self.marker.as_deref().is_some_and(Path::exists)
    }

    /// Claims the session for one run; fails if a run is in progress.
    fn begin(&self) -> Result<SessionGuard<'_>> {
        if self
            .analyzing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            bail!("An analysis is already in progress");
        }

        if let Some(marker) = &self.marker {
            if let Err(err) = self.place_marker(marker) {
                self.analyzing.store(false, Ordering::SeqCst);
                return Err(err);
            }
        }

        Ok(SessionGuard { session: self })
    }

    fn place_marker(&self, marker: &Path) -> Result<()> {
        if marker.exists() {
            bail!(
                "An analysis is already in progress (marker {} exists)",
                marker.display()
            );
        }
        if let Some(parent) = marker.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(marker, std::process::id().to_string())
            .with_context(|| format!("Failed to write session marker {}", marker.display()))
    }
}

/// Releases the session when the run ends, on any exit path.
struct SessionGuard<'a> {
    session: &'a Session,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if let Some(marker) = &self.session.marker {
            if let Err(err) = std::fs::remove_file(marker) {
                warn!("Could not remove session marker {}: {err}", marker.display());
            }
        }
        self.session.analyzing.store(false, Ordering::SeqCst);
    }
}

/// Runs the analysis pipeline over a set of branches.
pub struct Analyzer<'a> {
    vcs: &'a dyn VersionControl,
    primary: &'a dyn TextProvider,
    fallback: Option<&'a dyn TextProvider>,
    store: &'a ReportStore,
    session: &'a Session,
    heuristics_path: PathBuf,
    remote: String,
}

impl<'a> Analyzer<'a> {
    /// Wires an analyzer over its collaborators.
    pub fn new(
        vcs: &'a dyn VersionControl,
        primary: &'a dyn TextProvider,
        fallback: Option<&'a dyn TextProvider>,
        store: &'a ReportStore,
        session: &'a Session,
        heuristics_path: PathBuf,
        remote: impl Into<String>,
    ) -> Self {
        Self {
            vcs,
            primary,
            fallback,
            store,
            session,
            heuristics_path,
            remote: remote.into(),
        }
    }

    /// Analyzes the given branches and persists one report.
    ///
    /// Returns `Ok(None)` when every branch was skipped (baseline runs,
    /// no new commits, or already-covered ranges) and nothing was
    /// written. A missing remote is a configuration error and fatal; a
    /// failure on one branch skips that branch only.
    pub async fn run(&self, branches: &[String], force: bool) -> Result<Option<AnalysisReport>> {
        let _guard = self.session.begin()?;

        let remotes = self.vcs.remotes()?;
        if !remotes.iter().any(|r| r == &self.remote) {
            return Err(RecapError::Configuration(format!(
                "Remote '{}' is not configured for this repository",
                self.remote
            ))
            .into());
        }

        let mut heuristics = Heuristics::load(&self.heuristics_path).unwrap_or_else(|err| {
            warn!("Could not load heuristics; starting empty: {err:#}");
            Heuristics::default()
        });

        let mut analyses = Vec::new();
        for branch in branches {
            match self.analyze_branch(branch, &mut heuristics, force).await {
                Ok(Some(analysis)) => analyses.push(analysis),
                Ok(None) => {}
                Err(err) => {
                    warn!(branch, "Skipping branch after error: {err:#}");
                }
            }
        }

        if analyses.is_empty() {
            info!("No branch produced new analysis; nothing to persist");
            return Ok(None);
        }

        let report = AnalysisReport::new(analyses);
        self.store.save(&report)?;
        info!(id = %report.id, branches = report.branches.len(), "Report persisted");
        Ok(Some(report))
    }

    /// Runs the pipeline for one branch.
    ///
    /// `Ok(None)` means the branch was skipped without producing output.
    async fn analyze_branch(
        &self,
        branch: &str,
        heuristics: &mut Heuristics,
        force: bool,
    ) -> Result<Option<BranchAnalysis>> {
        let resolver = RangeResolver::new(self.vcs, self.remote.clone());
        let range = resolver.resolve(branch)?;

        let Some(from) = range.from.clone() else {
            info!(branch, to = %range.to, "Baseline established; nothing to analyze yet");
            return Ok(None);
        };

        let changes = extract(self.vcs, &range, heuristics)?;
        if changes.commits.is_empty() {
            debug!(branch, "No commits in range; skipping");
            return Ok(None);
        }
        info!(
            branch,
            commits = changes.commits.len(),
            primary = changes.primary_files.len(),
            noisy = changes.noisy_files.len(),
            "Change set extracted"
        );

        let refreshed = HeuristicsEngine::new()
            .refresh(self.primary, self.fallback, heuristics, &changes.commits)
            .await;
        if refreshed != *heuristics {
            if let Err(err) = refreshed.save(&self.heuristics_path) {
                warn!("Could not persist updated heuristics: {err:#}");
            }
            *heuristics = refreshed;
        }

        if !force && self.store.exists(branch, Some(from.as_str()), &range.to) {
            info!(branch, "Range already covered by a stored report; skipping");
            return Ok(None);
        }

        let batches = plan_batches(&changes.primary_files, &heuristics.file_groups, &changes.commits);
        let summarizer = Summarizer::new(self.primary, self.fallback);

        let mut summaries: Vec<FileSummary> = Vec::new();
        for batch in &batches {
            let diff = match self.vcs.diff(Some(from.as_str()), &range.to, batch) {
                Ok(diff) => diff,
                Err(err) => {
                    warn!(branch, files = batch.len(), "Could not read batch diff; skipping batch: {err:#}");
                    continue;
                }
            };
            summaries.extend(summarizer.summarize_batch(batch, &diff).await?);
        }

        self.attach_diffs(&from, &range.to, &mut summaries).await;

        let narrative = summarizer.reduce_branch(branch, &summaries).await;

        Ok(Some(BranchAnalysis {
            branch: branch.to_string(),
            high_level_summary: narrative,
            file_summaries: summaries,
            noisy_files: changes.noisy_files,
            from: Some(from),
            to: range.to,
        }))
    }

    /// Attaches each file's scoped diff to its summary, from local
    /// change data. A read failure leaves that diff absent.
    async fn attach_diffs(&self, from: &str, to: &str, summaries: &mut [FileSummary]) {
        let attach = summaries.iter_mut().map(|summary| async move {
            let paths = std::slice::from_ref(&summary.file);
            match self.vcs.diff(Some(from), to, paths) {
                Ok(diff) if !diff.is_empty() => summary.diff = Some(diff),
                Ok(_) => {}
                Err(err) => {
                    warn!(file = %summary.file, "Could not read per-file diff: {err:#}");
                }
            }
        });
        join_all(attach).await;
    }
}
