//! Persistence of analysis reports.
//!
//! Reports are immutable once written: one pretty-printed JSON file per
//! report, named by the report id. Deduplication scans stored reports
//! for an exact (branch, from, to) triple.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::analysis::AnalysisReport;

/// File-backed report store.
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    /// Creates a store rooted at `dir`. The directory is created lazily
    /// on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory reports are stored in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes a report as `report-<id>.json`.
    pub fn save(&self, report: &AnalysisReport) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.report_path(&report.id);
        let text =
            serde_json::to_string_pretty(report).context("Failed to encode analysis report")?;
        std::fs::write(&path, text)
            .with_context(|| format!("Failed to write report to {}", path.display()))
    }

    /// Whether any stored report already covers this exact
    /// (branch, from, to) triple.
    ///
    /// Unreadable or malformed report files are skipped, not errors.
    #[must_use]
    pub fn exists(&self, branch: &str, from: Option<&str>, to: &str) -> bool {
        for id in self.list().unwrap_or_default() {
            let report = match self.load(&id) {
                Ok(report) => report,
                Err(err) => {
                    debug!(id, "Skipping unreadable report: {err:#}");
                    continue;
                }
            };
            let covered = report.branches.iter().any(|b| {
                b.branch == branch && b.from.as_deref() == from && b.to == to
            });
            if covered {
                return true;
            }
        }
        false
    }

    /// Lists stored report ids, oldest first.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read {}", self.dir.display()))?;
        for entry in entries {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = name
                .strip_prefix("report-")
                .and_then(|rest| rest.strip_suffix(".json"))
            {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Loads one report by id.
    pub fn load(&self, id: &str) -> Result<AnalysisReport> {
        let path = self.report_path(id);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read report {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Malformed report at {}", path.display()))
    }

    fn report_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("report-{id}.json"))
    }
}
