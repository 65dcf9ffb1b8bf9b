//! Command-line interface for git-recap.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::analysis::{AnalysisReport, Analyzer, Session};
use crate::config::{ConfigManager, Settings};
use crate::git::GitRepository;
use crate::provider::{self, TextProvider};
use crate::store::ReportStore;

/// git-recap: narrative reports of what changed on your branches.
#[derive(Parser)]
#[command(name = "git-recap")]
#[command(about = "Summarize recent branch activity into narrative reports", long_about = None)]
#[command(version)]
pub struct Cli {
    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Analyze changes since the last sync point and store a report.
    Analyze {
        /// Branch to analyze; defaults to the current branch.
        #[arg(long)]
        branch: Option<String>,
        /// Re-analyze even if the range is already covered by a report.
        #[arg(long)]
        force: bool,
    },
    /// Inspect stored reports.
    Reports {
        /// The report operation to run.
        #[command(subcommand)]
        command: ReportsCommand,
    },
    /// Show the active configuration and store contents.
    Status,
}

/// Report-store subcommands.
#[derive(Subcommand)]
pub enum ReportsCommand {
    /// List stored report ids.
    List,
    /// Print one report as JSON.
    Show {
        /// Report id, as shown by `reports list`.
        id: String,
    },
}

impl Cli {
    /// Executes the parsed command.
    pub async fn execute(self) -> Result<()> {
        let settings = ConfigManager::new()?.load()?;

        match self.command {
            Command::Analyze { branch, force } => analyze(&settings, branch, force).await,
            Command::Reports { command } => match command {
                ReportsCommand::List => list_reports(&settings),
                ReportsCommand::Show { id } => show_report(&settings, &id),
            },
            Command::Status => status(&settings),
        }
    }
}

async fn analyze(settings: &Settings, branch: Option<String>, force: bool) -> Result<()> {
    let repo = GitRepository::open()?;
    let branch = match branch {
        Some(branch) => branch,
        None => repo.current_branch()?,
    };

    let primary = provider::create(
        &settings.primary_provider,
        settings.primary_model.clone(),
    )?;
    let fallback = fallback_provider(settings);

    let store = ReportStore::new(settings.reports_dir()?);
    let session = Session::with_marker(settings.session_marker_path()?);
    let analyzer = Analyzer::new(
        &repo,
        primary.as_ref(),
        fallback.as_deref(),
        &store,
        &session,
        settings.heuristics_path()?,
        settings.remote.clone(),
    );

    match analyzer.run(&[branch], force).await? {
        Some(report) => print_report(&report),
        None => println!("Nothing new to report."),
    }
    Ok(())
}

/// Builds the optional context-length fallback provider.
///
/// A fallback that cannot be constructed (typically a missing
/// credential) is a warning, not an error: the run proceeds without it.
fn fallback_provider(settings: &Settings) -> Option<Box<dyn TextProvider>> {
    let family = settings.fallback_provider.as_deref()?;
    match provider::create(family, settings.fallback_model.clone()) {
        Ok(provider) => Some(provider),
        Err(err) => {
            warn!("Fallback provider unavailable; continuing without it: {err:#}");
            None
        }
    }
}

fn print_report(report: &AnalysisReport) {
    println!("Report {} ({})", report.id, report.created_at.to_rfc3339());
    for branch in &report.branches {
        println!("\n== {} ==", branch.branch);
        println!("{}", branch.high_level_summary);
        for summary in &branch.file_summaries {
            println!("  {}: {}", summary.file, summary.summary);
        }
        if !branch.noisy_files.is_empty() {
            println!("  (excluded as noise: {})", branch.noisy_files.join(", "));
        }
    }
}

fn list_reports(settings: &Settings) -> Result<()> {
    if Session::with_marker(settings.session_marker_path()?).is_analyzing() {
        println!("(an analysis is in progress; a new report may appear shortly)");
    }
    let store = ReportStore::new(settings.reports_dir()?);
    let ids = store.list()?;
    if ids.is_empty() {
        println!("No reports stored.");
        return Ok(());
    }
    for id in ids {
        match store.load(&id) {
            Ok(report) => println!(
                "{id}  {}  {} branch(es)",
                report.created_at.to_rfc3339(),
                report.branches.len()
            ),
            Err(err) => {
                warn!(id, "Unreadable report: {err:#}");
                println!("{id}  <unreadable>");
            }
        }
    }
    Ok(())
}

fn show_report(settings: &Settings, id: &str) -> Result<()> {
    let store = ReportStore::new(settings.reports_dir()?);
    let report = store.load(id)?;
    let json = serde_json::to_string_pretty(&report).context("Failed to encode report")?;
    println!("{json}");
    Ok(())
}

fn status(settings: &Settings) -> Result<()> {
    let manager = ConfigManager::new()?;
    println!("git-recap {}", crate::VERSION);
    println!("Settings file:   {}", manager.path().display());
    let session = Session::with_marker(settings.session_marker_path()?);
    println!(
        "Analysis:        {}",
        if session.is_analyzing() {
            "in progress"
        } else {
            "idle"
        }
    );
    println!("Remote:          {}", settings.remote);
    println!(
        "Provider:        {}{}",
        settings.primary_provider,
        settings
            .primary_model
            .as_deref()
            .map(|m| format!(" ({m})"))
            .unwrap_or_default()
    );
    match settings.fallback_provider.as_deref() {
        Some(family) => println!("Fallback:        {family}"),
        None => println!("Fallback:        none"),
    }

    let reports_dir = settings.reports_dir()?;
    let store = ReportStore::new(&reports_dir);
    println!("Reports dir:     {}", reports_dir.display());
    println!("Stored reports:  {}", store.list()?.len());

    let heuristics_path = settings.heuristics_path()?;
    println!(
        "Heuristics:      {} ({})",
        heuristics_path.display(),
        if heuristics_path.exists() {
            "learned"
        } else {
            "not yet learned"
        }
    );
    Ok(())
}
