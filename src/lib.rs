//! # git-recap
//!
//! Turns a range of git history into a structured, provider-generated
//! narrative report, working around the fixed context windows of
//! text-generation providers.
//!
//! The analysis pipeline resolves which commit range to look at, separates
//! meaningful changes from noise, learns file-grouping heuristics from
//! commit history, partitions oversized change sets into provider-sized
//! batches and chunks, and drives a map-reduce style summarization with
//! retries and provider fallback. Completed analyses are persisted and
//! deduplicated so the same range is never summarized twice.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod prompts;
pub mod provider;
pub mod store;

pub use crate::cli::Cli;
pub use crate::error::RecapError;

/// The current version of git-recap.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
