//! Read-only version-control access.
//!
//! The analysis core talks to the repository exclusively through the
//! [`VersionControl`] trait; [`GitRepository`] is the git2-backed
//! implementation. The core issues no writes.

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod repository;

pub use repository::GitRepository;

/// One commit in the range under analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Full SHA-1 hash of the commit.
    pub hash: String,
    /// The commit message as written by the author.
    pub message: String,
    /// Paths changed by this commit, in diff order.
    pub files: Vec<String>,
}

/// Read-only operations the pipeline needs from a repository.
///
/// Implementations must not mutate the repository. Commit logs are
/// returned most-recent-first, matching what the resolver and batch
/// planner expect.
pub trait VersionControl: Send {
    /// Resolves a branch name to the commit id of its current local head.
    fn head(&self, branch: &str) -> Result<String>;

    /// Resolves an arbitrary revspec (e.g. `origin/main~1`) to a commit id,
    /// or `None` if it does not name a commit.
    fn resolve(&self, revspec: &str) -> Option<String>;

    /// Lists configured remote names.
    fn remotes(&self) -> Result<Vec<String>>;

    /// Looks up the default branch advertised by a remote.
    fn default_branch(&self, remote: &str) -> Result<String>;

    /// Commit log from `to` back to (but excluding) `from`,
    /// most-recent-first, with per-commit file-change lists.
    /// Merge commits are skipped.
    fn log(&self, from: Option<&str>, to: &str) -> Result<Vec<CommitRecord>>;

    /// Unified diff text between two refs, optionally scoped to a path
    /// set. An empty `paths` slice means the whole tree.
    fn diff(&self, from: Option<&str>, to: &str, paths: &[String]) -> Result<String>;

    /// Raw reflog text for a ref, newest entry first, one entry per
    /// line. Each line starts with the entry's new commit id, followed
    /// by the id the ref pointed at before the update.
    fn reflog(&self, refname: &str) -> Result<String>;

    /// The oldest commit reachable from a revspec, or `None` if the
    /// revspec does not resolve.
    fn oldest_commit(&self, revspec: &str) -> Result<Option<String>>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory collaborator for unit tests.

    use std::collections::{HashMap, HashSet};

    use anyhow::Result;

    use crate::error::RecapError;

    use super::{CommitRecord, VersionControl};

    /// Static, table-driven [`VersionControl`] implementation.
    ///
    /// A diff request fails when every requested path is listed in
    /// `fail_paths`, so tests can make one batch or one per-file
    /// attachment unreadable while the rest of the repository stays
    /// healthy.
    #[derive(Default)]
    pub(crate) struct StaticVcs {
        pub heads: HashMap<String, String>,
        pub resolves: HashMap<String, String>,
        pub remotes: Vec<String>,
        pub log_entries: Vec<CommitRecord>,
        pub diff_text: String,
        pub fail_paths: HashSet<String>,
        pub reflogs: HashMap<String, String>,
        pub oldest: HashMap<String, String>,
    }

    impl VersionControl for StaticVcs {
        fn head(&self, branch: &str) -> Result<String> {
            self.heads
                .get(branch)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("unknown branch '{branch}'"))
        }

        fn resolve(&self, revspec: &str) -> Option<String> {
            self.resolves.get(revspec).cloned()
        }

        fn remotes(&self) -> Result<Vec<String>> {
            Ok(self.remotes.clone())
        }

        fn default_branch(&self, _remote: &str) -> Result<String> {
            Ok("main".to_string())
        }

        fn log(&self, _from: Option<&str>, _to: &str) -> Result<Vec<CommitRecord>> {
            Ok(self.log_entries.clone())
        }

        fn diff(&self, _from: Option<&str>, _to: &str, paths: &[String]) -> Result<String> {
            if !paths.is_empty() && paths.iter().all(|p| self.fail_paths.contains(p)) {
                return Err(RecapError::VersionControlRead(format!(
                    "cannot read diff for {}",
                    paths.join(", ")
                ))
                .into());
            }
            Ok(self.diff_text.clone())
        }

        fn reflog(&self, refname: &str) -> Result<String> {
            self.reflogs
                .get(refname)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no reflog for '{refname}'"))
        }

        fn oldest_commit(&self, revspec: &str) -> Result<Option<String>> {
            Ok(self.oldest.get(revspec).cloned())
        }
    }
}
