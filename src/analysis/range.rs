//! Commit-range resolution per branch.
//!
//! The analyzed range runs from the last point at which the local branch
//! was synchronized with its remote counterpart (found in the
//! remote-tracking ref's reflog) up to the current local head. When no
//! sync point exists, a fallback chain picks a reasonable starting point
//! instead of aborting.

use anyhow::{Context, Result};
use tracing::debug;

use crate::analysis::ChangeRange;
use crate::git::VersionControl;

/// Size of the fixed trailing window used as the last fallback tier.
const FALLBACK_WINDOW: usize = 5;

/// Resolves the (from, to) boundary for one branch.
pub struct RangeResolver<'a> {
    vcs: &'a dyn VersionControl,
    remote: String,
}

impl<'a> RangeResolver<'a> {
    /// Creates a resolver using the given remote for sync-point lookups.
    pub fn new(vcs: &'a dyn VersionControl, remote: impl Into<String>) -> Self {
        Self {
            vcs,
            remote: remote.into(),
        }
    }

    /// Resolves the range for a branch.
    ///
    /// `to` is the current local head. `from` is the most recent sync
    /// point from the remote-tracking reflog, or the first fallback tier
    /// that resolves: the oldest commit reachable from the remote branch,
    /// the immediate parent of the remote tip, then a fixed trailing
    /// window on the local branch. `from` is `None` only when every tier
    /// fails, which the pipeline treats as a baseline-establishing run.
    pub fn resolve(&self, branch: &str) -> Result<ChangeRange> {
        let to = self
            .vcs
            .head(branch)
            .with_context(|| format!("Failed to resolve head of branch '{branch}'"))?;

        let remote_ref = format!("{}/{branch}", self.remote);
        let from = self
            .sync_point(&remote_ref)
            .or_else(|| self.vcs.oldest_commit(&remote_ref).ok().flatten())
            .or_else(|| self.vcs.resolve(&format!("{remote_ref}~1")))
            .or_else(|| self.vcs.resolve(&format!("{branch}~{FALLBACK_WINDOW}")));

        if from.is_none() {
            debug!(branch, "No sync point or fallback resolved; baseline run");
        }

        Ok(ChangeRange {
            branch: branch.to_string(),
            from,
            to,
        })
    }

    /// Finds the most recent sync point in the remote-tracking reflog.
    ///
    /// A reflog read failure degrades silently to the fallback chain; it
    /// never aborts the run.
    fn sync_point(&self, remote_ref: &str) -> Option<String> {
        let refname = format!("refs/remotes/{remote_ref}");
        let text = match self.vcs.reflog(&refname) {
            Ok(text) => text,
            Err(err) => {
                debug!(refname, "Could not read reflog: {err:#}");
                return None;
            }
        };
        parse_sync_point(&text)
    }
}

/// Scans raw reflog text (newest entry first) for the latest pull or
/// fetch-merge event and returns the commit the ref pointed at
/// immediately before it.
///
/// The entry's own second token is that pre-update commit when the
/// renderer carries both ids; lines without one fall back to the hash
/// on the following (older) line.
pub(crate) fn parse_sync_point(reflog: &str) -> Option<String> {
    let lines: Vec<&str> = reflog.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        let message = line.splitn(2, ": ").nth(1).unwrap_or("");
        let lower = message.to_lowercase();
        if !(lower.contains("pull") || lower.contains("fetch")) {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let _new_id = tokens.next();
        if let Some(old_id) = tokens.next().filter(|t| is_commit_id(t)) {
            return Some(old_id.to_string());
        }
        return lines
            .get(i + 1)
            .and_then(|older| older.split_whitespace().next())
            .map(ToString::to_string);
    }
    None
}

/// Whether a reflog token is a usable commit id. The all-zero id marks
/// ref creation and is not a commit.
fn is_commit_id(token: &str) -> bool {
    token.len() >= 7
        && token.chars().all(|c| c.is_ascii_hexdigit())
        && !token.chars().all(|c| c == '0')
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::git::testing::StaticVcs;

    fn reflog_with_pull() -> String {
        "ccc3333 bbb2222 refs/remotes/origin/main@{0}: pull: fast-forward\n\
         bbb2222 aaa1111 refs/remotes/origin/main@{1}: update by push\n\
         aaa1111 0000000 refs/remotes/origin/main@{2}: fetch origin: storing head\n"
            .to_string()
    }

    #[test]
    fn sync_point_is_the_pull_entry_old_id() {
        assert_eq!(
            parse_sync_point(&reflog_with_pull()),
            Some("bbb2222".to_string())
        );
    }

    #[test]
    fn sync_point_none_without_pull_or_fetch() {
        let text = "ccc3333 bbb2222 refs/remotes/origin/main@{0}: update by push\n\
                    bbb2222 aaa1111 refs/remotes/origin/main@{1}: update by push\n";
        assert_eq!(parse_sync_point(text), None);
    }

    #[test]
    fn oldest_entry_pull_still_yields_its_old_id() {
        // No following line to fall back to; the entry's own old id
        // carries the pre-pull commit.
        let text = "bbb2222 aaa1111 refs/remotes/origin/main@{0}: pull: fast-forward\n";
        assert_eq!(parse_sync_point(text), Some("aaa1111".to_string()));
    }

    #[test]
    fn legacy_single_id_lines_fall_back_to_the_next_entry() {
        let text = "ccc3333 refs/remotes/origin/main@{0}: pull: fast-forward\n\
                    bbb2222 refs/remotes/origin/main@{1}: update by push\n";
        assert_eq!(parse_sync_point(text), Some("bbb2222".to_string()));

        let oldest_only = "aaa1111 refs/remotes/origin/main@{0}: pull: fast-forward\n";
        assert_eq!(parse_sync_point(oldest_only), None);
    }

    #[test]
    fn ref_creation_zero_id_is_not_a_sync_point() {
        let text =
            "aaa1111 0000000000000000000000000000000000000000 refs/remotes/origin/main@{0}: \
             fetch origin: storing head\n";
        assert_eq!(parse_sync_point(text), None);
    }

    #[test]
    fn sync_point_none_for_empty_reflog() {
        assert_eq!(parse_sync_point(""), None);
    }

    #[test]
    fn resolve_uses_reflog_sync_point() {
        let mut vcs = StaticVcs::default();
        vcs.heads.insert("main".to_string(), "headsha".to_string());
        vcs.reflogs
            .insert("refs/remotes/origin/main".to_string(), reflog_with_pull());

        let resolver = RangeResolver::new(&vcs, "origin");
        let range = resolver.resolve("main").unwrap();
        assert_eq!(range.to, "headsha");
        assert_eq!(range.from, Some("bbb2222".to_string()));
    }

    #[test]
    fn resolve_falls_back_to_oldest_remote_commit() {
        let mut vcs = StaticVcs::default();
        vcs.heads.insert("main".to_string(), "headsha".to_string());
        // No reflog at all: read error degrades silently.
        vcs.oldest
            .insert("origin/main".to_string(), "rootsha".to_string());

        let resolver = RangeResolver::new(&vcs, "origin");
        let range = resolver.resolve("main").unwrap();
        assert_eq!(range.from, Some("rootsha".to_string()));
    }

    #[test]
    fn resolve_falls_back_to_remote_parent_then_window() {
        let mut vcs = StaticVcs::default();
        vcs.heads.insert("main".to_string(), "headsha".to_string());
        vcs.resolves
            .insert("origin/main~1".to_string(), "parentsha".to_string());

        let resolver = RangeResolver::new(&vcs, "origin");
        assert_eq!(
            resolver.resolve("main").unwrap().from,
            Some("parentsha".to_string())
        );

        let mut vcs = StaticVcs::default();
        vcs.heads.insert("main".to_string(), "headsha".to_string());
        vcs.resolves
            .insert("main~5".to_string(), "windowsha".to_string());

        let resolver = RangeResolver::new(&vcs, "origin");
        assert_eq!(
            resolver.resolve("main").unwrap().from,
            Some("windowsha".to_string())
        );
    }

    #[test]
    fn resolve_baseline_when_every_tier_fails() {
        let mut vcs = StaticVcs::default();
        vcs.heads.insert("main".to_string(), "headsha".to_string());

        let resolver = RangeResolver::new(&vcs, "origin");
        let range = resolver.resolve("main").unwrap();
        assert_eq!(range.from, None);
        assert_eq!(range.to, "headsha");
    }
}
