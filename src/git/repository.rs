//! git2-backed implementation of the version-control collaborator.

use anyhow::{Context, Result};
use git2::{Diff, DiffFormat, DiffOptions, Repository, Sort};

use crate::git::{CommitRecord, VersionControl};

/// Git repository wrapper.
pub struct GitRepository {
    repo: Repository,
}

impl GitRepository {
    /// Open repository at current directory.
    pub fn open() -> Result<Self> {
        let repo = Repository::open(".").context("Not in a git repository")?;
        Ok(Self { repo })
    }

    /// Open repository at specified path.
    pub fn open_at<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let repo = Repository::open(path).context("Failed to open git repository")?;
        Ok(Self { repo })
    }

    /// Get current branch name.
    pub fn current_branch(&self) -> Result<String> {
        let head = self.repo.head().context("Failed to get HEAD reference")?;

        if let Some(name) = head.shorthand() {
            if name != "HEAD" {
                return Ok(name.to_string());
            }
        }

        anyhow::bail!("Repository is in detached HEAD state")
    }

    fn commit_for(&self, revspec: &str) -> Result<git2::Commit<'_>> {
        let obj = self
            .repo
            .revparse_single(revspec)
            .with_context(|| format!("Failed to resolve '{revspec}'"))?;
        obj.peel_to_commit()
            .with_context(|| format!("'{revspec}' does not point to a commit"))
    }

    /// Paths changed by a commit relative to its first parent (the whole
    /// tree for a root commit), in diff order.
    fn changed_paths(&self, commit: &git2::Commit<'_>) -> Result<Vec<String>> {
        let commit_tree = commit.tree().context("Failed to get commit tree")?;
        let parent_tree = if commit.parent_count() > 0 {
            Some(
                commit
                    .parent(0)
                    .context("Failed to get parent commit")?
                    .tree()
                    .context("Failed to get parent tree")?,
            )
        } else {
            None
        };

        let diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&commit_tree), None)
            .context("Failed to create diff")?;

        let mut files = Vec::new();
        diff.foreach(
            &mut |delta, _progress| {
                if let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) {
                    if let Some(path_str) = path.to_str() {
                        files.push(path_str.to_string());
                    }
                }
                true
            },
            None,
            None,
            None,
        )
        .context("Failed to enumerate changed files")?;

        Ok(files)
    }
}

/// Renders a git2 diff as unified patch text.
fn render_patch(diff: &Diff<'_>) -> Result<String> {
    let mut text = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        let content = std::str::from_utf8(line.content()).unwrap_or("<binary>");
        match line.origin() {
            '+' | '-' | ' ' => {
                text.push(line.origin());
                text.push_str(content);
            }
            // Headers and hunk lines already carry their own markers.
            _ => text.push_str(content),
        }
        true
    })
    .context("Failed to format diff")?;
    Ok(text)
}

impl VersionControl for GitRepository {
    fn head(&self, branch: &str) -> Result<String> {
        Ok(self.commit_for(branch)?.id().to_string())
    }

    fn resolve(&self, revspec: &str) -> Option<String> {
        self.commit_for(revspec).map(|c| c.id().to_string()).ok()
    }

    fn remotes(&self) -> Result<Vec<String>> {
        let remotes = self.repo.remotes().context("Failed to list remotes")?;
        Ok(remotes.iter().flatten().map(ToString::to_string).collect())
    }

    fn default_branch(&self, remote: &str) -> Result<String> {
        // refs/remotes/<remote>/HEAD is a symbolic ref to the default branch
        // when it has been fetched; fall back to probing common names.
        let head_ref = format!("refs/remotes/{remote}/HEAD");
        if let Ok(reference) = self.repo.find_reference(&head_ref) {
            if let Some(target) = reference.symbolic_target() {
                let prefix = format!("refs/remotes/{remote}/");
                if let Some(branch) = target.strip_prefix(&prefix) {
                    return Ok(branch.to_string());
                }
            }
        }

        for candidate in ["main", "master"] {
            if self.resolve(&format!("{remote}/{candidate}")).is_some() {
                return Ok(candidate.to_string());
            }
        }

        anyhow::bail!("Could not determine default branch for remote '{remote}'")
    }

    fn log(&self, from: Option<&str>, to: &str) -> Result<Vec<CommitRecord>> {
        let to_commit = self.commit_for(to)?;

        let mut walker = self.repo.revwalk().context("Failed to create revwalk")?;
        walker.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        walker
            .push(to_commit.id())
            .context("Failed to push range end")?;
        if let Some(from) = from {
            let from_commit = self.commit_for(from)?;
            walker
                .hide(from_commit.id())
                .context("Failed to hide range start")?;
        }

        let mut records = Vec::new();
        for oid in walker {
            let oid = oid.context("Failed to get commit OID from walker")?;
            let commit = self
                .repo
                .find_commit(oid)
                .context("Failed to find commit")?;

            // Skip merge commits
            if commit.parent_count() > 1 {
                continue;
            }

            records.push(CommitRecord {
                hash: commit.id().to_string(),
                message: commit.message().unwrap_or("").trim_end().to_string(),
                files: self.changed_paths(&commit)?,
            });
        }

        Ok(records)
    }

    fn diff(&self, from: Option<&str>, to: &str, paths: &[String]) -> Result<String> {
        let to_tree = self.commit_for(to)?.tree().context("Failed to get tree")?;
        let from_tree = match from {
            Some(from) => Some(self.commit_for(from)?.tree().context("Failed to get tree")?),
            None => None,
        };

        let mut opts = DiffOptions::new();
        for path in paths {
            opts.pathspec(path);
        }

        let diff = self
            .repo
            .diff_tree_to_tree(from_tree.as_ref(), Some(&to_tree), Some(&mut opts))
            .context("Failed to create diff")?;

        render_patch(&diff)
    }

    fn reflog(&self, refname: &str) -> Result<String> {
        let reflog = self
            .repo
            .reflog(refname)
            .with_context(|| format!("Failed to read reflog for '{refname}'"))?;

        // Both ids are rendered so consumers can recover the pre-update
        // commit even from the oldest entry.
        let mut text = String::new();
        for (i, entry) in reflog.iter().enumerate() {
            let message = entry.message().unwrap_or("");
            text.push_str(&format!(
                "{} {} {refname}@{{{i}}}: {message}\n",
                entry.id_new(),
                entry.id_old()
            ));
        }
        Ok(text)
    }

    fn oldest_commit(&self, revspec: &str) -> Result<Option<String>> {
        let Ok(commit) = self.commit_for(revspec) else {
            return Ok(None);
        };

        let mut walker = self.repo.revwalk().context("Failed to create revwalk")?;
        walker.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        walker
            .push(commit.id())
            .context("Failed to push revwalk start")?;

        match walker.next() {
            Some(oid) => Ok(Some(oid.context("Failed to walk history")?.to_string())),
            None => Ok(None),
        }
    }
}
