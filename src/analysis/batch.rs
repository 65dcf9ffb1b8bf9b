//! Smart batching of primary files for summarization.
//!
//! Batches maximize relatedness: learned file groups first, then commit
//! co-membership, then a catch-all. The output always partitions the
//! primary-file set — every primary file lands in exactly one batch.

use std::collections::HashSet;

use crate::git::CommitRecord;

/// Partitions `primary_files` into ordered batches.
///
/// Passes, in order:
/// 1. Each learned group (in stored order) intersected with the files
///    still unassigned; intersections of 2 or more become a batch.
///    Smaller intersections are not worth batching together and fall
///    through to the next pass.
/// 2. Each commit (in log order) contributes its still-unassigned files
///    as one batch.
/// 3. Anything left (files outside any commit in range) becomes one
///    final catch-all batch.
#[must_use]
pub fn plan_batches(
    primary_files: &[String],
    file_groups: &[Vec<String>],
    commits: &[CommitRecord],
) -> Vec<Vec<String>> {
    let mut unassigned: HashSet<&str> = primary_files.iter().map(String::as_str).collect();
    let mut batches = Vec::new();

    // Pass 1: learned groups.
    for group in file_groups {
        let members: Vec<String> = group
            .iter()
            .filter(|f| unassigned.contains(f.as_str()))
            .cloned()
            .collect();
        if members.len() >= 2 {
            for member in &members {
                unassigned.remove(member.as_str());
            }
            batches.push(members);
        }
    }

    // Pass 2: commit co-membership.
    for commit in commits {
        let mut members = Vec::new();
        for file in &commit.files {
            if unassigned.remove(file.as_str()) {
                members.push(file.clone());
            }
        }
        if !members.is_empty() {
            batches.push(members);
        }
    }

    // Pass 3: catch-all for files outside any commit in range.
    if !unassigned.is_empty() {
        let leftover: Vec<String> = primary_files
            .iter()
            .filter(|f| unassigned.contains(f.as_str()))
            .cloned()
            .collect();
        batches.push(leftover);
    }

    batches
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    fn commit(hash: &str, files: &[&str]) -> CommitRecord {
        CommitRecord {
            hash: hash.to_string(),
            message: format!("commit {hash}"),
            files: paths(files),
        }
    }

    /// Asserts the partition guarantee: disjoint batches whose union is
    /// exactly the primary-file set.
    fn assert_partitions(batches: &[Vec<String>], primary: &[String]) {
        let mut seen = HashSet::new();
        for batch in batches {
            assert!(!batch.is_empty(), "no empty batches");
            for file in batch {
                assert!(seen.insert(file.clone()), "file {file} appears twice");
            }
        }
        let expected: HashSet<String> = primary.iter().cloned().collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn learned_groups_take_priority() {
        let primary = paths(&["a.rs", "b.rs", "c.rs", "d.rs"]);
        let groups = vec![paths(&["a.rs", "c.rs"])];
        let commits = vec![commit("c1", &["a.rs", "b.rs", "c.rs", "d.rs"])];

        let batches = plan_batches(&primary, &groups, &commits);
        assert_eq!(batches[0], paths(&["a.rs", "c.rs"]));
        assert_eq!(batches[1], paths(&["b.rs", "d.rs"]));
        assert_partitions(&batches, &primary);
    }

    #[test]
    fn group_with_single_remaining_member_is_not_emitted() {
        let primary = paths(&["a.rs", "b.rs", "c.rs"]);
        // b.rs was never primary, so only one member of this group remains.
        let groups = vec![paths(&["a.rs", "z.rs"])];
        let commits = vec![commit("c1", &["a.rs", "b.rs", "c.rs"])];

        let batches = plan_batches(&primary, &groups, &commits);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], paths(&["a.rs", "b.rs", "c.rs"]));
    }

    #[test]
    fn group_members_outside_primary_are_ignored() {
        let primary = paths(&["a.rs"]);
        let groups = vec![paths(&["a.rs", "not-changed.rs"])];
        let commits = vec![commit("c1", &["a.rs"])];

        let batches = plan_batches(&primary, &groups, &commits);
        assert_partitions(&batches, &primary);
        assert_eq!(batches, vec![paths(&["a.rs"])]);
    }

    #[test]
    fn fifteen_files_one_commit_is_one_batch() {
        let names: Vec<String> = (0..15).map(|i| format!("file{i}.rs")).collect();
        let commits = vec![CommitRecord {
            hash: "c1".to_string(),
            message: "big commit".to_string(),
            files: names.clone(),
        }];

        let batches = plan_batches(&names, &[], &commits);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 15);
        assert_partitions(&batches, &names);
    }

    #[test]
    fn commits_in_log_order_drive_batching_without_groups() {
        let primary = paths(&["a.rs", "b.rs", "c.rs"]);
        let commits = vec![
            commit("newest", &["a.rs", "b.rs"]),
            commit("older", &["b.rs", "c.rs"]),
        ];

        let batches = plan_batches(&primary, &[], &commits);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0], paths(&["a.rs", "b.rs"]));
        assert_eq!(batches[1], paths(&["c.rs"]));
        assert_partitions(&batches, &primary);
    }

    #[test]
    fn files_outside_any_commit_get_a_catch_all_batch() {
        let primary = paths(&["a.rs", "orphan1.rs", "orphan2.rs"]);
        let commits = vec![commit("c1", &["a.rs"])];

        let batches = plan_batches(&primary, &[], &commits);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1], paths(&["orphan1.rs", "orphan2.rs"]));
        assert_partitions(&batches, &primary);
    }

    #[test]
    fn empty_primary_set_yields_no_batches() {
        let batches = plan_batches(&[], &[paths(&["a.rs", "b.rs"])], &[commit("c1", &["a.rs"])]);
        assert!(batches.is_empty());
    }

    #[test]
    fn partition_holds_across_overlapping_groups_and_commits() {
        let primary = paths(&["a.rs", "b.rs", "c.rs", "d.rs", "e.rs", "f.rs"]);
        let groups = vec![
            paths(&["a.rs", "b.rs", "c.rs"]),
            // Overlaps the first group; only d remains, so not emitted.
            paths(&["c.rs", "d.rs"]),
        ];
        let commits = vec![
            commit("c1", &["d.rs", "e.rs"]),
            commit("c2", &["e.rs", "f.rs"]),
        ];

        let batches = plan_batches(&primary, &groups, &commits);
        assert_partitions(&batches, &primary);
    }
}
