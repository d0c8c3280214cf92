//! Optional git metadata attached to the document.

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset};
use git2::{BranchType, Repository, Sort};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

const SHORT_HASH_LEN: usize = 7;

/// One commit in the history block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    /// Abbreviated hash
    pub hash: String,
    /// Author name
    pub author: String,
    /// Commit time, RFC 3339 in the author's offset
    pub date: String,
    /// First line of the message
    pub message: String,
}

/// Commit count for one author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributorRecord {
    /// Author name
    pub name: String,
    /// Commits authored
    pub commits: usize,
}

/// Repository history as attached to a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryBlock {
    /// Most recent commits, newest first
    pub commits: Vec<CommitRecord>,
    /// Local branch names, sorted
    pub branches: Vec<String>,
    /// Authors by commit count, descending
    pub contributors: Vec<ContributorRecord>,
    /// Totals over the whole walked history
    pub summary: Option<HistorySummary>,
}

/// Repository-wide figures, independent of the commit limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistorySummary {
    /// Branch `HEAD` points at; `None` when detached
    pub current_branch: Option<String>,
    /// Commits reachable from `HEAD`
    pub total_commits: usize,
    /// Distinct authors across those commits
    pub total_contributors: usize,
    /// Date of the oldest commit
    pub first_commit_date: Option<String>,
    /// Date of the newest commit
    pub last_commit_date: Option<String>,
}

/// Supplies history for a repository root.
pub trait HistorySource {
    /// Collects history with at most `limit` commits.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not inside a repository or the
    /// history cannot be read.
    fn collect(&self, root: &Path, limit: usize) -> Result<HistoryBlock>;
}

/// [`HistorySource`] backed by libgit2.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitHistory;

impl HistorySource for GitHistory {
    fn collect(&self, root: &Path, limit: usize) -> Result<HistoryBlock> {
        let repo = Repository::discover(root).map_err(|e| {
            debug!("No repository found from {}: {}", root.display(), e);
            Error::history(format!("not a git repository: {}", root.display()))
        })?;

        let mut walk = repo.revwalk()?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        walk.push_head()?;

        let mut commits = Vec::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut total_commits = 0;
        let mut newest = None;
        let mut oldest = None;

        for oid in walk {
            let commit = repo.find_commit(oid?)?;
            let author = commit.author();
            let name = author.name().unwrap_or("Unknown").to_string();

            total_commits += 1;
            let time = commit.time();
            if newest.is_none() {
                newest = Some(time);
            }
            oldest = Some(time);

            if commits.len() < limit {
                let hash = commit.id().to_string();
                commits.push(CommitRecord {
                    hash: hash[..SHORT_HASH_LEN.min(hash.len())].to_string(),
                    author: name.clone(),
                    date: format_time(time),
                    message: commit.summary().unwrap_or_default().to_string(),
                });
            }

            *counts.entry(name).or_default() += 1;
        }

        let mut branches = Vec::new();
        for branch in repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                branches.push(name.to_string());
            }
        }
        branches.sort();

        let current_branch = repo
            .head()
            .ok()
            .filter(|head| head.is_branch())
            .and_then(|head| head.shorthand().map(str::to_string));

        let summary = HistorySummary {
            current_branch,
            total_commits,
            total_contributors: counts.len(),
            first_commit_date: oldest.map(format_time),
            last_commit_date: newest.map(format_time),
        };

        let mut contributors: Vec<ContributorRecord> = counts
            .into_iter()
            .map(|(name, commits)| ContributorRecord { name, commits })
            .collect();
        contributors.sort_by(|a, b| b.commits.cmp(&a.commits).then_with(|| a.name.cmp(&b.name)));

        debug!(
            "Collected {} commits, {} branches, {} contributors",
            commits.len(),
            branches.len(),
            contributors.len()
        );

        Ok(HistoryBlock {
            commits,
            branches,
            contributors,
            summary: Some(summary),
        })
    }
}

fn format_time(time: git2::Time) -> String {
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60)
        .or_else(|| FixedOffset::east_opt(0));

    match (DateTime::from_timestamp(time.seconds(), 0), offset) {
        (Some(utc), Some(offset)) => utc.with_timezone(&offset).to_rfc3339(),
        _ => time.seconds().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use git2::{Signature, Time};

    fn commit(repo: &Repository, file: &str, author: &str, seconds: i64, message: &str) {
        let workdir = repo.workdir().unwrap().to_path_buf();
        std::fs::write(workdir.join(file), message).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(file)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

        let signature =
            Signature::new(author, &format!("{author}@example.com"), &Time::new(seconds, 120))
                .unwrap();
        let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();

        repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .unwrap();
    }

    #[test]
    fn test_collects_commits_newest_first() {
        let temp = assert_fs::TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        commit(&repo, "a.txt", "alice", 1_700_000_000, "Initial commit");
        commit(&repo, "b.txt", "bob", 1_700_000_100, "Add b\n\nLonger body");
        commit(&repo, "c.txt", "alice", 1_700_000_200, "Add c");

        let history = GitHistory.collect(temp.path(), 2).unwrap();

        let messages: Vec<_> = history.commits.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["Add c", "Add b"]);
        assert_eq!(history.commits[0].hash.len(), 7);
        assert_eq!(history.commits[0].author, "alice");
        assert_eq!(history.commits[0].date, "2023-11-15T00:16:40+02:00");
    }

    #[test]
    fn test_contributors_count_whole_history() {
        let temp = assert_fs::TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        commit(&repo, "a.txt", "bob", 1_700_000_000, "one");
        commit(&repo, "b.txt", "alice", 1_700_000_100, "two");
        commit(&repo, "c.txt", "alice", 1_700_000_200, "three");
        commit(&repo, "d.txt", "carol", 1_700_000_300, "four");

        let history = GitHistory.collect(temp.path(), 1).unwrap();

        let contributors: Vec<_> = history
            .contributors
            .iter()
            .map(|c| (c.name.as_str(), c.commits))
            .collect();
        assert_eq!(contributors, vec![("alice", 2), ("bob", 1), ("carol", 1)]);
    }

    #[test]
    fn test_summary_covers_whole_history() {
        let temp = assert_fs::TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        commit(&repo, "a.txt", "bob", 1_700_000_000, "one");
        commit(&repo, "b.txt", "alice", 1_700_000_100, "two");
        commit(&repo, "c.txt", "alice", 1_700_000_200, "three");

        let history = GitHistory.collect(temp.path(), 1).unwrap();
        let summary = history.summary.unwrap();

        let head = repo.head().unwrap();
        assert_eq!(summary.current_branch.as_deref(), head.shorthand());
        assert_eq!(summary.total_commits, 3);
        assert_eq!(summary.total_contributors, 2);
        assert_eq!(
            summary.first_commit_date.as_deref(),
            Some("2023-11-15T00:13:20+02:00")
        );
        assert_eq!(
            summary.last_commit_date.as_deref(),
            Some("2023-11-15T00:16:40+02:00")
        );
        assert_eq!(history.commits.len(), 1);
    }

    #[test]
    fn test_detached_head_has_no_current_branch() {
        let temp = assert_fs::TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        commit(&repo, "a.txt", "alice", 1_700_000_000, "init");

        let oid = repo.head().unwrap().target().unwrap();
        repo.set_head_detached(oid).unwrap();

        let summary = GitHistory.collect(temp.path(), 5).unwrap().summary.unwrap();
        assert_eq!(summary.current_branch, None);
        assert_eq!(summary.total_commits, 1);
    }

    #[test]
    fn test_branches_sorted() {
        let temp = assert_fs::TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        commit(&repo, "a.txt", "alice", 1_700_000_000, "init");

        let head = repo.head().unwrap().peel_to_commit().unwrap();
        repo.branch("zeta", &head, false).unwrap();
        repo.branch("alpha", &head, false).unwrap();

        let history = GitHistory.collect(temp.path(), 5).unwrap();
        let mut expected = history.branches.clone();
        expected.sort();

        assert_eq!(history.branches, expected);
        assert_eq!(history.branches.len(), 3);
        assert!(history.branches.contains(&"alpha".to_string()));
    }

    #[test]
    fn test_discovers_from_subdirectory() {
        let temp = assert_fs::TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        commit(&repo, "a.txt", "alice", 1_700_000_000, "init");
        temp.child("pkg").create_dir_all().unwrap();

        let history = GitHistory.collect(&temp.path().join("pkg"), 5).unwrap();
        assert_eq!(history.commits.len(), 1);
    }

    #[test]
    fn test_not_a_repository() {
        let temp = assert_fs::TempDir::new().unwrap();
        // discovery may still find an enclosing repository, so only check
        // the error shape when there is none
        if Repository::discover(temp.path()).is_err() {
            let err = GitHistory.collect(temp.path(), 5).unwrap_err();
            assert!(matches!(err, Error::History { .. }));
        }
    }
}
