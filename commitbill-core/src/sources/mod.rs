//! Commit sources and the resolver that picks between them.
//!
//! ## Policy
//!
//! Sources are tried in priority order, never merged:
//! 1. Every configured remote repo is queried; results accumulate and a
//!    failing repo only loses its own commits.
//! 2. Only when the remotes produced zero commits, local clones are used:
//!    explicit glob patterns if any, otherwise repos under the search root
//!    whose name contains the fallback key.
//!
//! Failures never escape [`SourceResolver::resolve`]; they are reported as
//! [`FetchOutcome::Failed`] next to the commits.

mod github;
mod local;

pub use github::GitHubClient;
pub use local::{discover_pattern_dirs, is_repo_root, repo_label, search_by_key, GitCli};

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{CommitRecord, CommitWindow, FetchOutcome, Resolution, SourceOrigin};

/// A commit as returned by a remote source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommit {
    pub message: String,
    pub date: DateTime<Utc>,
    pub author: String,
}

/// Remote commit listing (GitHub in production).
#[async_trait]
pub trait RemoteCommitSource: Send + Sync {
    /// Commits in `repo` authored within `window`, optionally by one author
    async fn fetch_commits(
        &self,
        repo: &str,
        window: &CommitWindow,
        author: Option<&str>,
    ) -> Result<Vec<RemoteCommit>>;
}

/// Commit log of a local repository (`git log` in production).
#[async_trait]
pub trait LocalCommitLog: Send + Sync {
    /// Commits in `dir` authored within `window`, labelled with the directory basename
    async fn read_log(
        &self,
        dir: &Path,
        window: &CommitWindow,
        author: Option<&str>,
    ) -> Result<Vec<CommitRecord>>;
}

/// Which sources an invoice draws from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSpec {
    /// Remote repos (`owner/name`)
    pub remote: Vec<String>,
    /// Glob patterns for local clones
    pub local_patterns: Vec<String>,
    /// Only count commits by this author
    pub author: Option<String>,
    /// Name fragment searched under the search root when no patterns are set
    pub fallback_key: Option<String>,
}

/// Resolves a window's commits from remote and local sources.
pub struct SourceResolver {
    remote: Option<Box<dyn RemoteCommitSource>>,
    local: Box<dyn LocalCommitLog>,
    search_root: PathBuf,
}

impl SourceResolver {
    /// `remote` is `None` when no remote client is available; configured
    /// remote repos then fail individually and local fallback applies.
    pub fn new(
        remote: Option<Box<dyn RemoteCommitSource>>,
        local: Box<dyn LocalCommitLog>,
        search_root: PathBuf,
    ) -> Self {
        Self {
            remote,
            local,
            search_root,
        }
    }

    /// Collect commits for `window` following the remote-then-local policy.
    pub async fn resolve(&self, window: &CommitWindow, spec: &SourceSpec) -> Resolution {
        let mut outcomes = Vec::new();
        let author = spec.author.as_deref();

        let mut commits = self
            .fetch_remote(window, &spec.remote, author, &mut outcomes)
            .await;
        if !commits.is_empty() {
            return Resolution {
                commits,
                outcomes,
                origin: SourceOrigin::Remote,
                sources_resolved: spec.remote.len(),
            };
        }

        let dirs = self.local_dirs(spec);
        for dir in &dirs {
            let source = dir.display().to_string();
            match self.local.read_log(dir, window, author).await {
                Ok(found) => {
                    outcomes.push(FetchOutcome::Fetched {
                        source,
                        count: found.len(),
                    });
                    commits.extend(found);
                }
                Err(e) => {
                    tracing::warn!(dir = %source, error = %e, "Local commit log failed; skipping");
                    outcomes.push(FetchOutcome::Failed {
                        source,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let origin = if commits.is_empty() {
            SourceOrigin::None
        } else {
            SourceOrigin::Local
        };

        tracing::debug!(
            start = %window.start,
            end = %window.end,
            commits = commits.len(),
            local_dirs = dirs.len(),
            ?origin,
            "Resolved commit window"
        );

        Resolution {
            commits,
            outcomes,
            origin,
            sources_resolved: spec.remote.len() + dirs.len(),
        }
    }

    async fn fetch_remote(
        &self,
        window: &CommitWindow,
        repos: &[String],
        author: Option<&str>,
        outcomes: &mut Vec<FetchOutcome>,
    ) -> Vec<CommitRecord> {
        let mut commits = Vec::new();

        for repo in repos {
            let Some(remote) = self.remote.as_ref() else {
                outcomes.push(FetchOutcome::Failed {
                    source: repo.clone(),
                    reason: "no remote client configured".to_string(),
                });
                continue;
            };

            match remote.fetch_commits(repo, window, author).await {
                Ok(found) => {
                    outcomes.push(FetchOutcome::Fetched {
                        source: repo.clone(),
                        count: found.len(),
                    });
                    commits.extend(found.into_iter().map(|c| CommitRecord {
                        message: first_line(&c.message),
                        date: c.date,
                        repo: repo.clone(),
                    }));
                }
                Err(e) => {
                    tracing::warn!(repo = %repo, error = %e, "Remote commit fetch failed; skipping");
                    outcomes.push(FetchOutcome::Failed {
                        source: repo.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        commits
    }

    fn local_dirs(&self, spec: &SourceSpec) -> Vec<PathBuf> {
        if !spec.local_patterns.is_empty() {
            return discover_pattern_dirs(&spec.local_patterns);
        }
        match spec.fallback_key.as_deref() {
            Some(key) => search_by_key(&self.search_root, key),
            None => Vec::new(),
        }
    }
}

fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or_default().trim().to_string()
}
