//! Local git clones
//!
//! Discovery turns glob patterns (or a customer-name search) into repository
//! directories; [`GitCli`] reads their commit logs with the `git` binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::expand_tilde;
use crate::error::{Error, Result};
use crate::types::{CommitRecord, CommitWindow};

use super::LocalCommitLog;

/// Version-control marker that makes a directory a repository root
const VCS_MARKER: &str = ".git";

/// Field and record separators for `git log --pretty`
const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

/// Whether `path` is a directory with a `.git` entry (dir or worktree file)
pub fn is_repo_root(path: &Path) -> bool {
    path.is_dir() && path.join(VCS_MARKER).exists()
}

/// Expand glob patterns into repository directories.
///
/// Patterns are expanded in order and matches keep glob order. Overlapping
/// patterns yield the same directory more than once.
pub fn discover_pattern_dirs(patterns: &[String]) -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    for pattern in patterns {
        let expanded = expand_tilde(pattern);
        let pattern_str = expanded.to_string_lossy();

        let entries = match glob::glob(&pattern_str) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(pattern = %pattern, error = %e, "Invalid repo directory pattern");
                continue;
            }
        };

        for entry in entries.flatten() {
            if !is_repo_root(&entry) {
                tracing::debug!(path = %entry.display(), "Skipping non-repository match");
                continue;
            }
            if dirs.contains(&entry) {
                tracing::warn!(
                    path = %entry.display(),
                    pattern = %pattern,
                    "Directory matched by more than one pattern; its commits will be counted again"
                );
            }
            dirs.push(entry);
        }
    }

    dirs
}

/// Repositories directly under `root` whose name contains `key` (case-insensitive).
///
/// Results are sorted by path. A missing or unreadable root yields nothing.
pub fn search_by_key(root: &Path, key: &str) -> Vec<PathBuf> {
    let needle = key.to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(root = %root.display(), error = %e, "Cannot read local search root");
            return Vec::new();
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
        .filter(|path| is_repo_root(path))
        .collect();

    dirs.sort();
    dirs
}

/// Label used for commits from a local directory
pub fn repo_label(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}

/// Reads commit logs by running `git log`
pub struct GitCli {
    program: String,
    timeout: Duration,
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Use a specific git binary
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::new()
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalCommitLog for GitCli {
    async fn read_log(
        &self,
        dir: &Path,
        window: &CommitWindow,
        author: Option<&str>,
    ) -> Result<Vec<CommitRecord>> {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .arg("-C")
            .arg(dir)
            .arg("log")
            .arg("--all")
            .arg("--no-color")
            .arg(format!("--since={} 00:00:00", window.start.format("%Y-%m-%d")))
            .arg(format!("--until={} 23:59:59", window.end.format("%Y-%m-%d")))
            .arg(format!("--pretty=format:%aI{}%s{}", FIELD_SEP, RECORD_SEP));
        if let Some(author) = author {
            command.arg(format!("--author={}", author));
        }
        command.kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| Error::Source(format!("{}: git log timed out", dir.display())))?
            .map_err(|e| Error::Source(format!("{}: failed to run git: {}", dir.display(), e)))?;

        if !output.status.success() {
            return Err(Error::Source(format!(
                "{}: git log exited with {}: {}",
                dir.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_log_output(&stdout, &repo_label(dir), window))
    }
}

/// Parse `%aI<US>%s<RS>` records, keeping commits dated inside the window.
///
/// `--since/--until` filter on committer date while the window is about
/// author dates, hence the second check here.
fn parse_log_output(stdout: &str, repo: &str, window: &CommitWindow) -> Vec<CommitRecord> {
    stdout
        .split(RECORD_SEP)
        .filter_map(|record| {
            let record = record.trim_matches(|c: char| c == '\n' || c == '\r');
            if record.is_empty() {
                return None;
            }
            let (date, subject) = record.split_once(FIELD_SEP)?;
            let date = DateTime::parse_from_rfc3339(date.trim()).ok()?;
            if !window.contains(date.date_naive()) {
                return None;
            }
            Some(CommitRecord {
                message: subject.to_string(),
                date: date.with_timezone(&Utc),
                repo: repo.to_string(),
            })
        })
        .collect()
}
