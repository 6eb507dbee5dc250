//! GitHub REST client for commit listings
//!
//! Uses `GET /repos/{owner}/{repo}/commits` with `since`/`until` bounds and
//! follows pages of 100 until a short page or the configured page cap.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;

use crate::config::GitHubConfig;
use crate::error::{Error, Result};
use crate::types::CommitWindow;

use super::{RemoteCommit, RemoteCommitSource};

const PER_PAGE: usize = 100;

/// Commit list entry (only the fields we read)
#[derive(Debug, Deserialize)]
struct CommitListItem {
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
    author: Option<CommitSignature>,
    committer: Option<CommitSignature>,
}

#[derive(Debug, Deserialize)]
struct CommitSignature {
    name: Option<String>,
    date: Option<DateTime<Utc>>,
}

/// HTTP client for the GitHub commits API
pub struct GitHubClient {
    http_client: reqwest::Client,
    base_url: String,
    max_pages: u32,
}

impl GitHubClient {
    /// Create a client from configuration
    ///
    /// The token is optional; without it only public repos resolve and the
    /// unauthenticated rate limit applies.
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("commitbill"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        if let Some(token) = &config.token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| Error::Config(format!("invalid github token: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            max_pages: config.max_pages.max(1),
        })
    }

    async fn fetch_page(
        &self,
        repo: &str,
        window: &CommitWindow,
        author: Option<&str>,
        page: u32,
    ) -> Result<Vec<CommitListItem>> {
        let url = commits_url(&self.base_url, repo)?;
        let (since, until) = window_bounds(window);

        let mut query = vec![
            ("since", since),
            ("until", until),
            ("per_page", PER_PAGE.to_string()),
            ("page", page.to_string()),
        ];
        if let Some(author) = author {
            if page == 1 && !is_login_or_email(author) {
                tracing::warn!(
                    repo,
                    author,
                    "GitHub filters authors by login or email; a display name matches nothing"
                );
            }
            query.push(("author", author.to_string()));
        }

        let response = self
            .http_client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::Source(format!("{}: HTTP request failed: {}", repo, e)))?;

        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Source(format!("{}: failed to parse response: {}", repo, e)))
        } else if status == reqwest::StatusCode::CONFLICT {
            // empty repository
            Ok(Vec::new())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Source(format!(
                "{}: API error ({}): {}",
                repo, status, error_text
            )))
        }
    }
}

#[async_trait]
impl RemoteCommitSource for GitHubClient {
    async fn fetch_commits(
        &self,
        repo: &str,
        window: &CommitWindow,
        author: Option<&str>,
    ) -> Result<Vec<RemoteCommit>> {
        let mut commits = Vec::new();

        for page in 1..=self.max_pages {
            let items = self.fetch_page(repo, window, author, page).await?;
            let short_page = items.len() < PER_PAGE;
            commits.extend(items.into_iter().filter_map(into_remote_commit));

            if short_page {
                break;
            }
            if page == self.max_pages {
                tracing::warn!(repo, pages = page, "Commit listing truncated at page cap");
            }
        }

        tracing::debug!(repo, count = commits.len(), "Fetched remote commits");
        Ok(commits)
    }
}

/// `{base}/repos/{owner}/{name}/commits` with each segment URL-encoded
fn commits_url(base_url: &str, repo: &str) -> Result<String> {
    let (owner, name) = repo
        .split_once('/')
        .filter(|(o, n)| !o.is_empty() && !n.is_empty() && !n.contains('/'))
        .ok_or_else(|| Error::Source(format!("{}: expected owner/name", repo)))?;
    Ok(format!(
        "{}/repos/{}/{}/commits",
        base_url,
        urlencoding::encode(owner),
        urlencoding::encode(name)
    ))
}

/// ISO-8601 bounds covering the whole first and last day
fn window_bounds(window: &CommitWindow) -> (String, String) {
    (
        format!("{}T00:00:00Z", window.start.format("%Y-%m-%d")),
        format!("{}T23:59:59Z", window.end.format("%Y-%m-%d")),
    )
}

fn into_remote_commit(item: CommitListItem) -> Option<RemoteCommit> {
    let detail = item.commit;
    let date = detail
        .author
        .as_ref()
        .and_then(|a| a.date)
        .or_else(|| detail.committer.as_ref().and_then(|c| c.date))?;
    let author = detail
        .author
        .and_then(|a| a.name)
        .unwrap_or_default();

    Some(RemoteCommit {
        message: detail.message,
        date,
        author,
    })
}

/// GitHub's `author` filter takes a login or an email, never a display name
fn is_login_or_email(author: &str) -> bool {
    let author = author.trim();
    !author.is_empty() && !author.contains(char::is_whitespace)
}
