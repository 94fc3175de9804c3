//! GitHub REST v3 implementation of [`RepoContentClient`].

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};

use auditor_shared::{AuditError, IssueLocator, Result};

use crate::{CommitHandle, FileCommit, IssueSummary, RepoContentClient, RepoEntry};

/// User-Agent string for API requests (required by GitHub).
const USER_AGENT: &str = concat!("AddinAuditor/", env!("CARGO_PKG_VERSION"));

/// Media type for JSON responses.
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";

/// Media type returning raw file content instead of a JSON envelope.
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";

/// Issues requested per page.
const ISSUES_PER_PAGE: usize = 100;

/// Longest error body kept in an [`AuditError::Api`] message.
const MAX_ERROR_BODY: usize = 200;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct IssueResponse {
    number: u64,
    #[serde(default)]
    title: String,
    html_url: String,
    #[serde(default)]
    user: Option<UserResponse>,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct FileMetadata {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    commit: CommitInfo,
}

#[derive(Debug, Deserialize)]
struct CommitInfo {
    sha: String,
    #[serde(default)]
    html_url: Option<String>,
}

// ---------------------------------------------------------------------------
// GitHubClient
// ---------------------------------------------------------------------------

/// Thin GitHub REST client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    api_url: String,
}

impl GitHubClient {
    /// Build a client against `api_url` (e.g. `https://api.github.com`).
    ///
    /// Without a token requests are anonymous and subject to the lower
    /// unauthenticated rate limit.
    pub fn new(api_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_MEDIA_TYPE));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| AuditError::config(format!("invalid GitHub token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| AuditError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn contents_url(&self, owner: &str, repo: &str, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        format!(
            "{}/repos/{owner}/{repo}/contents/{}",
            self.api_url,
            encoded.join("/")
        )
    }

    async fn send(&self, request: RequestBuilder, resource: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| AuditError::Network(format!("{resource}: {e}")))?;
        check_status(response, resource).await
    }

    /// SHA of an existing file on `branch`, or `None` when it does not exist yet.
    async fn existing_sha(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<Option<String>> {
        let url = self.contents_url(owner, repo, path);
        let request = self.http.get(&url).query(&[("ref", branch)]);
        match self.send(request, &url).await {
            Ok(response) => {
                let meta: FileMetadata = read_json(response, &url).await?;
                Ok(Some(meta.sha))
            }
            Err(AuditError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl RepoContentClient for GitHubClient {
    #[instrument(skip_all, fields(owner = %owner, repo = %repo, path = %path))]
    async fn list_directory(&self, owner: &str, repo: &str, path: &str) -> Result<Vec<RepoEntry>> {
        let url = self.contents_url(owner, repo, path);
        let response = self.send(self.http.get(&url), &url).await?;
        let value: serde_json::Value = read_json(response, &url).await?;

        if !value.is_array() {
            return Err(AuditError::validation(format!(
                "{owner}/{repo}/{path} is not a directory"
            )));
        }
        let entries: Vec<RepoEntry> = serde_json::from_value(value)
            .map_err(|e| AuditError::parse(format!("{url}: {e}")))?;
        debug!(entries = entries.len(), "listed directory");
        Ok(entries)
    }

    #[instrument(skip_all, fields(owner = %owner, repo = %repo, path = %path))]
    async fn get_file_content(&self, owner: &str, repo: &str, path: &str) -> Result<String> {
        let url = self.contents_url(owner, repo, path);
        let request = self.http.get(&url).header(ACCEPT, RAW_MEDIA_TYPE);
        let response = self.send(request, &url).await?;
        response
            .text()
            .await
            .map_err(|e| AuditError::Network(format!("{url}: failed to read body: {e}")))
    }

    #[instrument(skip_all, fields(owner = %owner, repo = %repo))]
    async fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
    ) -> Result<IssueLocator> {
        let url = format!("{}/repos/{owner}/{repo}/issues", self.api_url);
        let request = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "title": title, "body": body }));
        let response = self.send(request, &url).await?;
        let issue: IssueResponse = read_json(response, &url).await?;

        Ok(IssueLocator {
            number: issue.number,
            url: issue.html_url,
        })
    }

    #[instrument(skip_all, fields(owner = %owner, repo = %repo, creator = %creator))]
    async fn list_open_issues(
        &self,
        owner: &str,
        repo: &str,
        creator: &str,
    ) -> Result<Vec<IssueSummary>> {
        let url = format!("{}/repos/{owner}/{repo}/issues", self.api_url);
        let mut issues = Vec::new();

        for page in 1.. {
            let request = self.http.get(&url).query(&[
                ("state", "open".to_string()),
                ("creator", creator.to_string()),
                ("per_page", ISSUES_PER_PAGE.to_string()),
                ("page", page.to_string()),
            ]);
            let response = self.send(request, &url).await?;
            let batch: Vec<IssueResponse> = read_json(response, &url).await?;
            let len = batch.len();

            issues.extend(
                batch
                    .into_iter()
                    .filter(|issue| issue.pull_request.is_none())
                    .map(|issue| IssueSummary {
                        number: issue.number,
                        title: issue.title,
                        url: issue.html_url,
                        creator: issue.user.map(|u| u.login).unwrap_or_default(),
                    }),
            );

            if len < ISSUES_PER_PAGE {
                break;
            }
        }

        Ok(issues)
    }

    #[instrument(skip_all, fields(owner = %owner, repo = %repo, path = %commit.path))]
    async fn commit_file(
        &self,
        owner: &str,
        repo: &str,
        commit: &FileCommit,
    ) -> Result<CommitHandle> {
        let sha = self
            .existing_sha(owner, repo, &commit.branch, &commit.path)
            .await?;

        let mut payload = serde_json::json!({
            "message": commit.message,
            "content": STANDARD.encode(commit.content.as_bytes()),
            "branch": commit.branch,
        });
        if let Some(sha) = sha {
            payload["sha"] = serde_json::Value::String(sha);
        }

        let url = self.contents_url(owner, repo, &commit.path);
        let response = self.send(self.http.put(&url).json(&payload), &url).await?;
        let body: CommitResponse = read_json(response, &url).await?;

        Ok(CommitHandle {
            sha: body.commit.sha,
            url: body.commit.html_url,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map non-success statuses onto the error taxonomy.
async fn check_status(response: Response, resource: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let quota_exhausted = header("x-ratelimit-remaining").as_deref() == Some("0");
    let reset_at = header("x-ratelimit-reset");

    match status {
        StatusCode::NOT_FOUND => Err(AuditError::not_found(resource)),
        StatusCode::TOO_MANY_REQUESTS => Err(AuditError::RateLimited { reset_at }),
        StatusCode::FORBIDDEN if quota_exhausted => Err(AuditError::RateLimited { reset_at }),
        StatusCode::UNAUTHORIZED => {
            Err(AuditError::Unauthorized(format!("{resource}: HTTP {status}")))
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.chars().take(MAX_ERROR_BODY).collect();
            Err(AuditError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response, url: &str) -> Result<T> {
    let body = response
        .text()
        .await
        .map_err(|e| AuditError::Network(format!("{url}: failed to read body: {e}")))?;
    serde_json::from_str(&body).map_err(|e| AuditError::parse(format!("{url}: {e}")))
}
