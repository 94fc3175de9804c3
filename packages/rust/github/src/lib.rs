//! Source-hosting access for the auditor.
//!
//! [`RepoContentClient`] is the seam the pipeline talks to. [`GitHubClient`]
//! implements it over the GitHub REST API. [`FileLocator`] searches a
//! repository for the best candidate file with a given extension.
//!
//! The `test-util` feature adds `InMemoryRepoClient`, which implements the
//! seam over a fixed file tree.

mod client;
mod locator;
#[cfg(any(test, feature = "test-util"))]
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use auditor_shared::{IssueLocator, Result};

pub use client::GitHubClient;
pub use locator::{DEFAULT_MAX_DEPTH, FileLocator};
#[cfg(any(test, feature = "test-util"))]
pub use memory::InMemoryRepoClient;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    #[serde(other)]
    Other,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoEntry {
    pub name: String,
    /// Full path from the repository root.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

/// An open issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueSummary {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub creator: String,
}

impl From<&IssueSummary> for IssueLocator {
    fn from(issue: &IssueSummary) -> Self {
        Self {
            number: issue.number,
            url: issue.url.clone(),
        }
    }
}

/// A file to create or overwrite on a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCommit {
    pub branch: String,
    pub path: String,
    pub content: String,
    pub message: String,
}

/// Result of a file commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitHandle {
    pub sha: String,
    pub url: Option<String>,
}

// ---------------------------------------------------------------------------
// RepoContentClient
// ---------------------------------------------------------------------------

/// Operations the pipeline needs from the source-hosting platform.
///
/// Implementations map a missing repository or path to
/// [`AuditError::NotFound`](auditor_shared::AuditError::NotFound), rejected
/// credentials to `Unauthorized` and an exhausted quota to `RateLimited`.
#[async_trait]
pub trait RepoContentClient: Send + Sync {
    /// List the entries of a directory. `path` is empty for the repo root.
    async fn list_directory(&self, owner: &str, repo: &str, path: &str) -> Result<Vec<RepoEntry>>;

    /// Raw text content of a file.
    async fn get_file_content(&self, owner: &str, repo: &str, path: &str) -> Result<String>;

    async fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
    ) -> Result<IssueLocator>;

    /// Open issues (pull requests excluded) created by `creator`.
    async fn list_open_issues(
        &self,
        owner: &str,
        repo: &str,
        creator: &str,
    ) -> Result<Vec<IssueSummary>>;

    /// Create or overwrite a file with a single commit.
    async fn commit_file(&self, owner: &str, repo: &str, commit: &FileCommit)
    -> Result<CommitHandle>;
}
