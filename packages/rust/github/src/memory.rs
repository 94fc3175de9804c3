//! In-memory [`RepoContentClient`] over a fixed set of files.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use auditor_shared::{AuditError, IssueLocator, Result};

use crate::{CommitHandle, EntryKind, FileCommit, IssueSummary, RepoContentClient, RepoEntry};

/// Repository contents held in memory.
///
/// Directories are implied by file paths and listed in lexical order.
/// Issues and commits are recorded so callers can inspect side effects.
#[derive(Debug, Default)]
pub struct InMemoryRepoClient {
    /// `owner/repo` → path → content.
    repos: BTreeMap<String, BTreeMap<String, String>>,
    /// `owner/repo` → error returned by every call on that repo.
    failures: HashMap<String, fn() -> AuditError>,
    issues: Mutex<Vec<(String, IssueSummary)>>,
    commits: Mutex<Vec<(String, FileCommit)>>,
    requests: AtomicUsize,
}

fn key(owner: &str, repo: &str) -> String {
    format!("{owner}/{repo}").to_ascii_lowercase()
}

impl InMemoryRepoClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file. Parent directories come into existence with it.
    pub fn with_file(mut self, owner: &str, repo: &str, path: &str, content: &str) -> Self {
        self.repos
            .entry(key(owner, repo))
            .or_default()
            .insert(path.trim_matches('/').to_string(), content.to_string());
        self
    }

    /// Make every call against `owner/repo` fail with the produced error.
    pub fn with_failure(mut self, owner: &str, repo: &str, error: fn() -> AuditError) -> Self {
        self.failures.insert(key(owner, repo), error);
        self
    }

    /// Seed an open issue.
    pub fn with_issue(self, owner: &str, repo: &str, issue: IssueSummary) -> Self {
        if let Ok(mut issues) = self.issues.lock() {
            issues.push((key(owner, repo), issue));
        }
        self
    }

    /// Every issue recorded so far, seeded or created, with its `owner/repo`.
    pub fn issues(&self) -> Vec<(String, IssueSummary)> {
        self.issues.lock().map(|i| i.clone()).unwrap_or_default()
    }

    /// Every commit made so far, with its `owner/repo`.
    pub fn commits(&self) -> Vec<(String, FileCommit)> {
        self.commits.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls served so far, failed ones included.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn repo(&self, owner: &str, repo: &str) -> Result<&BTreeMap<String, String>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let key = key(owner, repo);
        if let Some(error) = self.failures.get(&key) {
            return Err(error());
        }
        self.repos
            .get(&key)
            .ok_or_else(|| AuditError::not_found(format!("{owner}/{repo}")))
    }
}

#[async_trait]
impl RepoContentClient for InMemoryRepoClient {
    async fn list_directory(&self, owner: &str, repo: &str, path: &str) -> Result<Vec<RepoEntry>> {
        let files = self.repo(owner, repo)?;
        let dir = path.trim_matches('/');
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };

        let mut dirs = BTreeSet::new();
        let mut entries = Vec::new();
        for file in files.keys().filter(|f| f.starts_with(&prefix)) {
            let rest = &file[prefix.len()..];
            match rest.split_once('/') {
                Some((child, _)) => {
                    if dirs.insert(child.to_string()) {
                        entries.push(RepoEntry {
                            name: child.to_string(),
                            path: format!("{prefix}{child}"),
                            kind: EntryKind::Dir,
                        });
                    }
                }
                None => entries.push(RepoEntry {
                    name: rest.to_string(),
                    path: file.clone(),
                    kind: EntryKind::File,
                }),
            }
        }

        if entries.is_empty() && !dir.is_empty() {
            return Err(AuditError::not_found(format!("{owner}/{repo}/{dir}")));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn get_file_content(&self, owner: &str, repo: &str, path: &str) -> Result<String> {
        self.repo(owner, repo)?
            .get(path.trim_matches('/'))
            .cloned()
            .ok_or_else(|| AuditError::not_found(format!("{owner}/{repo}/{path}")))
    }

    async fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        _body: &str,
    ) -> Result<IssueLocator> {
        self.repo(owner, repo)?;
        let mut issues = self
            .issues
            .lock()
            .map_err(|_| AuditError::Storage("issue log poisoned".into()))?;
        let number = issues.len() as u64 + 1;
        let url = format!("https://github.com/{owner}/{repo}/issues/{number}");
        issues.push((
            key(owner, repo),
            IssueSummary {
                number,
                title: title.to_string(),
                url: url.clone(),
                creator: String::new(),
            },
        ));
        Ok(IssueLocator { number, url })
    }

    async fn list_open_issues(
        &self,
        owner: &str,
        repo: &str,
        creator: &str,
    ) -> Result<Vec<IssueSummary>> {
        self.repo(owner, repo)?;
        let key = key(owner, repo);
        Ok(self
            .issues()
            .into_iter()
            .filter(|(k, issue)| *k == key && issue.creator == creator)
            .map(|(_, issue)| issue)
            .collect())
    }

    async fn commit_file(
        &self,
        owner: &str,
        repo: &str,
        commit: &FileCommit,
    ) -> Result<CommitHandle> {
        self.repo(owner, repo)?;
        let mut commits = self
            .commits
            .lock()
            .map_err(|_| AuditError::Storage("commit log poisoned".into()))?;
        commits.push((key(owner, repo), commit.clone()));
        Ok(CommitHandle {
            sha: format!("{:040x}", commits.len()),
            url: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn lists_implied_directories() {
        let client = InMemoryRepoClient::new()
            .with_file("o", "r", "README.md", "")
            .with_file("o", "r", "src/Foo/Foo.csproj", "")
            .with_file("o", "r", "src/Foo.sln", "");

        let root = client.list_directory("o", "r", "").await.expect("root");
        let names: Vec<_> = root.iter().map(|e| (e.name.as_str(), e.kind)).collect();
        assert_eq!(names, vec![("README.md", EntryKind::File), ("src", EntryKind::Dir)]);

        let src = client.list_directory("o", "r", "src").await.expect("src");
        assert_eq!(src[0].path, "src/Foo");
        assert_eq!(src[1].path, "src/Foo.sln");
    }

    #[tokio::test]
    async fn unknown_repo_and_injected_failures() {
        let client = InMemoryRepoClient::new()
            .with_file("o", "r", "a.txt", "")
            .with_failure("o", "broken", || AuditError::Network("reset".into()));

        assert!(matches!(
            client.list_directory("o", "missing", "").await,
            Err(AuditError::NotFound { .. })
        ));
        assert!(matches!(
            client.get_file_content("o", "broken", "a.txt").await,
            Err(AuditError::Network(_))
        ));
        assert_eq!(client.request_count(), 2);
    }
}
