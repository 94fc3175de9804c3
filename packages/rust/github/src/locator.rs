//! Recursive "best candidate file" search over a repository tree.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{instrument, warn};

use auditor_shared::{RepoLocator, Result};

use crate::{EntryKind, RepoContentClient, RepoEntry};

/// Default bound on directory depth below the start path.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Directory names searched before any sibling directory.
const PRIORITY_DIRS: [&str; 2] = ["source", "src"];

/// Finds the first file with a given extension, depth-first, preferring
/// `src/` and `source/` subtrees.
///
/// At each directory, a matching file wins outright (first in listing
/// order). Otherwise priority subdirectories are searched, then all others,
/// each group in listing order.
#[derive(Clone)]
pub struct FileLocator {
    client: Arc<dyn RepoContentClient>,
    /// Lowercased, with leading dot.
    extension: String,
    max_depth: usize,
}

impl FileLocator {
    /// `extension` may be given with or without the leading dot.
    pub fn new(client: Arc<dyn RepoContentClient>, extension: &str) -> Self {
        let extension = format!(".{}", extension.trim_start_matches('.')).to_ascii_lowercase();
        Self {
            client,
            extension,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Search `repo` from `start` (the root when `None`).
    ///
    /// Listing errors propagate; an exhausted tree is `Ok(None)`.
    #[instrument(skip_all, fields(repo = %repo, extension = %self.extension))]
    pub async fn locate(&self, repo: &RepoLocator, start: Option<&str>) -> Result<Option<RepoEntry>> {
        let start = start.unwrap_or_default().trim_matches('/').to_string();
        self.search(repo, start, 0).await
    }

    fn matches(&self, entry: &RepoEntry) -> bool {
        entry.kind == EntryKind::File && entry.name.to_ascii_lowercase().ends_with(&self.extension)
    }

    fn search<'a>(
        &'a self,
        repo: &'a RepoLocator,
        path: String,
        depth: usize,
    ) -> BoxFuture<'a, Result<Option<RepoEntry>>> {
        async move {
            if depth > self.max_depth {
                warn!(%path, max_depth = self.max_depth, "search depth exceeded, skipping subtree");
                return Ok(None);
            }

            let entries = self
                .client
                .list_directory(&repo.owner, &repo.name, &path)
                .await?;

            if let Some(found) = entries.iter().find(|e| self.matches(e)) {
                return Ok(Some(found.clone()));
            }

            let (priority, other): (Vec<RepoEntry>, Vec<RepoEntry>) = entries
                .into_iter()
                .filter(|e| e.kind == EntryKind::Dir)
                .partition(|e| PRIORITY_DIRS.iter().any(|p| e.name.eq_ignore_ascii_case(p)));

            for dir in priority.into_iter().chain(other) {
                if let Some(found) = self.search(repo, dir.path, depth + 1).await? {
                    return Ok(Some(found));
                }
            }

            Ok(None)
        }
        .boxed()
    }
}
