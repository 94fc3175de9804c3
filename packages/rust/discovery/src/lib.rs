//! Addin discovery.
//!
//! The audited population is assembled from three sources, in this order:
//! 1. YAML descriptors in the project website repo (`addins/*.yml`)
//! 2. The markdown status list in the community home repo
//! 3. The package registry (all `Cake.*` packages, or one named package)
//!
//! Each source yields [`DiscoveredAddin`]s which [`merge_discovered`] folds
//! into one [`Entity`](auditor_shared::Entity) per name.

mod nuget;
mod parser;
mod sources;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use auditor_shared::Result;

pub use nuget::{NuGetClient, NuGetEndpoints};
pub use parser::{parse_status_list, parse_yaml_descriptor};
pub use sources::{
    DiscoveredAddin, discover_from_registry, discover_from_status_list, discover_from_yaml,
    merge_discovered,
};

/// Title marker of packages their authors have retired.
pub const DEPRECATED_MARKER: &str = "[DEPRECATED]";

// ---------------------------------------------------------------------------
// PackageMetadata
// ---------------------------------------------------------------------------

/// Registry metadata for one version of a package.
///
/// Also the on-disk format of the per-entity registry metadata cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub authors: String,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
}

impl PackageMetadata {
    /// SemVer prerelease versions carry a `-` suffix.
    pub fn is_prerelease(&self) -> bool {
        self.version.contains('-')
    }

    pub fn is_deprecated(&self) -> bool {
        self.title
            .to_ascii_uppercase()
            .contains(DEPRECATED_MARKER)
    }
}

/// Pick the most recently published version.
pub fn most_recent(versions: Vec<PackageMetadata>) -> Option<PackageMetadata> {
    versions.into_iter().max_by_key(|p| p.published)
}

// ---------------------------------------------------------------------------
// RegistryClient
// ---------------------------------------------------------------------------

/// Operations the pipeline needs from the package registry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// One page of search results for `query`.
    async fn search_by_prefix(
        &self,
        query: &str,
        take: usize,
        skip: usize,
    ) -> Result<Vec<PackageMetadata>>;

    /// Every listed version of a package. Empty when the package is unknown.
    async fn get_metadata(&self, name: &str) -> Result<Vec<PackageMetadata>>;

    /// The project URL advertised on a package's gallery page, if any.
    async fn project_url(&self, package_url: &Url) -> Result<Option<Url>>;

    /// Gallery page of a package.
    fn package_url(&self, name: &str) -> Result<Url>;
}

/// Page through search results until an empty page, keeping ids that start
/// with `id_prefix`.
#[instrument(skip_all, fields(query = %query, id_prefix = %id_prefix))]
pub async fn search_all(
    client: &dyn RegistryClient,
    query: &str,
    id_prefix: &str,
    page_size: usize,
) -> Result<Vec<PackageMetadata>> {
    let page_size = page_size.max(1);
    let mut packages = Vec::new();
    let mut skip = 0;

    loop {
        let page = client.search_by_prefix(query, page_size, skip).await?;
        if page.is_empty() {
            break;
        }
        debug!(skip, results = page.len(), "search page");
        skip += page_size;
        packages.extend(page.into_iter().filter(|p| p.id.starts_with(id_prefix)));
    }

    Ok(packages)
}
