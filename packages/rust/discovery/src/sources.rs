//! Discovery sources and the merge of their results into entities.

use std::collections::HashMap;

use futures::future::join_all;
use tracing::{info, instrument, warn};
use url::Url;

use auditor_github::{EntryKind, RepoContentClient};
use auditor_shared::{Entity, NuGetConfig, RepoLocator, Result, SourceFlags, SourcesConfig};

use crate::parser::{parse_status_list, parse_yaml_descriptor};
use crate::{PackageMetadata, RegistryClient, most_recent, search_all};

const YAML_EXTENSIONS: [&str; 2] = [".yml", ".yaml"];

/// An addin as reported by one discovery source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredAddin {
    pub name: String,
    pub repo: Option<RepoLocator>,
    pub registry_url: Option<Url>,
    pub maintainer: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub icon_url: Option<String>,
    pub is_prerelease: bool,
    pub is_deprecated: bool,
    pub source: SourceFlags,
}

impl DiscoveredAddin {
    fn empty(name: &str, source: SourceFlags) -> Self {
        Self {
            name: name.to_string(),
            repo: None,
            registry_url: None,
            maintainer: None,
            description: None,
            version: None,
            icon_url: None,
            is_prerelease: false,
            is_deprecated: false,
            source,
        }
    }

    /// An addin listed with a single link, which points either at its
    /// GitHub repo or at its registry page.
    pub fn from_listing(
        name: &str,
        url: &str,
        maintainer: Option<String>,
        source: SourceFlags,
    ) -> Self {
        let mut addin = Self::empty(name, source);
        addin.maintainer = maintainer
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        if let Some(repo) = RepoLocator::parse(url) {
            addin.repo = Some(repo);
        } else if let Ok(parsed) = Url::parse(url.trim()) {
            if parsed.host_str().is_some_and(|h| h.contains("nuget.org")) {
                addin.registry_url = Some(parsed);
            }
        }
        addin
    }

    /// An addin found in the registry.
    pub fn from_package(package: &PackageMetadata, package_url: Url) -> Self {
        let mut addin = Self::empty(&package.id, SourceFlags::REGISTRY);
        addin.repo = package.project_url.as_deref().and_then(RepoLocator::parse);
        addin.registry_url = Some(package_url);
        addin.maintainer = Some(package.authors.clone()).filter(|a| !a.is_empty());
        addin.description = Some(package.description.clone()).filter(|d| !d.is_empty());
        addin.version = Some(package.version.clone());
        addin.icon_url = package.icon_url.clone();
        addin.is_prerelease = package.is_prerelease();
        addin.is_deprecated = package.is_deprecated();
        addin
    }

    fn matches(&self, only: Option<&str>) -> bool {
        only.is_none_or(|name| self.name.eq_ignore_ascii_case(name))
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Addins described by YAML files in the website repo.
///
/// Descriptors that fail to download or parse are skipped with a warning;
/// stage-fatal errors propagate.
#[instrument(skip_all, fields(repo = %format!("{}/{}", sources.website_owner, sources.website_repo)))]
pub async fn discover_from_yaml(
    client: &dyn RepoContentClient,
    sources: &SourcesConfig,
    only: Option<&str>,
) -> Result<Vec<DiscoveredAddin>> {
    let owner = &sources.website_owner;
    let repo = &sources.website_repo;

    let files: Vec<_> = client
        .list_directory(owner, repo, &sources.addins_path)
        .await?
        .into_iter()
        .filter(|e| e.kind == EntryKind::File)
        .filter(|e| {
            let lower = e.name.to_ascii_lowercase();
            YAML_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        })
        .filter(|e| match only {
            // Descriptor files are named after the addin.
            Some(name) => e
                .name
                .to_ascii_lowercase()
                .starts_with(&format!("{}.", name.to_ascii_lowercase())),
            None => true,
        })
        .collect();

    let downloads = files.iter().map(|file| async move {
        let content = client.get_file_content(owner, repo, &file.path).await?;
        parse_yaml_descriptor(&content)
    });

    let mut addins = Vec::new();
    for (file, result) in files.iter().zip(join_all(downloads).await) {
        match result {
            Ok(addin) if addin.matches(only) => addins.push(addin),
            Ok(_) => {}
            Err(e) if e.is_stage_fatal() => return Err(e),
            Err(e) => warn!(path = %file.path, error = %e, "skipping addin descriptor"),
        }
    }

    info!(count = addins.len(), "discovered addins from YAML descriptors");
    Ok(addins)
}

/// Addins listed in the home repo's status file.
#[instrument(skip_all, fields(repo = %format!("{}/{}", sources.home_owner, sources.home_repo)))]
pub async fn discover_from_status_list(
    client: &dyn RepoContentClient,
    sources: &SourcesConfig,
    only: Option<&str>,
) -> Result<Vec<DiscoveredAddin>> {
    let content = client
        .get_file_content(&sources.home_owner, &sources.home_repo, &sources.status_file)
        .await?;

    let addins: Vec<_> = parse_status_list(&content)
        .into_iter()
        .filter(|a| a.matches(only))
        .collect();

    info!(count = addins.len(), "discovered addins from status list");
    Ok(addins)
}

/// Addins published to the registry.
///
/// With `only`, the most recent listed version of that one package;
/// otherwise every package matching the configured search.
#[instrument(skip_all, fields(only = ?only))]
pub async fn discover_from_registry(
    client: &dyn RegistryClient,
    nuget: &NuGetConfig,
    only: Option<&str>,
) -> Result<Vec<DiscoveredAddin>> {
    let packages = match only {
        Some(name) => most_recent(client.get_metadata(name).await?)
            .into_iter()
            .collect(),
        None => search_all(client, &nuget.search_term, &nuget.id_prefix, nuget.page_size).await?,
    };

    let addins = packages
        .iter()
        .map(|p| Ok(DiscoveredAddin::from_package(p, client.package_url(&p.id)?)))
        .collect::<Result<Vec<_>>>()?;

    info!(count = addins.len(), "discovered addins from registry");
    Ok(addins)
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Fold discovered addins into one entity per name (case-insensitive).
///
/// Input order is precedence order: for every attribute the first non-empty
/// value wins, and source flags are unioned. Entities come out in order of
/// first appearance.
pub fn merge_discovered(discovered: impl IntoIterator<Item = DiscoveredAddin>) -> Vec<Entity> {
    let mut entities: Vec<Entity> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for addin in discovered {
        let key = addin.name.to_ascii_lowercase();
        let position = *index.entry(key).or_insert_with(|| {
            entities.push(Entity::new(addin.name.clone()));
            entities.len() - 1
        });
        let entity = &mut entities[position];

        entity.sources |= addin.source;
        entity.maintainer = entity.maintainer.take().or(addin.maintainer);
        entity.description = entity.description.take().or(addin.description);
        entity.repo = entity.repo.take().or(addin.repo);
        entity.registry_url = entity.registry_url.take().or(addin.registry_url);
        entity.registry_version = entity.registry_version.take().or(addin.version);
        entity.icon_url = entity.icon_url.take().or(addin.icon_url);
        entity.is_prerelease |= addin.is_prerelease;
        entity.is_deprecated |= addin.is_deprecated;
    }

    entities
}
