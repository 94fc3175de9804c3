//! Core domain types for the addin auditor.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use url::Url;

/// Sentinel returned by version normalization for an empty version.
pub const UNKNOWN_VERSION: &str = "Unknown";

// ---------------------------------------------------------------------------
// SourceFlags
// ---------------------------------------------------------------------------

/// Bitset of the discovery sources that contributed an entity.
///
/// Sources are commutative: when the same addin is found twice the flags are
/// unioned, never overwritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceFlags(u8);

impl SourceFlags {
    /// No source.
    pub const NONE: Self = Self(0);
    /// A YAML descriptor on the project website.
    pub const YAML: Self = Self(1);
    /// The community status list.
    pub const WEBSITE_LIST: Self = Self(1 << 1);
    /// The package registry search.
    pub const REGISTRY: Self = Self(1 << 2);

    /// Whether every flag in `other` is also set here.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw bit representation.
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for SourceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SourceFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

// ---------------------------------------------------------------------------
// Locators
// ---------------------------------------------------------------------------

/// A repository on the source-hosting platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoLocator {
    pub owner: String,
    pub name: String,
    /// Canonical `https://github.com/<owner>/<name>` URL.
    pub url: String,
}

impl RepoLocator {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        let owner = owner.into();
        let name = name.into();
        let url = format!("https://github.com/{owner}/{name}");
        Self { owner, name, url }
    }

    /// Parse a GitHub repository URL such as
    /// `https://github.com/cake-contrib/Cake.Foo.git` or
    /// `https://github.com/cake-contrib/Cake.Foo/tree/develop`.
    ///
    /// Returns `None` for non-GitHub hosts or URLs without owner and name.
    pub fn parse(raw: &str) -> Option<Self> {
        let url = Url::parse(raw.trim()).ok()?;
        let host = url.host_str()?.to_ascii_lowercase();
        if host != "github.com" && host != "www.github.com" {
            return None;
        }

        let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
        let owner = segments.next()?;
        let name = segments.next()?;
        let name = name.strip_suffix(".git").unwrap_or(name);
        if name.is_empty() {
            return None;
        }

        Some(Self::new(owner, name))
    }
}

impl fmt::Display for RepoLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A previously filed compliance issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLocator {
    pub number: u64,
    pub url: String,
}

// ---------------------------------------------------------------------------
// References & analysis
// ---------------------------------------------------------------------------

/// A deduplicated, conservatively merged dependency declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedReference {
    pub identifier: String,
    /// May be empty when no declaration carried a version.
    pub version: String,
    /// True only if every declaration of this identifier was private.
    pub is_private: bool,
}

/// Effective version and privacy of one tracked dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedDependency {
    /// Normalized version; empty when the dependency is not referenced.
    pub version: String,
    pub is_up_to_date: bool,
    pub is_private: bool,
}

impl TrackedDependency {
    /// Whether the entity references this dependency at all.
    pub fn is_referenced(&self) -> bool {
        !self.version.is_empty()
    }
}

/// Facts derived per entity by the analysis stage. Rebuilt every run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub core: TrackedDependency,
    pub common: TrackedDependency,
    pub targets_expected_framework: bool,
    pub uses_expected_icon: bool,
    /// The addin has a descriptor on the project website.
    pub has_listing: bool,
    /// Every recoverable failure or compliance gap recorded this run.
    #[serde(default)]
    pub notes: Vec<String>,
}

impl AnalysisResult {
    /// An entity is clean when nothing was noted against it.
    pub fn is_clean(&self) -> bool {
        self.notes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// One audited addin and everything learned about it so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Package name. Unique key.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<RepoLocator>,
    /// Package page on the registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_url: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_version: Option<String>,
    #[serde(default)]
    pub is_prerelease: bool,
    #[serde(default)]
    pub is_deprecated: bool,
    /// Build-solution file, relative to the repo root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution_path: Option<String>,
    /// Build-project files, test projects excluded. `None` until looked up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_paths: Option<Vec<String>>,
    /// Unique by identifier, sorted by identifier.
    #[serde(default)]
    pub references: Vec<NormalizedReference>,
    #[serde(default)]
    pub frameworks: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<IssueLocator>,
    #[serde(default)]
    pub analysis: AnalysisResult,
    #[serde(default)]
    pub sources: SourceFlags,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            maintainer: None,
            description: None,
            repo: None,
            registry_url: None,
            registry_version: None,
            is_prerelease: false,
            is_deprecated: false,
            solution_path: None,
            project_paths: None,
            references: Vec::new(),
            frameworks: BTreeSet::new(),
            icon_url: None,
            issue: None,
            analysis: AnalysisResult::default(),
            sources: SourceFlags::NONE,
        }
    }

    /// Append a note prefixed with the stage that produced it.
    pub fn note(&mut self, stage: &str, message: impl fmt::Display) {
        self.analysis.notes.push(format!("{stage}: {message}"));
    }

    /// Look up a merged reference by identifier (case-insensitive).
    pub fn reference(&self, identifier: &str) -> Option<&NormalizedReference> {
        self.references
            .iter()
            .find(|r| r.identifier.eq_ignore_ascii_case(identifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn source_flags_union_and_contains() {
        let mut flags = SourceFlags::YAML;
        flags |= SourceFlags::REGISTRY;

        assert!(flags.contains(SourceFlags::YAML));
        assert!(flags.contains(SourceFlags::REGISTRY));
        assert!(!flags.contains(SourceFlags::WEBSITE_LIST));
        assert!(SourceFlags::NONE.is_empty());
        assert_eq!((SourceFlags::YAML | SourceFlags::YAML).bits(), 1);
    }

    #[test]
    fn source_flags_serialize_as_integer() {
        let flags = SourceFlags::YAML | SourceFlags::WEBSITE_LIST;
        assert_eq!(serde_json::to_string(&flags).expect("serialize"), "3");
    }

    #[test]
    fn repo_locator_parses_github_urls() {
        let repo = RepoLocator::parse("https://github.com/cake-contrib/Cake.Git.git").expect("parse");
        assert_eq!(repo.owner, "cake-contrib");
        assert_eq!(repo.name, "Cake.Git");
        assert_eq!(repo.url, "https://github.com/cake-contrib/Cake.Git");

        let repo =
            RepoLocator::parse("https://github.com/someone/Cake.Foo/tree/develop/src").expect("parse");
        assert_eq!(repo.to_string(), "someone/Cake.Foo");
    }

    #[test]
    fn repo_locator_rejects_other_hosts() {
        assert!(RepoLocator::parse("https://bitbucket.org/someone/Cake.Foo").is_none());
        assert!(RepoLocator::parse("https://github.com/someone").is_none());
        assert!(RepoLocator::parse("not a url").is_none());
    }

    #[test]
    fn entity_note_is_prefixed_with_stage() {
        let mut entity = Entity::new("Cake.Foo");
        assert!(entity.analysis.is_clean());

        entity.note("find-solution", "The project does not exist");
        assert_eq!(
            entity.analysis.notes,
            vec!["find-solution: The project does not exist".to_string()]
        );
        assert!(!entity.analysis.is_clean());
    }

    #[test]
    fn entity_json_roundtrip() {
        let mut entity = Entity::new("Cake.Foo");
        entity.repo = Some(RepoLocator::new("cake-contrib", "Cake.Foo"));
        entity.project_paths = Some(vec!["src/Cake.Foo/Cake.Foo.csproj".into()]);
        entity.frameworks.insert("netstandard2.0".into());
        entity.sources = SourceFlags::YAML | SourceFlags::REGISTRY;

        let json = serde_json::to_string(&entity).expect("serialize");
        let parsed: Entity = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, entity);
    }
}
