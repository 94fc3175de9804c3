//! NuGet v3 implementation of [`RegistryClient`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use reqwest::{Client, Response, StatusCode};
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use auditor_shared::{AuditError, NuGetConfig, Result};

use crate::{PackageMetadata, RegistryClient};

/// User-Agent string for registry requests.
const USER_AGENT: &str = concat!("AddinAuditor/", env!("CARGO_PKG_VERSION"));

/// Anchor on the gallery page that links to the project site.
const PROJECT_LINK_SELECTOR: &str = r#"a[data-track="outbound-project-url"]"#;

/// Registration entries for unlisted versions carry this publish year.
const UNLISTED_PUBLISH_YEAR: i32 = 1900;

/// Base URLs of the three NuGet services the auditor uses.
#[derive(Debug, Clone)]
pub struct NuGetEndpoints {
    pub search_url: String,
    pub registration_url: String,
    pub gallery_url: String,
}

impl From<&NuGetConfig> for NuGetEndpoints {
    fn from(config: &NuGetConfig) -> Self {
        Self {
            search_url: config.search_url.clone(),
            registration_url: config.registration_url.trim_end_matches('/').to_string(),
            gallery_url: config.gallery_url.trim_end_matches('/').to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Fields the services return either as a string or a list of strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => s
                .split(&[',', ' '][..])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Self::Many(v) => v,
        }
    }

    fn joined(self) -> String {
        match self {
            Self::One(s) => s,
            Self::Many(v) => v.join(", "),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchEntry {
    id: String,
    version: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    authors: Option<OneOrMany>,
    #[serde(default)]
    owners: Option<OneOrMany>,
    #[serde(default)]
    tags: Option<OneOrMany>,
    #[serde(default)]
    icon_url: Option<String>,
    #[serde(default)]
    project_url: Option<String>,
}

impl From<SearchEntry> for PackageMetadata {
    fn from(entry: SearchEntry) -> Self {
        Self {
            id: entry.id,
            version: entry.version,
            title: entry.title.unwrap_or_default(),
            description: entry.description.unwrap_or_default(),
            authors: entry.authors.map(OneOrMany::joined).unwrap_or_default(),
            owners: entry.owners.map(OneOrMany::into_vec).unwrap_or_default(),
            tags: entry.tags.map(OneOrMany::into_vec).unwrap_or_default(),
            icon_url: non_empty(entry.icon_url),
            project_url: non_empty(entry.project_url),
            published: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegistrationIndex {
    #[serde(default)]
    items: Vec<RegistrationPage>,
}

#[derive(Debug, Deserialize)]
struct RegistrationPage {
    #[serde(rename = "@id")]
    id: String,
    /// Absent when the page must be fetched separately.
    #[serde(default)]
    items: Option<Vec<RegistrationLeaf>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationLeaf {
    catalog_entry: CatalogEntry,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogEntry {
    id: String,
    version: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    authors: Option<OneOrMany>,
    #[serde(default)]
    tags: Option<OneOrMany>,
    #[serde(default)]
    icon_url: Option<String>,
    #[serde(default)]
    project_url: Option<String>,
    #[serde(default)]
    published: Option<DateTime<Utc>>,
    #[serde(default)]
    listed: Option<bool>,
}

impl CatalogEntry {
    fn is_listed(&self) -> bool {
        let unlisted_date = self
            .published
            .is_some_and(|p| p.year() <= UNLISTED_PUBLISH_YEAR);
        self.listed != Some(false) && !unlisted_date
    }
}

impl From<CatalogEntry> for PackageMetadata {
    fn from(entry: CatalogEntry) -> Self {
        Self {
            id: entry.id,
            version: entry.version,
            title: entry.title.unwrap_or_default(),
            description: entry.description.unwrap_or_default(),
            authors: entry.authors.map(OneOrMany::joined).unwrap_or_default(),
            owners: Vec::new(),
            tags: entry.tags.map(OneOrMany::into_vec).unwrap_or_default(),
            icon_url: non_empty(entry.icon_url),
            project_url: non_empty(entry.project_url),
            published: entry.published,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// NuGetClient
// ---------------------------------------------------------------------------

/// HTTP client for the NuGet search, registration and gallery services.
#[derive(Debug, Clone)]
pub struct NuGetClient {
    http: Client,
    endpoints: NuGetEndpoints,
}

impl NuGetClient {
    pub fn new(endpoints: NuGetEndpoints, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AuditError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, endpoints })
    }

    async fn get(&self, url: &str) -> Result<Response> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AuditError::Network(format!("{url}: {e}")))?;

        match response.status() {
            s if s.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(AuditError::not_found(url)),
            StatusCode::TOO_MANY_REQUESTS => Err(AuditError::RateLimited {
                reset_at: response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
            }),
            status => Err(AuditError::Api {
                status: status.as_u16(),
                message: format!("{url}: HTTP {status}"),
            }),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self
            .get(url)
            .await?
            .text()
            .await
            .map_err(|e| AuditError::Network(format!("{url}: failed to read body: {e}")))?;
        serde_json::from_str(&body).map_err(|e| AuditError::parse(format!("{url}: {e}")))
    }
}

#[async_trait]
impl RegistryClient for NuGetClient {
    #[instrument(skip_all, fields(query = %query, take = take, skip = skip))]
    async fn search_by_prefix(
        &self,
        query: &str,
        take: usize,
        skip: usize,
    ) -> Result<Vec<PackageMetadata>> {
        let mut url = Url::parse(&self.endpoints.search_url)
            .map_err(|e| AuditError::config(format!("invalid search URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("skip", &skip.to_string())
            .append_pair("take", &take.to_string())
            .append_pair("prerelease", "true")
            .append_pair("semVerLevel", "2.0.0");

        let response: SearchResponse = self.get_json(url.as_str()).await?;
        Ok(response.data.into_iter().map(PackageMetadata::from).collect())
    }

    #[instrument(skip_all, fields(name = %name))]
    async fn get_metadata(&self, name: &str) -> Result<Vec<PackageMetadata>> {
        let url = format!(
            "{}/{}/index.json",
            self.endpoints.registration_url,
            name.to_ascii_lowercase()
        );

        let index: RegistrationIndex = match self.get_json(&url).await {
            Ok(index) => index,
            Err(AuditError::NotFound { .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut versions = Vec::new();
        for page in index.items {
            let leaves = match page.items {
                Some(leaves) => leaves,
                None => {
                    debug!(page = %page.id, "fetching registration page");
                    self.get_json::<RegistrationIndexPage>(&page.id).await?.items
                }
            };
            versions.extend(
                leaves
                    .into_iter()
                    .map(|leaf| leaf.catalog_entry)
                    .filter(CatalogEntry::is_listed)
                    .map(PackageMetadata::from),
            );
        }

        Ok(versions)
    }

    #[instrument(skip_all, fields(url = %package_url))]
    async fn project_url(&self, package_url: &Url) -> Result<Option<Url>> {
        let html = self
            .get(package_url.as_str())
            .await?
            .text()
            .await
            .map_err(|e| AuditError::Network(format!("{package_url}: failed to read body: {e}")))?;
        extract_project_url(&html)
    }

    fn package_url(&self, name: &str) -> Result<Url> {
        let raw = format!("{}/{name}/", self.endpoints.gallery_url);
        Url::parse(&raw).map_err(|e| AuditError::validation(format!("{raw}: {e}")))
    }
}

/// A registration page fetched on its own.
#[derive(Debug, Deserialize)]
struct RegistrationIndexPage {
    #[serde(default)]
    items: Vec<RegistrationLeaf>,
}

/// Find the project-site link on a gallery package page.
fn extract_project_url(html: &str) -> Result<Option<Url>> {
    let selector = Selector::parse(PROJECT_LINK_SELECTOR)
        .map_err(|e| AuditError::parse(format!("invalid selector: {e}")))?;
    let document = Html::parse_document(html);

    let Some(href) = document
        .select(&selector)
        .find_map(|a| a.value().attr("href"))
    else {
        return Ok(None);
    };

    Url::parse(href.trim())
        .map(Some)
        .map_err(|e| AuditError::parse(format!("invalid project URL {href:?}: {e}")))
}
