//! Application configuration for the addin auditor.
//!
//! User config lives at `~/.addin-auditor/auditor.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "auditor.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".addin-auditor";

/// Scratch folder created under the system temp directory.
const SCRATCH_DIR_NAME: &str = "Cake.AddinDiscoverer";

// ---------------------------------------------------------------------------
// Config structs (matching auditor.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Source-hosting platform settings.
    #[serde(default)]
    pub github: GitHubConfig,

    /// Package registry settings.
    #[serde(default)]
    pub nuget: NuGetConfig,

    /// Where addins are discovered from besides the registry.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Compliance expectations.
    #[serde(default)]
    pub compliance: ComplianceConfig,

    /// Report publishing.
    #[serde(default)]
    pub report: ReportConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Scratch directory. Defaults to `<system temp>/Cake.AddinDiscoverer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<String>,

    /// Concurrent per-entity operations per stage (0 = unbounded).
    #[serde(default)]
    pub concurrency: usize,

    /// Maximum directory depth searched for the solution file.
    #[serde(default = "default_max_search_depth")]
    pub max_search_depth: usize,

    /// Cake version addins are expected to reference.
    #[serde(default = "default_recommended_version")]
    pub recommended_version: String,

    /// Per-request timeout for remote calls, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            concurrency: 0,
            max_search_depth: default_max_search_depth(),
            recommended_version: default_recommended_version(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_max_search_depth() -> usize {
    16
}
fn default_recommended_version() -> String {
    "0.26.0".into()
}
fn default_request_timeout() -> u64 {
    30
}

/// `[github]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// REST API root.
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Name of the env var holding the token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Name of the env var holding the account that files audit issues.
    #[serde(default = "default_username_env")]
    pub username_env: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            token_env: default_token_env(),
            username_env: default_username_env(),
        }
    }
}

fn default_github_api_url() -> String {
    "https://api.github.com".into()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_username_env() -> String {
    "GITHUB_USERNAME".into()
}

/// `[nuget]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NuGetConfig {
    /// Search query service endpoint.
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// Registration (per-package metadata) base URL.
    #[serde(default = "default_registration_url")]
    pub registration_url: String,

    /// Gallery package page base URL.
    #[serde(default = "default_gallery_url")]
    pub gallery_url: String,

    /// Search term sent to the registry.
    #[serde(default = "default_search_term")]
    pub search_term: String,

    /// Only package ids starting with this prefix are audited.
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,

    /// Search page size.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for NuGetConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            registration_url: default_registration_url(),
            gallery_url: default_gallery_url(),
            search_term: default_search_term(),
            id_prefix: default_id_prefix(),
            page_size: default_page_size(),
        }
    }
}

fn default_search_url() -> String {
    "https://azuresearch-usnc.nuget.org/query".into()
}
fn default_registration_url() -> String {
    "https://api.nuget.org/v3/registration5-semver1".into()
}
fn default_gallery_url() -> String {
    "https://www.nuget.org/packages".into()
}
fn default_search_term() -> String {
    "Cake".into()
}
fn default_id_prefix() -> String {
    "Cake.".into()
}
fn default_page_size() -> usize {
    50
}

/// `[sources]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_website_owner")]
    pub website_owner: String,
    #[serde(default = "default_website_repo")]
    pub website_repo: String,
    /// Directory of YAML addin descriptors in the website repo.
    #[serde(default = "default_addins_path")]
    pub addins_path: String,

    #[serde(default = "default_home_owner")]
    pub home_owner: String,
    #[serde(default = "default_home_repo")]
    pub home_repo: String,
    /// Markdown status list in the home repo.
    #[serde(default = "default_status_file")]
    pub status_file: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            website_owner: default_website_owner(),
            website_repo: default_website_repo(),
            addins_path: default_addins_path(),
            home_owner: default_home_owner(),
            home_repo: default_home_repo(),
            status_file: default_status_file(),
        }
    }
}

fn default_website_owner() -> String {
    "cake-build".into()
}
fn default_website_repo() -> String {
    "website".into()
}
fn default_addins_path() -> String {
    "addins".into()
}
fn default_home_owner() -> String {
    "cake-contrib".into()
}
fn default_home_repo() -> String {
    "home".into()
}
fn default_status_file() -> String {
    "Status.md".into()
}

/// `[compliance]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceConfig {
    /// The single framework addins should target.
    #[serde(default = "default_expected_framework")]
    pub expected_framework: String,

    /// Canonical package icon.
    #[serde(default = "default_expected_icon_url")]
    pub expected_icon_url: String,

    #[serde(default = "default_core_dependency")]
    pub core_dependency: String,

    #[serde(default = "default_common_dependency")]
    pub common_dependency: String,

    /// Title of the issues filed by the audit. Also used to find earlier ones.
    #[serde(default = "default_issue_title")]
    pub issue_title: String,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            expected_framework: default_expected_framework(),
            expected_icon_url: default_expected_icon_url(),
            core_dependency: default_core_dependency(),
            common_dependency: default_common_dependency(),
            issue_title: default_issue_title(),
        }
    }
}

fn default_expected_framework() -> String {
    "netstandard2.0".into()
}
fn default_expected_icon_url() -> String {
    "https://cdn.rawgit.com/cake-contrib/graphics/a5cf0f881c390650144b2243ae551d5b9f836196/png/cake-contrib-medium.png".into()
}
fn default_core_dependency() -> String {
    "Cake.Core".into()
}
fn default_common_dependency() -> String {
    "Cake.Common".into()
}
fn default_issue_title() -> String {
    "Recommended changes resulting from automated audit".into()
}

/// `[report]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Local report file name, written under the scratch directory.
    #[serde(default = "default_report_file")]
    pub file_name: String,

    #[serde(default = "default_home_owner")]
    pub owner: String,
    #[serde(default = "default_report_repo")]
    pub repo: String,
    #[serde(default = "default_report_branch")]
    pub branch: String,
    /// Path of the report inside the repo.
    #[serde(default = "default_report_path")]
    pub path: String,
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            file_name: default_report_file(),
            owner: default_home_owner(),
            repo: default_report_repo(),
            branch: default_report_branch(),
            path: default_report_path(),
            commit_message: default_commit_message(),
        }
    }
}

fn default_report_file() -> String {
    "AddinDiscoveryReport.md".into()
}
fn default_report_repo() -> String {
    "Home".into()
}
fn default_report_branch() -> String {
    "master".into()
}
fn default_report_path() -> String {
    "Audit.md".into()
}
fn default_commit_message() -> String {
    "Update addin audit".into()
}

// ---------------------------------------------------------------------------
// Audit options (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime audit configuration, merged from the config file and CLI flags.
#[derive(Debug, Clone)]
pub struct AuditOptions {
    /// Audit a single addin instead of the whole population.
    pub addin: Option<String>,
    /// Purge the scratch area (checkpoint included) before running.
    pub clear_cache: bool,
    /// File compliance issues on addin repositories.
    pub create_issues: bool,
    /// Write the markdown report under the scratch directory.
    pub markdown_to_file: bool,
    /// Commit the markdown report to the configured repo.
    pub markdown_to_repo: bool,
    pub recommended_version: String,
    pub temp_dir: PathBuf,
    /// 0 = unbounded.
    pub concurrency: usize,
    pub max_search_depth: usize,
}

impl From<&AppConfig> for AuditOptions {
    fn from(config: &AppConfig) -> Self {
        let temp_dir = match &config.defaults.temp_dir {
            Some(dir) => PathBuf::from(dir),
            None => std::env::temp_dir().join(SCRATCH_DIR_NAME),
        };

        Self {
            addin: None,
            clear_cache: false,
            create_issues: false,
            markdown_to_file: false,
            markdown_to_repo: false,
            recommended_version: config.defaults.recommended_version.clone(),
            temp_dir,
            concurrency: config.defaults.concurrency,
            max_search_depth: config.defaults.max_search_depth,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.addin-auditor/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| AuditError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.addin-auditor/auditor.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AuditError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| AuditError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AuditError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AuditError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AuditError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the GitHub token if its env var is set and non-empty.
pub fn github_token(config: &AppConfig) -> Option<String> {
    std::env::var(&config.github.token_env)
        .ok()
        .filter(|t| !t.is_empty())
}

/// Check that the GitHub token env var is set and non-empty.
pub fn validate_github_token(config: &AppConfig) -> Result<String> {
    let var_name = &config.github.token_env;
    github_token(config).ok_or_else(|| {
        AuditError::config(format!(
            "GitHub token not found. Set the {var_name} environment variable.\n\
             Filing issues and committing the report require an authenticated account."
        ))
    })
}
