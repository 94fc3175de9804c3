//! Shared types, error model, and configuration for the addin auditor.
//!
//! This crate is the foundation depended on by all other auditor crates.
//! It provides:
//! - [`AuditError`], the unified error type
//! - Domain types ([`Entity`], [`AnalysisResult`], [`NormalizedReference`], [`SourceFlags`])
//! - Configuration ([`AppConfig`], [`AuditOptions`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AuditOptions, ComplianceConfig, DefaultsConfig, GitHubConfig, NuGetConfig,
    ReportConfig, SourcesConfig, config_dir, config_file_path, github_token, init_config,
    load_config, load_config_from, validate_github_token,
};
pub use error::{AuditError, Result};
pub use types::{
    AnalysisResult, Entity, IssueLocator, NormalizedReference, RepoLocator, SourceFlags,
    TrackedDependency, UNKNOWN_VERSION,
};
