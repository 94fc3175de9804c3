//! Error types for the addin auditor.
//!
//! Library crates use [`AuditError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all auditor operations.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level HTTP failure (connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// A remote resource (repository, file, package) does not exist.
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// Credentials were rejected by the remote service.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The remote service's rate limit is exhausted.
    #[error("rate limited{}", .reset_at.as_ref().map(|r| format!(" until {r}")).unwrap_or_default())]
    RateLimited { reset_at: Option<String> },

    /// Unexpected non-success status from a remote API.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Project file, solution file, or response body parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Checkpoint or scratch-area storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AuditError>;

impl AuditError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a not-found error naming the missing resource.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must abort the whole stage rather than be recorded
    /// against a single entity.
    pub fn is_stage_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = AuditError::config("missing GitHub token");
        assert_eq!(err.to_string(), "config error: missing GitHub token");

        let err = AuditError::validation("schema_version 99 not supported");
        assert!(err.to_string().contains("schema_version 99"));

        let err = AuditError::RateLimited {
            reset_at: Some("1700000000".into()),
        };
        assert_eq!(err.to_string(), "rate limited until 1700000000");
        assert_eq!(
            AuditError::RateLimited { reset_at: None }.to_string(),
            "rate limited"
        );
    }

    #[test]
    fn only_credential_and_quota_errors_are_stage_fatal() {
        assert!(AuditError::Unauthorized("bad token".into()).is_stage_fatal());
        assert!(AuditError::RateLimited { reset_at: None }.is_stage_fatal());

        assert!(!AuditError::not_found("cake-contrib/Cake.Foo").is_stage_fatal());
        assert!(!AuditError::Network("timeout".into()).is_stage_fatal());
        assert!(!AuditError::parse("bad xml").is_stage_fatal());
        assert!(
            !AuditError::Api {
                status: 500,
                message: "boom".into()
            }
            .is_stage_fatal()
        );
    }
}
