//! Per-entity download cache.

use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use auditor_shared::{AuditError, Result};

use crate::write_atomic;

/// Cached registry metadata of an entity's most recent package version.
pub const REGISTRY_METADATA_FILE: &str = "registry.json";

/// Directory tree holding one sub-directory per entity.
#[derive(Debug, Clone)]
pub struct ScratchArea {
    root: PathBuf,
}

impl ScratchArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of `entity`. Path separators and other characters that are
    /// unsafe in file names are replaced.
    pub fn entity_dir(&self, entity: &str) -> PathBuf {
        let safe: String = entity
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        let safe = if safe.trim_matches('.').is_empty() {
            "_".to_string()
        } else {
            safe
        };
        self.root.join(safe)
    }

    /// Remove the whole scratch root, checkpoint included.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub fn purge(&self) -> Result<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root).map_err(|e| AuditError::io(&self.root, e))?;
            info!("purged scratch area");
        }
        Ok(())
    }

    /// Create the directory of `entity` and return it.
    pub fn ensure(&self, entity: &str) -> Result<PathBuf> {
        let dir = self.entity_dir(entity);
        std::fs::create_dir_all(&dir).map_err(|e| AuditError::io(&dir, e))?;
        Ok(dir)
    }

    pub fn has_artifact(&self, entity: &str, file: &str) -> bool {
        self.entity_dir(entity).join(file).is_file()
    }

    /// Contents of a cached file, `None` when it was never written.
    pub fn read_artifact(&self, entity: &str, file: &str) -> Result<Option<String>> {
        let path = self.entity_dir(entity).join(file);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AuditError::io(path, e)),
        }
    }

    pub fn write_artifact(&self, entity: &str, file: &str, content: &str) -> Result<PathBuf> {
        let path = self.ensure(entity)?.join(file);
        write_atomic(&path, content.as_bytes())?;
        Ok(path)
    }

    /// Write a file directly under the root (reports).
    pub fn write_file(&self, file: &str, content: &str) -> Result<PathBuf> {
        let path = self.root.join(file);
        write_atomic(&path, content.as_bytes())?;
        Ok(path)
    }
}
