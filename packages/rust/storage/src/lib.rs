//! On-disk state of an audit run.
//!
//! Two stores live under the scratch root (`<temp>/Cake.AddinDiscoverer/`):
//! - [`JsonCheckpoint`]: the entity set, rewritten after every stage
//! - [`ScratchArea`]: per-entity cached downloads (project files, registry
//!   metadata)
//!
//! The CLI is the only writer of both.

mod checkpoint;
mod scratch;

pub use checkpoint::{CHECKPOINT_FILE, CheckpointStore, JsonCheckpoint, SCHEMA_VERSION};
pub use scratch::{REGISTRY_METADATA_FILE, ScratchArea};

use std::path::Path;

use auditor_shared::{AuditError, Result};

/// Write `content` to `target` through a sibling temp file and a rename, so
/// readers never observe a partial file.
pub(crate) fn write_atomic(target: &Path, content: &[u8]) -> Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| AuditError::Storage(format!("no parent for {}", target.display())))?;
    std::fs::create_dir_all(parent).map_err(|e| AuditError::io(parent, e))?;

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = parent.join(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| AuditError::io(&temp, e))?;
    std::fs::rename(&temp, target).map_err(|e| AuditError::io(target, e))?;
    Ok(())
}
