//! Entity set checkpoint.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use auditor_shared::{AuditError, Entity, Result};

use crate::write_atomic;

/// File name of the checkpoint inside the scratch root.
pub const CHECKPOINT_FILE: &str = "CakeAddins.json";

/// Version of the envelope layout. Bumped whenever [`Entity`] changes shape.
pub const SCHEMA_VERSION: u32 = 1;

/// Persistence of the entity set between stages.
pub trait CheckpointStore: Send + Sync {
    /// The last saved set, or an empty one when nothing was saved yet.
    fn load(&self) -> Result<Vec<Entity>>;

    /// Replace the saved set.
    fn save(&self, entities: &[Entity]) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    schema_version: u32,
    run_id: Uuid,
    saved_at: DateTime<Utc>,
    content_hash: String,
    entities: Vec<Entity>,
}

/// Checkpoint stored as a single JSON document.
#[derive(Debug, Clone)]
pub struct JsonCheckpoint {
    path: PathBuf,
    run_id: Uuid,
}

impl JsonCheckpoint {
    /// Checkpoint at `path`. Every save from this handle carries the same
    /// run id.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            run_id: Uuid::now_v7(),
        }
    }

    /// Checkpoint at the conventional location under a scratch root.
    pub fn in_dir(root: &Path) -> Self {
        Self::new(root.join(CHECKPOINT_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

fn content_hash(entities: &[Entity]) -> Result<String> {
    let bytes = serde_json::to_vec(entities)
        .map_err(|e| AuditError::Storage(format!("failed to serialize entities: {e}")))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

impl CheckpointStore for JsonCheckpoint {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn load(&self) -> Result<Vec<Entity>> {
        if !self.path.exists() {
            debug!("no checkpoint");
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&self.path).map_err(|e| AuditError::io(&self.path, e))?;
        let envelope: Envelope = serde_json::from_str(&raw)
            .map_err(|e| AuditError::Storage(format!("corrupt checkpoint: {e}")))?;

        if envelope.schema_version != SCHEMA_VERSION {
            return Err(AuditError::Storage(format!(
                "checkpoint schema_version {} not supported (expected {SCHEMA_VERSION})",
                envelope.schema_version
            )));
        }

        let actual = content_hash(&envelope.entities)?;
        if actual != envelope.content_hash {
            return Err(AuditError::Storage(format!(
                "checkpoint content hash mismatch (expected {}, found {actual})",
                envelope.content_hash
            )));
        }

        info!(
            entities = envelope.entities.len(),
            run_id = %envelope.run_id,
            saved_at = %envelope.saved_at,
            "loaded checkpoint"
        );
        Ok(envelope.entities)
    }

    #[instrument(skip_all, fields(path = %self.path.display(), entities = entities.len()))]
    fn save(&self, entities: &[Entity]) -> Result<()> {
        let envelope = Envelope {
            schema_version: SCHEMA_VERSION,
            run_id: self.run_id,
            saved_at: Utc::now(),
            content_hash: content_hash(entities)?,
            entities: entities.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&envelope)
            .map_err(|e| AuditError::Storage(format!("failed to serialize checkpoint: {e}")))?;

        write_atomic(&self.path, &json)?;
        debug!(bytes = json.len(), "saved checkpoint");
        Ok(())
    }
}
