//! Stages backed by registry metadata.

use async_trait::async_trait;
use tracing::debug;

use auditor_discovery::{PackageMetadata, most_recent};
use auditor_shared::{AuditError, Entity, Result};
use auditor_storage::REGISTRY_METADATA_FILE;

use crate::fanout::fan_out;
use crate::pipeline::{Stage, StageContext};

const DOWNLOAD_REGISTRY_METADATA: &str = "download-registry-metadata";
const FIND_ICON: &str = "find-icon";

/// Caches the metadata of each entity's most recent package version.
pub struct DownloadRegistryMetadataStage;

impl DownloadRegistryMetadataStage {
    async fn download(ctx: &StageContext, mut entity: Entity) -> Result<Entity> {
        if ctx.scratch.has_artifact(&entity.name, REGISTRY_METADATA_FILE) {
            return Ok(entity);
        }

        let Some(package) = most_recent(ctx.registry.get_metadata(&entity.name).await?) else {
            debug!(entity = %entity.name, "no published package");
            return Ok(entity);
        };

        let json = serde_json::to_string_pretty(&package)
            .map_err(|e| AuditError::Storage(format!("failed to serialize metadata: {e}")))?;
        ctx.scratch
            .write_artifact(&entity.name, REGISTRY_METADATA_FILE, &json)?;

        if entity.registry_version.is_none() {
            entity.is_prerelease = package.is_prerelease();
            entity.registry_version = Some(package.version);
        }
        Ok(entity)
    }
}

#[async_trait]
impl Stage for DownloadRegistryMetadataStage {
    fn name(&self) -> &'static str {
        DOWNLOAD_REGISTRY_METADATA
    }

    fn description(&self, _ctx: &StageContext) -> String {
        "Downloading package metadata".into()
    }

    async fn execute(&self, ctx: &StageContext, entities: Vec<Entity>) -> Result<Vec<Entity>> {
        let report = fan_out(
            DOWNLOAD_REGISTRY_METADATA,
            entities,
            ctx.concurrency(),
            |entity| Self::download(ctx, entity),
        )
        .await?;
        Ok(report.entities)
    }
}

/// Reads the package icon from the cached metadata.
pub struct FindIconStage;

impl FindIconStage {
    async fn find(ctx: &StageContext, mut entity: Entity) -> Result<Entity> {
        if entity.icon_url.is_some() {
            return Ok(entity);
        }
        let Some(raw) = ctx
            .scratch
            .read_artifact(&entity.name, REGISTRY_METADATA_FILE)?
        else {
            return Ok(entity);
        };

        let package: PackageMetadata = serde_json::from_str(&raw)
            .map_err(|e| AuditError::parse(format!("invalid cached package metadata: {e}")))?;
        entity.icon_url = package.icon_url;
        Ok(entity)
    }
}

#[async_trait]
impl Stage for FindIconStage {
    fn name(&self) -> &'static str {
        FIND_ICON
    }

    fn description(&self, _ctx: &StageContext) -> String {
        "Finding package icons".into()
    }

    async fn execute(&self, ctx: &StageContext, entities: Vec<Entity>) -> Result<Vec<Entity>> {
        let report = fan_out(FIND_ICON, entities, ctx.concurrency(), |entity| {
            Self::find(ctx, entity)
        })
        .await?;
        Ok(report.entities)
    }
}
