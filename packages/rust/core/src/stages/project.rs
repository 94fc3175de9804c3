//! Stages that read the cached project files.

use std::collections::BTreeSet;

use async_trait::async_trait;

use auditor_project::{ProjectDocument, extract_references, merge_references};
use auditor_shared::{AuditError, Entity, Result};

use crate::fanout::fan_out;
use crate::pipeline::{Stage, StageContext};

use super::repository::file_name;

const FIND_REFERENCES: &str = "find-references";
const FIND_FRAMEWORKS: &str = "find-frameworks";

/// Text of every project file of `entity`, in `project_paths` order.
///
/// Each listed file must be cached. A missing one is `NotFound`, so a
/// partially downloaded set is never read.
fn cached_projects(ctx: &StageContext, entity: &Entity) -> Result<Vec<(String, String)>> {
    let Some(paths) = &entity.project_paths else {
        return Ok(Vec::new());
    };

    paths
        .iter()
        .map(|path| {
            let file = file_name(path);
            let text = ctx
                .scratch
                .read_artifact(&entity.name, file)?
                .ok_or_else(|| AuditError::not_found(format!("cached project file {file}")))?;
            Ok((file.to_string(), text))
        })
        .collect()
}

/// Parse a project file, naming it in the error.
fn parse<'a>(name: &str, text: &'a str) -> Result<ProjectDocument<'a>> {
    ProjectDocument::parse(text).map_err(|e| match e {
        AuditError::Parse { message } => AuditError::parse(format!("{name}: {message}")),
        other => other,
    })
}

// ---------------------------------------------------------------------------
// find-references
// ---------------------------------------------------------------------------

/// Extracts and merges the package references of all project files.
pub struct FindReferencesStage;

impl FindReferencesStage {
    async fn find(ctx: &StageContext, mut entity: Entity) -> Result<Entity> {
        if !entity.references.is_empty() {
            return Ok(entity);
        }

        let mut raw = Vec::new();
        for (name, text) in cached_projects(ctx, &entity)? {
            let document = parse(&name, &text)?;
            raw.extend(extract_references(&document.declarations()));
        }
        entity.references = merge_references(raw);
        Ok(entity)
    }
}

#[async_trait]
impl Stage for FindReferencesStage {
    fn name(&self) -> &'static str {
        FIND_REFERENCES
    }

    fn description(&self, _ctx: &StageContext) -> String {
        "Finding package references".into()
    }

    async fn execute(&self, ctx: &StageContext, entities: Vec<Entity>) -> Result<Vec<Entity>> {
        let report = fan_out(FIND_REFERENCES, entities, ctx.concurrency(), |entity| {
            Self::find(ctx, entity)
        })
        .await?;
        Ok(report.entities)
    }
}

// ---------------------------------------------------------------------------
// find-frameworks
// ---------------------------------------------------------------------------

/// Collects the target frameworks of all project files.
pub struct FindFrameworksStage;

impl FindFrameworksStage {
    async fn find(ctx: &StageContext, mut entity: Entity) -> Result<Entity> {
        if !entity.frameworks.is_empty() {
            return Ok(entity);
        }

        let mut frameworks = BTreeSet::new();
        for (name, text) in cached_projects(ctx, &entity)? {
            frameworks.extend(parse(&name, &text)?.target_frameworks());
        }
        entity.frameworks = frameworks;
        Ok(entity)
    }
}

#[async_trait]
impl Stage for FindFrameworksStage {
    fn name(&self) -> &'static str {
        FIND_FRAMEWORKS
    }

    fn description(&self, _ctx: &StageContext) -> String {
        "Finding target frameworks".into()
    }

    async fn execute(&self, ctx: &StageContext, entities: Vec<Entity>) -> Result<Vec<Entity>> {
        let report = fan_out(FIND_FRAMEWORKS, entities, ctx.concurrency(), |entity| {
            Self::find(ctx, entity)
        })
        .await?;
        Ok(report.entities)
    }
}
