//! Population discovery and per-run reset.

use async_trait::async_trait;
use tracing::{info, warn};

use auditor_discovery::{
    discover_from_registry, discover_from_status_list, discover_from_yaml, merge_discovered,
};
use auditor_shared::{AnalysisResult, Entity, Result};

use crate::pipeline::{Stage, StageContext};

/// Builds the entity set from the YAML descriptors, the status list and the
/// registry. Only runs when there is no checkpointed set to resume from.
pub struct DiscoverStage;

#[async_trait]
impl Stage for DiscoverStage {
    fn name(&self) -> &'static str {
        "discover"
    }

    fn description(&self, ctx: &StageContext) -> String {
        match &ctx.options.addin {
            Some(name) => format!("Discovering {name}"),
            None => "Discovering addins".into(),
        }
    }

    fn precondition_met(&self, _ctx: &StageContext, entities: &[Entity]) -> bool {
        entities.is_empty()
    }

    async fn execute(&self, ctx: &StageContext, _entities: Vec<Entity>) -> Result<Vec<Entity>> {
        let only = ctx.options.addin.as_deref();

        let (from_yaml, from_list, from_registry) = futures::try_join!(
            discover_from_yaml(ctx.github.as_ref(), &ctx.sources, only),
            discover_from_status_list(ctx.github.as_ref(), &ctx.sources, only),
            discover_from_registry(ctx.registry.as_ref(), &ctx.nuget, only),
        )?;

        let entities = merge_discovered(
            from_yaml
                .into_iter()
                .chain(from_list)
                .chain(from_registry),
        );

        if entities.is_empty() {
            warn!(addin = ?only, "no addins discovered");
        } else {
            info!(entities = entities.len(), "discovery complete");
        }
        Ok(entities)
    }
}

/// Clears every entity's analysis so notes and flags reflect this run only.
pub struct ResetAnalysisStage;

#[async_trait]
impl Stage for ResetAnalysisStage {
    fn name(&self) -> &'static str {
        "reset-analysis"
    }

    fn description(&self, _ctx: &StageContext) -> String {
        "Clearing previous analysis".into()
    }

    async fn execute(&self, _ctx: &StageContext, mut entities: Vec<Entity>) -> Result<Vec<Entity>> {
        for entity in &mut entities {
            entity.analysis = AnalysisResult::default();
        }
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use auditor_github::InMemoryRepoClient;
    use auditor_shared::{AuditError, SourceFlags};
    use pretty_assertions::assert_eq;

    use crate::stages::fixtures::{FakeRegistry, context, world};

    #[tokio::test]
    async fn discovers_and_merges_all_sources() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (github, registry) = world();
        let ctx = context(dir.path(), Arc::new(github), registry);

        let mut entities = DiscoverStage
            .execute(&ctx, Vec::new())
            .await
            .expect("discover");
        entities.sort_by(|a, b| a.name.cmp(&b.name));

        let names: Vec<_> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Cake.Bar", "Cake.Baz", "Cake.Foo"]);

        let foo = &entities[2];
        assert_eq!(
            foo.sources,
            SourceFlags::YAML | SourceFlags::WEBSITE_LIST | SourceFlags::REGISTRY
        );
        assert_eq!(foo.maintainer.as_deref(), Some("someone"));

        let baz = &entities[1];
        assert_eq!(baz.sources, SourceFlags::WEBSITE_LIST);
        assert!(baz.repo.is_none());
        assert!(baz.registry_url.is_some());
    }

    #[tokio::test]
    async fn single_addin_mode() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (github, registry) = world();
        let mut ctx = context(dir.path(), Arc::new(github), registry);
        ctx.options.addin = Some("cake.bar".into());

        let entities = DiscoverStage
            .execute(&ctx, Vec::new())
            .await
            .expect("discover");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name, "Cake.Bar");
        assert_eq!(entities[0].sources, SourceFlags::REGISTRY);
    }

    #[tokio::test]
    async fn missing_status_list_fails_the_stage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let github = InMemoryRepoClient::new().with_file(
            "cake-build",
            "website",
            "addins/Cake.Foo.yml",
            "Name: Cake.Foo\n",
        );
        let ctx = context(dir.path(), Arc::new(github), FakeRegistry::default());

        let err = DiscoverStage
            .execute(&ctx, Vec::new())
            .await
            .expect_err("status list missing");
        assert!(matches!(err, AuditError::NotFound { .. }));
    }

    #[test]
    fn only_runs_without_a_checkpoint() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (github, registry) = world();
        let ctx = context(dir.path(), Arc::new(github), registry);
        assert!(DiscoverStage.precondition_met(&ctx, &[]));
        assert!(!DiscoverStage.precondition_met(&ctx, &[Entity::new("Cake.Foo")]));
    }

    #[tokio::test]
    async fn reset_clears_notes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (github, registry) = world();
        let ctx = context(dir.path(), Arc::new(github), registry);

        let mut entity = Entity::new("Cake.Foo");
        entity.note("find-solution", "boom");
        entity.analysis.has_listing = true;
        entity.solution_path = Some("a.sln".into());

        let out = ResetAnalysisStage
            .execute(&ctx, vec![entity])
            .await
            .expect("reset");
        assert_eq!(out[0].analysis, AnalysisResult::default());
        assert_eq!(out[0].solution_path.as_deref(), Some("a.sln"));
    }
}
