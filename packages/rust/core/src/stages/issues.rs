//! Compliance issues on addin repositories.

use async_trait::async_trait;
use tracing::info;

use auditor_report::issue_body;
use auditor_shared::{Entity, IssueLocator, Result};

use crate::fanout::fan_out;
use crate::pipeline::{Stage, StageContext};

const FIND_ISSUE: &str = "find-issue";
const CREATE_ISSUE: &str = "create-issue";

/// Links each entity to an issue the audit already filed, if still open.
pub struct FindIssueStage;

impl FindIssueStage {
    async fn find(ctx: &StageContext, mut entity: Entity) -> Result<Entity> {
        let Some(repo) = entity.repo.clone() else {
            return Ok(entity);
        };
        if entity.issue.is_some() {
            return Ok(entity);
        }

        let issues = ctx
            .github
            .list_open_issues(&repo.owner, &repo.name, &ctx.issue_creator)
            .await?;
        entity.issue = issues
            .iter()
            .find(|issue| issue.title == ctx.issue_title)
            .map(IssueLocator::from);
        Ok(entity)
    }
}

#[async_trait]
impl Stage for FindIssueStage {
    fn name(&self) -> &'static str {
        FIND_ISSUE
    }

    fn description(&self, _ctx: &StageContext) -> String {
        "Finding existing audit issues".into()
    }

    fn precondition_met(&self, ctx: &StageContext, _entities: &[Entity]) -> bool {
        ctx.options.create_issues
    }

    async fn execute(&self, ctx: &StageContext, entities: Vec<Entity>) -> Result<Vec<Entity>> {
        let report = fan_out(FIND_ISSUE, entities, ctx.concurrency(), |entity| {
            Self::find(ctx, entity)
        })
        .await?;
        Ok(report.entities)
    }
}

/// Files an issue listing the recommended changes, unless one is already
/// open or there is nothing to recommend.
pub struct CreateIssueStage;

impl CreateIssueStage {
    async fn create(ctx: &StageContext, mut entity: Entity) -> Result<Entity> {
        let Some(repo) = entity.repo.clone() else {
            return Ok(entity);
        };
        if entity.issue.is_some() {
            return Ok(entity);
        }
        let Some(body) = issue_body(&entity, &ctx.rules) else {
            return Ok(entity);
        };

        let issue = ctx
            .github
            .create_issue(&repo.owner, &repo.name, &ctx.issue_title, &body)
            .await?;
        info!(entity = %entity.name, url = %issue.url, "filed issue");
        entity.issue = Some(issue);
        Ok(entity)
    }
}

#[async_trait]
impl Stage for CreateIssueStage {
    fn name(&self) -> &'static str {
        CREATE_ISSUE
    }

    fn description(&self, _ctx: &StageContext) -> String {
        "Filing audit issues".into()
    }

    fn precondition_met(&self, ctx: &StageContext, _entities: &[Entity]) -> bool {
        ctx.options.create_issues
    }

    async fn execute(&self, ctx: &StageContext, entities: Vec<Entity>) -> Result<Vec<Entity>> {
        let report = fan_out(CREATE_ISSUE, entities, ctx.concurrency(), |entity| {
            Self::create(ctx, entity)
        })
        .await?;
        Ok(report.entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use auditor_github::{InMemoryRepoClient, IssueSummary};
    use auditor_report::ISSUE_TITLE;
    use auditor_shared::{AuditError, RepoLocator};
    use pretty_assertions::assert_eq;

    use crate::stages::fixtures::{FakeRegistry, context};

    fn entity(name: &str, owner: &str) -> Entity {
        let mut entity = Entity::new(name);
        entity.repo = Some(RepoLocator::new(owner, name));
        entity
    }

    fn issue(number: u64, title: &str, creator: &str) -> IssueSummary {
        IssueSummary {
            number,
            title: title.into(),
            url: format!("https://github.com/a/Cake.Foo/issues/{number}"),
            creator: creator.into(),
        }
    }

    #[tokio::test]
    async fn finds_issue_by_title_and_creator() {
        let dir = tempfile::tempdir().expect("tempdir");
        let github = InMemoryRepoClient::new()
            .with_file("a", "Cake.Foo", "README.md", "")
            .with_issue("a", "Cake.Foo", issue(1, "Unrelated", "auditor-bot"))
            .with_issue("a", "Cake.Foo", issue(2, ISSUE_TITLE, "someone-else"))
            .with_issue("a", "Cake.Foo", issue(3, ISSUE_TITLE, "auditor-bot"));
        let ctx = context(dir.path(), Arc::new(github), FakeRegistry::default());

        let out = FindIssueStage
            .execute(&ctx, vec![entity("Cake.Foo", "a")])
            .await
            .expect("find");
        assert_eq!(out[0].issue.as_ref().map(|i| i.number), Some(3));
    }

    #[tokio::test]
    async fn creates_issue_only_when_needed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let github = Arc::new(
            InMemoryRepoClient::new()
                .with_file("a", "Cake.Foo", "README.md", "")
                .with_file("b", "Cake.Clean", "README.md", ""),
        );
        let ctx = context(dir.path(), github.clone(), FakeRegistry::default());

        let needs_changes = entity("Cake.Foo", "a");
        let mut clean = entity("Cake.Clean", "b");
        clean.analysis.core.is_private = true;
        clean.analysis.common.is_private = true;
        clean.analysis.targets_expected_framework = true;
        clean.analysis.uses_expected_icon = true;
        clean.analysis.has_listing = true;
        let mut without_repo = Entity::new("Cake.NoRepo");
        without_repo.analysis = needs_changes.analysis.clone();

        let out = CreateIssueStage
            .execute(&ctx, vec![needs_changes, clean, without_repo])
            .await
            .expect("create");

        let filed: Vec<_> = out.iter().filter(|e| e.issue.is_some()).collect();
        assert_eq!(filed.len(), 1);
        assert_eq!(filed[0].name, "Cake.Foo");
        let issues = github.issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].1.title, ISSUE_TITLE);
    }

    #[tokio::test]
    async fn rate_limit_aborts_the_stage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let github = InMemoryRepoClient::new()
            .with_failure("a", "Cake.Foo", || AuditError::RateLimited { reset_at: None });
        let ctx = context(dir.path(), Arc::new(github), FakeRegistry::default());

        let err = FindIssueStage
            .execute(&ctx, vec![entity("Cake.Foo", "a")])
            .await
            .expect_err("rate limited");
        assert!(err.is_stage_fatal());
    }

    #[test]
    fn disabled_unless_requested() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ctx = context(
            dir.path(),
            Arc::new(InMemoryRepoClient::new()),
            FakeRegistry::default(),
        );
        assert!(!FindIssueStage.precondition_met(&ctx, &[]));
        assert!(!CreateIssueStage.precondition_met(&ctx, &[]));
        ctx.options.create_issues = true;
        assert!(FindIssueStage.precondition_met(&ctx, &[]));
        assert!(CreateIssueStage.precondition_met(&ctx, &[]));
    }
}
