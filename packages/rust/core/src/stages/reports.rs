//! Report publication.

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use auditor_github::FileCommit;
use auditor_report::{ReportOptions, render_markdown};
use auditor_shared::{Entity, Result};

use crate::pipeline::{Stage, StageContext};

/// Renders the markdown report to the scratch root and/or commits it to the
/// report repo.
pub struct MarkdownReportStage;

#[async_trait]
impl Stage for MarkdownReportStage {
    fn name(&self) -> &'static str {
        "markdown-report"
    }

    fn description(&self, _ctx: &StageContext) -> String {
        "Generating markdown report".into()
    }

    fn precondition_met(&self, ctx: &StageContext, _entities: &[Entity]) -> bool {
        ctx.options.markdown_to_file || ctx.options.markdown_to_repo
    }

    async fn execute(&self, ctx: &StageContext, entities: Vec<Entity>) -> Result<Vec<Entity>> {
        let markdown = render_markdown(&entities, &ReportOptions::from(&ctx.rules), Utc::now());

        if ctx.options.markdown_to_file {
            let path = ctx.scratch.write_file(&ctx.report.file_name, &markdown)?;
            info!(path = %path.display(), "wrote markdown report");
        }

        if ctx.options.markdown_to_repo {
            let report = &ctx.report;
            let commit = FileCommit {
                branch: report.branch.clone(),
                path: report.path.clone(),
                content: markdown,
                message: report.commit_message.clone(),
            };
            let handle = ctx
                .github
                .commit_file(&report.owner, &report.repo, &commit)
                .await?;
            info!(
                repo = %format!("{}/{}", report.owner, report.repo),
                path = %report.path,
                sha = %handle.sha,
                "committed markdown report"
            );
        }

        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use auditor_github::InMemoryRepoClient;
    use pretty_assertions::assert_eq;

    use crate::stages::fixtures::{FakeRegistry, context};

    #[tokio::test]
    async fn writes_file_and_commits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let github = Arc::new(InMemoryRepoClient::new().with_file(
            "cake-contrib",
            "Home",
            "Status.md",
            "",
        ));
        let mut ctx = context(dir.path(), github.clone(), FakeRegistry::default());
        ctx.options.markdown_to_file = true;
        ctx.options.markdown_to_repo = true;

        let entities = vec![Entity::new("Cake.Foo")];
        let out = MarkdownReportStage
            .execute(&ctx, entities.clone())
            .await
            .expect("report");
        assert_eq!(out, entities);

        let written = std::fs::read_to_string(dir.path().join("AddinDiscoveryReport.md"))
            .expect("report file");
        assert!(written.contains("# Addins"));

        let commits = github.commits();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].1.path, "Audit.md");
        assert_eq!(commits[0].1.branch, "master");
        assert_eq!(commits[0].1.message, "Update addin audit");
        assert_eq!(commits[0].1.content, written);
    }

    #[test]
    fn skipped_without_a_destination() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = context(
            dir.path(),
            Arc::new(InMemoryRepoClient::new()),
            FakeRegistry::default(),
        );
        assert!(!MarkdownReportStage.precondition_met(&ctx, &[]));
    }
}
