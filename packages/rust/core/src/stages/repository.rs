//! Stages that locate and download an addin's sources.

use async_trait::async_trait;
use tracing::debug;

use auditor_project::project_paths;
use auditor_shared::{AuditError, Entity, RepoLocator, Result};

use crate::fanout::fan_out;
use crate::pipeline::{Stage, StageContext};

const RESOLVE_PROJECT_URL: &str = "resolve-project-url";
const FIND_SOLUTION: &str = "find-solution";
const FIND_PROJECTS: &str = "find-projects";
const DOWNLOAD_PROJECTS: &str = "download-projects";

/// Last segment of a `/`-separated repo path. Project files are cached
/// under it.
pub(super) fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

// ---------------------------------------------------------------------------
// resolve-project-url
// ---------------------------------------------------------------------------

/// Fills in the repo of registry-only entities from their package page.
pub struct ResolveProjectUrlStage;

impl ResolveProjectUrlStage {
    async fn resolve(ctx: &StageContext, mut entity: Entity) -> Result<Entity> {
        if entity.repo.is_some() {
            return Ok(entity);
        }
        let Some(package_url) = entity.registry_url.clone() else {
            return Ok(entity);
        };

        if let Some(project_url) = ctx.registry.project_url(&package_url).await? {
            entity.repo = RepoLocator::parse(project_url.as_str());
            if entity.repo.is_none() {
                debug!(entity = %entity.name, %project_url, "project URL is not a GitHub repo");
            }
        }
        Ok(entity)
    }
}

#[async_trait]
impl Stage for ResolveProjectUrlStage {
    fn name(&self) -> &'static str {
        RESOLVE_PROJECT_URL
    }

    fn description(&self, _ctx: &StageContext) -> String {
        "Resolving project URLs from package pages".into()
    }

    async fn execute(&self, ctx: &StageContext, entities: Vec<Entity>) -> Result<Vec<Entity>> {
        let report = fan_out(RESOLVE_PROJECT_URL, entities, ctx.concurrency(), |entity| {
            Self::resolve(ctx, entity)
        })
        .await?;
        Ok(report.entities)
    }
}

// ---------------------------------------------------------------------------
// find-solution
// ---------------------------------------------------------------------------

/// Finds the best candidate solution file in each repo.
pub struct FindSolutionStage;

impl FindSolutionStage {
    async fn find(ctx: &StageContext, mut entity: Entity) -> Result<Entity> {
        let Some(repo) = entity.repo.clone() else {
            return Ok(entity);
        };
        if entity.solution_path.is_some() {
            return Ok(entity);
        }

        match ctx.locator("sln").locate(&repo, None).await {
            Ok(Some(solution)) => entity.solution_path = Some(solution.path),
            Ok(None) => entity.note(FIND_SOLUTION, "No solution file found in the repository"),
            Err(AuditError::NotFound { .. }) => entity.note(
                FIND_SOLUTION,
                format_args!("The project does not exist: {}", repo.url),
            ),
            Err(e) => return Err(e),
        }
        Ok(entity)
    }
}

#[async_trait]
impl Stage for FindSolutionStage {
    fn name(&self) -> &'static str {
        FIND_SOLUTION
    }

    fn description(&self, _ctx: &StageContext) -> String {
        "Finding solution files".into()
    }

    async fn execute(&self, ctx: &StageContext, entities: Vec<Entity>) -> Result<Vec<Entity>> {
        let report = fan_out(FIND_SOLUTION, entities, ctx.concurrency(), |entity| {
            Self::find(ctx, entity)
        })
        .await?;
        Ok(report.entities)
    }
}

// ---------------------------------------------------------------------------
// find-projects
// ---------------------------------------------------------------------------

/// Reads each solution file and records the C# projects it references.
pub struct FindProjectsStage;

impl FindProjectsStage {
    const NO_PROJECTS: &'static str = "The solution file does not reference any project";

    async fn find(ctx: &StageContext, mut entity: Entity) -> Result<Entity> {
        let (Some(repo), Some(solution)) = (entity.repo.clone(), entity.solution_path.clone())
        else {
            return Ok(entity);
        };

        let paths = match entity.project_paths.take() {
            Some(paths) => paths,
            None => {
                let content = ctx
                    .github
                    .get_file_content(&repo.owner, &repo.name, &solution)
                    .await?;
                project_paths(&solution, &content)
            }
        };

        if paths.is_empty() {
            entity.note(FIND_PROJECTS, Self::NO_PROJECTS);
        }
        entity.project_paths = Some(paths);
        Ok(entity)
    }
}

#[async_trait]
impl Stage for FindProjectsStage {
    fn name(&self) -> &'static str {
        FIND_PROJECTS
    }

    fn description(&self, _ctx: &StageContext) -> String {
        "Finding projects referenced by solutions".into()
    }

    async fn execute(&self, ctx: &StageContext, entities: Vec<Entity>) -> Result<Vec<Entity>> {
        let report = fan_out(FIND_PROJECTS, entities, ctx.concurrency(), |entity| {
            Self::find(ctx, entity)
        })
        .await?;
        Ok(report.entities)
    }
}

// ---------------------------------------------------------------------------
// download-projects
// ---------------------------------------------------------------------------

/// Copies project files into the scratch area. Files already cached are not
/// downloaded again.
pub struct DownloadProjectsStage;

impl DownloadProjectsStage {
    async fn download(ctx: &StageContext, entity: Entity) -> Result<Entity> {
        let (Some(repo), Some(paths)) = (&entity.repo, &entity.project_paths) else {
            return Ok(entity);
        };

        for path in paths {
            let file = file_name(path);
            if ctx.scratch.has_artifact(&entity.name, file) {
                continue;
            }
            let content = ctx
                .github
                .get_file_content(&repo.owner, &repo.name, path)
                .await?;
            ctx.scratch.write_artifact(&entity.name, file, &content)?;
            debug!(entity = %entity.name, %path, "downloaded project file");
        }
        Ok(entity)
    }
}

#[async_trait]
impl Stage for DownloadProjectsStage {
    fn name(&self) -> &'static str {
        DOWNLOAD_PROJECTS
    }

    fn description(&self, _ctx: &StageContext) -> String {
        "Downloading project files".into()
    }

    async fn execute(&self, ctx: &StageContext, entities: Vec<Entity>) -> Result<Vec<Entity>> {
        let report = fan_out(DOWNLOAD_PROJECTS, entities, ctx.concurrency(), |entity| {
            Self::download(ctx, entity)
        })
        .await?;
        Ok(report.entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use auditor_github::InMemoryRepoClient;
    use pretty_assertions::assert_eq;

    use crate::stages::fixtures::{FakeRegistry, context, world};

    fn with_repo(name: &str, owner: &str) -> Entity {
        let mut entity = Entity::new(name);
        entity.repo = Some(RepoLocator::new(owner, name));
        entity
    }

    #[tokio::test]
    async fn resolves_repo_from_package_page() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (github, registry) = world();
        let ctx = context(dir.path(), Arc::new(github), registry);

        let mut baz = Entity::new("Cake.Baz");
        baz.registry_url = Some(
            "https://www.nuget.org/packages/Cake.Baz/"
                .parse()
                .expect("url"),
        );
        let unknown = Entity::new("Cake.Unknown");

        let mut out = ResolveProjectUrlStage
            .execute(&ctx, vec![baz, unknown])
            .await
            .expect("resolve");
        out.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(out[0].repo, Some(RepoLocator::new("third", "Cake.Baz")));
        assert_eq!(out[1].repo, None);
    }

    #[tokio::test]
    async fn finds_solution_or_notes_missing_repo() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (github, registry) = world();
        let ctx = context(dir.path(), Arc::new(github), registry);

        let mut out = FindSolutionStage
            .execute(
                &ctx,
                vec![with_repo("Cake.Foo", "someone"), with_repo("Cake.Baz", "third")],
            )
            .await
            .expect("find");
        out.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(out[0].solution_path, None);
        assert_eq!(
            out[0].analysis.notes,
            vec!["find-solution: The project does not exist: https://github.com/third/Cake.Baz"]
        );
        assert_eq!(out[1].solution_path.as_deref(), Some("Source/Cake.Foo.sln"));
        assert!(out[1].analysis.notes.is_empty());
    }

    #[tokio::test]
    async fn project_lookup_excludes_tests_and_is_remembered() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (github, registry) = world();
        let github = Arc::new(github);
        let ctx = context(dir.path(), github.clone(), registry);

        let mut foo = with_repo("Cake.Foo", "someone");
        foo.solution_path = Some("Source/Cake.Foo.sln".into());

        let out = FindProjectsStage
            .execute(&ctx, vec![foo])
            .await
            .expect("find");
        assert_eq!(
            out[0].project_paths,
            Some(vec!["Source/Cake.Foo/Cake.Foo.csproj".to_string()])
        );

        let requests = github.request_count();
        FindProjectsStage.execute(&ctx, out).await.expect("again");
        assert_eq!(github.request_count(), requests);
    }

    #[tokio::test]
    async fn empty_solution_is_noted_on_every_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let github = InMemoryRepoClient::new().with_file("a", "Cake.Empty", "Cake.Empty.sln", "");
        let ctx = context(dir.path(), Arc::new(github), FakeRegistry::default());

        let mut empty = with_repo("Cake.Empty", "a");
        empty.solution_path = Some("Cake.Empty.sln".into());

        let first = FindProjectsStage
            .execute(&ctx, vec![empty])
            .await
            .expect("find");
        assert_eq!(first[0].project_paths, Some(Vec::new()));

        let mut resumed = first.clone();
        resumed[0].analysis.notes.clear();
        let second = FindProjectsStage
            .execute(&ctx, resumed)
            .await
            .expect("find");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn downloads_are_cached() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (github, registry) = world();
        let github = Arc::new(github);
        let ctx = context(dir.path(), github.clone(), registry);

        let mut foo = with_repo("Cake.Foo", "someone");
        foo.project_paths = Some(vec!["Source/Cake.Foo/Cake.Foo.csproj".into()]);

        let out = DownloadProjectsStage
            .execute(&ctx, vec![foo])
            .await
            .expect("download");
        assert!(ctx.scratch.has_artifact("Cake.Foo", "Cake.Foo.csproj"));

        let requests = github.request_count();
        DownloadProjectsStage.execute(&ctx, out).await.expect("again");
        assert_eq!(github.request_count(), requests);
    }

    #[tokio::test]
    async fn failed_download_becomes_a_note() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (github, registry) = world();
        let ctx = context(dir.path(), Arc::new(github), registry);

        let mut foo = with_repo("Cake.Foo", "someone");
        foo.project_paths = Some(vec!["Source/Missing.csproj".into()]);

        let out = DownloadProjectsStage
            .execute(&ctx, vec![foo])
            .await
            .expect("download");
        assert_eq!(out[0].analysis.notes.len(), 1);
        assert!(out[0].analysis.notes[0].starts_with("download-projects: not found"));
    }

    #[test]
    fn file_name_is_last_segment() {
        assert_eq!(file_name("Source/Cake.Foo/Cake.Foo.csproj"), "Cake.Foo.csproj");
        assert_eq!(file_name("Cake.Foo.csproj"), "Cake.Foo.csproj");
    }
}
