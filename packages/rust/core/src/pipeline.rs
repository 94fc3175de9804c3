//! Staged audit pipeline: load checkpoint → run each stage → checkpoint.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{error, info, instrument};

use auditor_discovery::RegistryClient;
use auditor_github::{FileLocator, RepoContentClient};
use auditor_rules::ComplianceRules;
use auditor_shared::{
    AppConfig, AuditError, AuditOptions, Entity, NuGetConfig, ReportConfig, Result, SourcesConfig,
};
use auditor_storage::{CheckpointStore, ScratchArea};

use crate::fanout::Concurrency;
use crate::stages;

// ---------------------------------------------------------------------------
// StageContext
// ---------------------------------------------------------------------------

/// Everything a stage may read: run options, settings, and the remote
/// collaborators.
pub struct StageContext {
    pub options: AuditOptions,
    pub rules: ComplianceRules,
    pub sources: SourcesConfig,
    pub nuget: NuGetConfig,
    pub report: ReportConfig,
    /// Title of filed issues.
    pub issue_title: String,
    /// Account that files issues. Existing issues are looked up by it.
    pub issue_creator: String,
    pub github: Arc<dyn RepoContentClient>,
    pub registry: Arc<dyn RegistryClient>,
    pub scratch: ScratchArea,
}

impl StageContext {
    pub fn new(
        config: &AppConfig,
        options: AuditOptions,
        github: Arc<dyn RepoContentClient>,
        registry: Arc<dyn RegistryClient>,
    ) -> Self {
        let rules = ComplianceRules::from_config(&config.compliance, &options.recommended_version);
        let scratch = ScratchArea::new(&options.temp_dir);
        Self {
            rules,
            sources: config.sources.clone(),
            nuget: config.nuget.clone(),
            report: config.report.clone(),
            issue_title: config.compliance.issue_title.clone(),
            issue_creator: String::new(),
            github,
            registry,
            scratch,
            options,
        }
    }

    pub fn with_issue_creator(mut self, creator: impl Into<String>) -> Self {
        self.issue_creator = creator.into();
        self
    }

    pub fn concurrency(&self) -> Concurrency {
        Concurrency::from_limit(self.options.concurrency)
    }

    /// Best-candidate search for files with `extension` in a repo.
    pub fn locator(&self, extension: &str) -> FileLocator {
        FileLocator::new(self.github.clone(), extension).with_max_depth(self.options.max_search_depth)
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One step of the audit. Takes the whole entity set and returns it.
///
/// A stage never removes entities. Failures specific to one entity are
/// recorded as notes on it; an `Err` aborts the run.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-line summary shown while the stage runs.
    fn description(&self, ctx: &StageContext) -> String;

    /// Whether the stage has anything to do. A stage whose precondition is
    /// not met is skipped, which is not an error.
    fn precondition_met(&self, _ctx: &StageContext, _entities: &[Entity]) -> bool {
        true
    }

    async fn execute(&self, ctx: &StageContext, entities: Vec<Entity>) -> Result<Vec<Entity>>;
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Progress callbacks for a pipeline run.
pub trait PipelineObserver: Send + Sync {
    fn stage_started(&self, name: &str, description: &str);
    fn stage_skipped(&self, name: &str);
    fn stage_completed(&self, name: &str, entities: usize, elapsed: Duration);
    fn stage_failed(&self, name: &str, error: &AuditError);
}

/// No-op observer for headless/test usage.
pub struct SilentObserver;

impl PipelineObserver for SilentObserver {
    fn stage_started(&self, _name: &str, _description: &str) {}
    fn stage_skipped(&self, _name: &str) {}
    fn stage_completed(&self, _name: &str, _entities: usize, _elapsed: Duration) {}
    fn stage_failed(&self, _name: &str, _error: &AuditError) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Result of a pipeline run.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// The set after the last stage that completed.
    pub entities: Vec<Entity>,
    pub completed: Vec<&'static str>,
    pub skipped: Vec<&'static str>,
    /// `(stage, error)` when the run stopped early.
    pub aborted_at: Option<(String, String)>,
}

impl PipelineOutcome {
    pub fn is_complete(&self) -> bool {
        self.aborted_at.is_none()
    }
}

pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// The full audit, in order.
    pub fn standard() -> Self {
        Self::new(stages::standard())
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage against the checkpointed set.
    ///
    /// A stage error (or a failed checkpoint write) stops the run and is
    /// reported through [`PipelineOutcome::aborted_at`]; the checkpoint on
    /// disk then holds the last completed stage's output. Only a failure to
    /// load the initial checkpoint is returned as `Err`.
    #[instrument(skip_all, fields(stages = self.stages.len()))]
    pub async fn run(
        &self,
        ctx: &StageContext,
        store: &dyn CheckpointStore,
        observer: &dyn PipelineObserver,
    ) -> Result<PipelineOutcome> {
        let start = Instant::now();
        let mut outcome = PipelineOutcome {
            entities: store.load()?,
            completed: Vec::new(),
            skipped: Vec::new(),
            aborted_at: None,
        };
        info!(entities = outcome.entities.len(), "starting audit");

        for stage in &self.stages {
            let name = stage.name();

            if !stage.precondition_met(ctx, &outcome.entities) {
                info!(stage = name, "precondition not met, skipping");
                observer.stage_skipped(name);
                outcome.skipped.push(name);
                continue;
            }

            let description = stage.description(ctx);
            info!(stage = name, %description, "running stage");
            observer.stage_started(name, &description);
            let stage_start = Instant::now();

            let result = match stage.execute(ctx, outcome.entities.clone()).await {
                Ok(entities) => store.save(&entities).map(|()| entities),
                Err(e) => Err(e),
            };

            match result {
                Ok(entities) => {
                    let elapsed = stage_start.elapsed();
                    info!(
                        stage = name,
                        entities = entities.len(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "stage complete"
                    );
                    observer.stage_completed(name, entities.len(), elapsed);
                    outcome.entities = entities;
                    outcome.completed.push(name);
                }
                Err(e) => {
                    error!(stage = name, error = %e, "stage failed, aborting run");
                    observer.stage_failed(name, &e);
                    outcome.aborted_at = Some((name.to_string(), e.to_string()));
                    break;
                }
            }
        }

        info!(
            completed = outcome.completed.len(),
            skipped = outcome.skipped.len(),
            aborted = outcome.aborted_at.is_some(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "audit finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use auditor_github::InMemoryRepoClient;
    use auditor_storage::JsonCheckpoint;
    use pretty_assertions::assert_eq;

    use crate::stages::fixtures::{context, world};

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        fn push(&self, event: String) {
            if let Ok(mut events) = self.events.lock() {
                events.push(event);
            }
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().map(|e| e.clone()).unwrap_or_default()
        }
    }

    impl PipelineObserver for RecordingObserver {
        fn stage_started(&self, name: &str, _description: &str) {
            self.push(format!("start {name}"));
        }
        fn stage_skipped(&self, name: &str) {
            self.push(format!("skip {name}"));
        }
        fn stage_completed(&self, name: &str, _entities: usize, _elapsed: Duration) {
            self.push(format!("done {name}"));
        }
        fn stage_failed(&self, name: &str, _error: &AuditError) {
            self.push(format!("fail {name}"));
        }
    }

    fn by_name(mut entities: Vec<Entity>) -> Vec<Entity> {
        entities.sort_by(|a, b| a.name.cmp(&b.name));
        entities
    }

    fn fresh_run_context(dir: &std::path::Path) -> StageContext {
        let (github, registry) = world();
        let mut ctx = context(dir, Arc::new(github), registry);
        ctx.options.markdown_to_file = true;
        ctx
    }

    #[tokio::test]
    async fn full_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = fresh_run_context(dir.path());
        let store = JsonCheckpoint::in_dir(dir.path());
        let observer = RecordingObserver::default();

        let outcome = Pipeline::standard()
            .run(&ctx, &store, &observer)
            .await
            .expect("run");

        assert!(outcome.is_complete());
        assert_eq!(outcome.skipped, vec!["find-issue", "create-issue"]);
        assert_eq!(outcome.completed.len(), 12);
        assert_eq!(observer.events().first().map(String::as_str), Some("start discover"));

        let entities = by_name(outcome.entities.clone());
        let names: Vec<_> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Cake.Bar", "Cake.Baz", "Cake.Foo"]);

        let bar = &entities[0];
        assert!(bar.analysis.is_clean());
        assert_eq!(bar.analysis.common.version, "0.22.0");
        assert!(!bar.analysis.common.is_up_to_date);
        assert!(!bar.analysis.common.is_private);
        assert!(!bar.analysis.targets_expected_framework);
        assert!(!bar.analysis.has_listing);

        let baz = &entities[1];
        assert_eq!(baz.repo.as_ref().map(|r| r.owner.as_str()), Some("third"));
        assert_eq!(
            baz.analysis.notes,
            vec![
                "find-solution: The project does not exist: https://github.com/third/Cake.Baz",
                "analyze: This addin seems to be referencing neither Cake.Core nor Cake.Common.",
            ]
        );

        let foo = &entities[2];
        assert!(foo.analysis.is_clean());
        assert_eq!(foo.analysis.core.version, "0.26.0");
        assert!(foo.analysis.core.is_up_to_date);
        assert!(foo.analysis.core.is_private);
        assert!(foo.analysis.targets_expected_framework);
        assert!(foo.analysis.uses_expected_icon);
        assert!(foo.analysis.has_listing);

        assert_eq!(by_name(store.load().expect("checkpoint")), entities);

        let report = std::fs::read_to_string(dir.path().join("AddinDiscoveryReport.md"))
            .expect("report");
        assert!(report.contains("[Cake.Foo](https://github.com/someone/Cake.Foo)"));
        assert!(report.contains("**Cake.Baz**:"));
    }

    #[tokio::test]
    async fn rerun_from_checkpoint_matches_first_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = fresh_run_context(dir.path());
        let store = JsonCheckpoint::in_dir(dir.path());
        let pipeline = Pipeline::standard();

        let first = pipeline
            .run(&ctx, &store, &SilentObserver)
            .await
            .expect("first run");
        let second = pipeline
            .run(&ctx, &store, &SilentObserver)
            .await
            .expect("second run");

        assert!(second.skipped.contains(&"discover"));
        assert_eq!(by_name(second.entities), by_name(first.entities));
    }

    #[tokio::test]
    async fn abort_keeps_last_good_checkpoint_and_resumes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonCheckpoint::in_dir(dir.path());
        let pipeline = Pipeline::standard();

        let (github, registry) = world();
        let github =
            github.with_failure("other", "Cake.Bar", || AuditError::RateLimited { reset_at: None });
        let mut failing = context(dir.path(), Arc::new(github), registry);
        failing.options.markdown_to_file = true;
        let observer = RecordingObserver::default();

        let aborted = pipeline
            .run(&failing, &store, &observer)
            .await
            .expect("run");

        let (stage, message) = aborted.aborted_at.clone().expect("aborted");
        assert_eq!(stage, "find-solution");
        assert_eq!(message, "rate limited");
        assert_eq!(
            aborted.completed,
            vec!["discover", "reset-analysis", "resolve-project-url"]
        );
        assert_eq!(observer.events().last().map(String::as_str), Some("fail find-solution"));
        assert_eq!(
            by_name(store.load().expect("checkpoint")),
            by_name(aborted.entities.clone())
        );

        let resumed = pipeline
            .run(&fresh_run_context(dir.path()), &store, &SilentObserver)
            .await
            .expect("resume");
        assert!(resumed.is_complete());

        let other = tempfile::tempdir().expect("tempdir");
        let uninterrupted = pipeline
            .run(
                &fresh_run_context(other.path()),
                &JsonCheckpoint::in_dir(other.path()),
                &SilentObserver,
            )
            .await
            .expect("uninterrupted");

        assert_eq!(by_name(resumed.entities), by_name(uninterrupted.entities));
    }

    #[tokio::test]
    async fn unreadable_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonCheckpoint::in_dir(dir.path());
        std::fs::write(store.path(), "garbage").expect("write");

        let ctx = context(
            dir.path(),
            Arc::new(InMemoryRepoClient::new()),
            crate::stages::fixtures::FakeRegistry::default(),
        );
        let result = Pipeline::standard().run(&ctx, &store, &SilentObserver).await;
        assert!(matches!(result, Err(AuditError::Storage(_))));
    }

    #[test]
    fn standard_stage_order() {
        assert_eq!(
            Pipeline::standard().stage_names(),
            vec![
                "discover",
                "reset-analysis",
                "resolve-project-url",
                "find-solution",
                "find-projects",
                "download-projects",
                "download-registry-metadata",
                "find-references",
                "find-frameworks",
                "find-issue",
                "find-icon",
                "analyze",
                "create-issue",
                "markdown-report",
            ]
        );
    }
}
