//! Per-entity compliance analysis.

use auditor_shared::{
    AnalysisResult, ComplianceConfig, Entity, SourceFlags, TrackedDependency,
};

use crate::version::{is_up_to_date, normalize_version};

/// Stage name used to prefix notes produced by the analysis.
const ANALYZE: &str = "analyze";

/// The expectations every addin is measured against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceRules {
    pub recommended_version: String,
    pub expected_framework: String,
    pub expected_icon_url: String,
    pub core_dependency: String,
    pub common_dependency: String,
}

impl ComplianceRules {
    pub fn from_config(config: &ComplianceConfig, recommended_version: impl Into<String>) -> Self {
        Self {
            recommended_version: recommended_version.into(),
            expected_framework: config.expected_framework.clone(),
            expected_icon_url: config.expected_icon_url.clone(),
            core_dependency: config.core_dependency.clone(),
            common_dependency: config.common_dependency.clone(),
        }
    }

    fn track(&self, entity: &Entity, identifier: &str) -> TrackedDependency {
        match entity.reference(identifier) {
            Some(reference) => {
                let version = normalize_version(&reference.version);
                TrackedDependency {
                    is_up_to_date: is_up_to_date(&version, &self.recommended_version),
                    is_private: reference.is_private,
                    version,
                }
            }
            // Not referenced: nothing to fix for this dependency.
            None => TrackedDependency {
                version: String::new(),
                is_up_to_date: true,
                is_private: true,
            },
        }
    }
}

/// Recompute the analysis for one entity.
///
/// All derived flags are rebuilt from the entity's enriched attributes.
/// Notes already recorded this run (recoverable failures from earlier
/// stages) are kept, and compliance gaps that exclude the entity from the
/// main report are appended.
pub fn analyze(entity: &Entity, rules: &ComplianceRules) -> AnalysisResult {
    let core = rules.track(entity, &rules.core_dependency);
    let common = rules.track(entity, &rules.common_dependency);

    let targets_expected_framework =
        entity.frameworks.len() == 1 && entity.frameworks.contains(&rules.expected_framework);

    let uses_expected_icon = entity
        .icon_url
        .as_deref()
        .is_some_and(|icon| icon == rules.expected_icon_url);

    let mut notes = entity.analysis.notes.clone();
    let mut note = |message: String| notes.push(format!("{ANALYZE}: {message}"));

    if entity.repo.is_none() {
        note(
            "We were unable to determine the GitHub repo URL. Most likely this means that the \
             package metadata does not specify a project URL pointing to a GitHub repository."
                .to_string(),
        );
    } else if !core.is_referenced() && !common.is_referenced() {
        note(format!(
            "This addin seems to be referencing neither {} nor {}.",
            rules.core_dependency, rules.common_dependency
        ));
    }

    if entity.is_deprecated {
        note("This addin is deprecated.".to_string());
    }

    AnalysisResult {
        core,
        common,
        targets_expected_framework,
        uses_expected_icon,
        has_listing: entity.sources.contains(SourceFlags::YAML),
        notes,
    }
}
