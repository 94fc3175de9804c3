//! Compliance analysis over the enriched set.

use async_trait::async_trait;
use tracing::info;

use auditor_rules::analyze;
use auditor_shared::{Entity, Result};

use crate::pipeline::{Stage, StageContext};

/// Evaluates every entity against the compliance rules.
pub struct AnalyzeStage;

#[async_trait]
impl Stage for AnalyzeStage {
    fn name(&self) -> &'static str {
        "analyze"
    }

    fn description(&self, ctx: &StageContext) -> String {
        format!(
            "Analyzing addins against Cake {}",
            ctx.rules.recommended_version
        )
    }

    async fn execute(&self, ctx: &StageContext, mut entities: Vec<Entity>) -> Result<Vec<Entity>> {
        for entity in &mut entities {
            entity.analysis = analyze(entity, &ctx.rules);
        }

        let exceptions = entities.iter().filter(|e| !e.analysis.is_clean()).count();
        info!(entities = entities.len(), exceptions, "analysis complete");
        Ok(entities)
    }
}
