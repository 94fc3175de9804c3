//! Concurrent per-entity enrichment.

use std::future::Future;
use std::num::NonZeroUsize;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use auditor_shared::{AuditError, Entity, Result};

/// How many entity operations may be in flight at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    Unbounded,
    Bounded(NonZeroUsize),
}

impl Concurrency {
    /// `0` means unbounded.
    pub fn from_limit(limit: usize) -> Self {
        NonZeroUsize::new(limit).map_or(Self::Unbounded, Self::Bounded)
    }

    fn width(self, items: usize) -> usize {
        match self {
            Self::Unbounded => items.max(1),
            Self::Bounded(n) => n.get(),
        }
    }
}

/// Result of a fan-out: one entity out for every entity in.
#[derive(Debug)]
pub struct FanOutReport {
    /// In completion order.
    pub entities: Vec<Entity>,
    /// Entities whose operation failed and were kept unchanged with a note.
    pub failed: usize,
}

/// Run `op` over every entity.
///
/// A failed operation leaves the entity as it was before `op` ran, plus a
/// `"{stage}: {error}"` note; its siblings are unaffected. Stage-fatal errors
/// are held until every operation has finished, then the first one is
/// returned.
pub async fn fan_out<F, Fut>(
    stage: &str,
    entities: Vec<Entity>,
    concurrency: Concurrency,
    op: F,
) -> Result<FanOutReport>
where
    F: Fn(Entity) -> Fut,
    Fut: Future<Output = Result<Entity>>,
{
    let total = entities.len();
    let width = concurrency.width(total);

    let results: Vec<(Entity, Result<Entity>)> = stream::iter(entities)
        .map(|entity| {
            let original = entity.clone();
            let pending = op(entity);
            async move { (original, pending.await) }
        })
        .buffer_unordered(width)
        .collect()
        .await;

    let mut out = Vec::with_capacity(total);
    let mut failed = 0;
    let mut fatal: Option<AuditError> = None;

    for (original, result) in results {
        match result {
            Ok(entity) => out.push(entity),
            Err(e) => {
                failed += 1;
                warn!(stage, entity = %original.name, error = %e, "entity operation failed");
                let mut entity = original;
                if e.is_stage_fatal() {
                    fatal.get_or_insert(e);
                } else {
                    entity.note(stage, &e);
                }
                out.push(entity);
            }
        }
    }

    if let Some(e) = fatal {
        return Err(e);
    }

    info!(stage, entities = total, failed, "fan-out complete");
    Ok(FanOutReport {
        entities: out,
        failed,
    })
}
