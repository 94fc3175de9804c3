//! Audit pipeline orchestration.
//!
//! A run loads the checkpointed entity set, then hands it through a fixed
//! sequence of [`Stage`]s. Each stage enriches or evaluates every entity
//! (usually concurrently, see [`fanout`]) and the set is checkpointed after
//! each one, so an interrupted run resumes where it stopped.

pub mod fanout;
pub mod pipeline;
pub mod stages;

pub use fanout::{Concurrency, FanOutReport, fan_out};
pub use pipeline::{
    Pipeline, PipelineObserver, PipelineOutcome, SilentObserver, Stage, StageContext,
};
