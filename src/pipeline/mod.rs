//! Lead-sourcing pipeline: stages, orchestration and persistence.

pub mod json_extract;
pub mod orchestrator;
pub mod persistence;
pub mod steps;

pub use orchestrator::{Pipeline, PipelineRun, Providers};
pub use persistence::{persist_candidates, PersistSummary};
