//! Pipeline orchestration
//!
//! A run is four strictly sequential phases:
//!
//! | Phase | Per-item failure | Phase-level failure |
//! |---|---|---|
//! | validate | n/a | fatal, nothing is extracted |
//! | extract | n/a | fatal |
//! | transform | counted, logged, item skipped | fatal |
//! | load | handled by the destination | fatal |
//!
//! Implement [`Pipeline`] for the extract/transform side and [`Destination`] for
//! the load side, then drive both with an [`Orchestrator`].

pub mod context;
pub mod destination;
pub mod orchestrator;
pub mod progress;
pub mod result;
pub mod statistics;

pub use context::{PipelineContext, RunOptions};
pub use destination::{Destination, JsonFileDestination, LoadResult, StoreDestination};
pub use orchestrator::Orchestrator;
pub use progress::PhaseProgress;
pub use result::ProcessResult;
pub use statistics::{PhaseTimings, ProcessingStats, TimingsMs};

use crate::error::{ItemError, PipelineError};
use async_trait::async_trait;
use serde::Serialize;

/// Pipeline phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Validate,
    Extract,
    Transform,
    Load,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Validate => "validate",
            Phase::Extract => "extract",
            Phase::Transform => "transform",
            Phase::Load => "load",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the validate phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Report from collected messages; valid when `errors` is empty
    pub fn from_messages(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    pub fn ok() -> Self {
        Self::from_messages(Vec::new(), Vec::new())
    }
}

/// Extract and transform side of a pipeline
///
/// `items` splits the raw extraction into independent items; an error there is
/// fatal. `transform_item` then runs once per item, and an [`ItemError`] only
/// drops that item.
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Extraction output
    type Raw: Send;
    /// One unit of transform work
    type Item: Send;
    /// Transformed item handed to the destination
    type Output: Send + 'static;

    fn name(&self) -> &str;

    async fn validate(&self, ctx: &PipelineContext) -> ValidationReport;

    async fn extract(
        &self,
        ctx: &PipelineContext,
        progress: &PhaseProgress<'_>,
    ) -> Result<Self::Raw, PipelineError>;

    fn items(
        &self,
        ctx: &PipelineContext,
        raw: Self::Raw,
    ) -> Result<Vec<Self::Item>, PipelineError>;

    fn transform_item(
        &self,
        ctx: &PipelineContext,
        item: Self::Item,
    ) -> Result<Self::Output, ItemError>;
}
