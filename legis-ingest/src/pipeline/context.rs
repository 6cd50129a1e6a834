//! Per-run context passed to every phase

use super::statistics::ProcessingStats;
use legis_common::config::IngestConfig;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::Span;
use uuid::Uuid;

/// Run-scoped options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Target collection path
    pub destination: String,
    /// Process at most this many items
    pub limit: Option<usize>,
    /// Keep only items whose field equals the value
    pub filters: BTreeMap<String, String>,
    /// Load into a throwaway sink instead of the real store
    pub dry_run: bool,
}

impl RunOptions {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }
}

/// Options, configuration, log span and running statistics for one run
///
/// Owned by a single orchestrator; never shared between concurrent runs.
#[derive(Debug)]
pub struct PipelineContext {
    pub run_id: Uuid,
    pub options: RunOptions,
    pub config: Arc<IngestConfig>,
    /// Every phase runs inside this span
    pub span: Span,
    pub stats: ProcessingStats,
}

impl PipelineContext {
    pub fn new(options: RunOptions, config: Arc<IngestConfig>) -> Self {
        let run_id = Uuid::new_v4();
        let span = run_span(run_id, &options);

        Self {
            run_id,
            options,
            config,
            span,
            stats: ProcessingStats::default(),
        }
    }

    /// Fresh run id and span for another run with the same options
    pub fn renew(&mut self) {
        self.run_id = Uuid::new_v4();
        self.span = run_span(self.run_id, &self.options);
        self.stats.reset();
    }
}

fn run_span(run_id: Uuid, options: &RunOptions) -> Span {
    tracing::info_span!(
        "pipeline_run",
        run_id = %run_id,
        pipeline = tracing::field::Empty,
        destination = %options.destination,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renew_gives_a_new_run_id_and_clears_stats() {
        let mut context = PipelineContext::new(
            RunOptions::new("senators").with_limit(5),
            Arc::new(IngestConfig::default()),
        );
        let first = context.run_id;
        context.stats.extracted = 3;

        context.renew();

        assert_ne!(context.run_id, first);
        assert_eq!(context.stats.extracted, 0);
        assert_eq!(context.options.limit, Some(5));
    }
}
