//! Pipeline Orchestrator
//!
//! Runs validate, extract, transform and load strictly in sequence, inside the
//! run's tracing span, and emits progress on every phase transition.
//!
//! # Error Handling
//! - Invalid validation report: the run stops before extract, with
//!   [`PipelineError::Validation`]
//! - Extract, item split and load errors are fatal and propagate to the caller
//! - A failed item in the transform loop is counted, logged and skipped
//!
//! Elapsed time is recorded for every phase that ran, on every exit path. A
//! fatal error emits `FAILED` before it is returned; a completed run emits
//! `FINISHED` at 100%.

use super::context::PipelineContext;
use super::destination::Destination;
use super::progress::PhaseProgress;
use super::result::ProcessResult;
use super::statistics::ProcessingStats;
use super::{Phase, Pipeline};
use crate::error::PipelineError;
use legis_common::{ProgressChannel, ProgressEvent, ProgressStatus};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{error, info, warn, Instrument};

/// Drives one [`Pipeline`] into one [`Destination`]
pub struct Orchestrator<P, D>
where
    P: Pipeline,
    D: Destination<P::Output>,
{
    context: PipelineContext,
    pipeline: P,
    destination: D,
    progress: ProgressChannel,
    runs: usize,
}

impl<P, D> Orchestrator<P, D>
where
    P: Pipeline,
    D: Destination<P::Output>,
{
    pub fn new(context: PipelineContext, pipeline: P, destination: D) -> Self {
        context.span.record("pipeline", pipeline.name());
        Self {
            context,
            pipeline,
            destination,
            progress: ProgressChannel::new(),
            runs: 0,
        }
    }

    /// Register a synchronous progress observer
    pub fn on_progress<F>(&mut self, observer: F)
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        self.progress.on_progress(observer);
    }

    /// Receive progress through a bounded queue (see [`ProgressChannel::subscribe`])
    pub fn subscribe_progress(&self, capacity: usize) -> mpsc::Receiver<ProgressEvent> {
        self.progress.subscribe(capacity)
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    pub fn stats(&self) -> &ProcessingStats {
        &self.context.stats
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    /// Events dropped because a subscriber queue was full
    pub fn dropped_progress_events(&self) -> u64 {
        self.progress.dropped_events()
    }

    /// Execute one run
    ///
    /// Each call gets its own run id and span; the first uses the context's.
    pub async fn run(&mut self) -> Result<ProcessResult, PipelineError> {
        if self.runs > 0 {
            self.context.renew();
            self.context.span.record("pipeline", self.pipeline.name());
        }
        self.runs += 1;

        let span = self.context.span.clone();
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&mut self) -> Result<ProcessResult, PipelineError> {
        self.context.stats.reset();
        self.progress.begin_run();

        let started = Instant::now();
        info!(pipeline = self.pipeline.name(), "Pipeline run started");

        let outcome = self.execute().await;
        self.context.stats.timings.total = started.elapsed();

        match outcome {
            Ok(()) => {
                let result = ProcessResult::from_stats(
                    self.context.run_id,
                    self.pipeline.name(),
                    &self.destination.name(),
                    &self.context.stats,
                );
                self.progress
                    .emit_progress(ProgressStatus::Finished, 100, result.summary());
                info!(
                    processed = result.total_processed,
                    successes = result.successes,
                    failures = result.failures,
                    warnings = result.warnings,
                    total_ms = result.timings.total,
                    "Pipeline run finished"
                );
                Ok(result)
            }
            Err(e) => {
                self.progress
                    .emit_progress(ProgressStatus::Failed, 0, e.to_string());
                error!(
                    error = %e,
                    total_ms = self.context.stats.timings.total.as_millis() as u64,
                    "Pipeline run failed"
                );
                Err(e)
            }
        }
    }

    async fn execute(&mut self) -> Result<(), PipelineError> {
        let config = self.context.config.clone();

        // Validate
        self.progress
            .emit_progress(ProgressStatus::Started, 0, "Validating run");
        let phase_start = Instant::now();
        let report = self.pipeline.validate(&self.context).await;
        self.context
            .stats
            .timings
            .record(Phase::Validate, phase_start.elapsed());

        for warning in &report.warnings {
            warn!(phase = %Phase::Validate, "{}", warning);
        }
        self.context.stats.warnings += report.warnings.len();

        if !report.valid {
            let errors = if report.errors.is_empty() {
                vec!["validation failed".to_string()]
            } else {
                report.errors
            };
            return Err(PipelineError::Validation { errors });
        }

        // Extract
        let extract_progress =
            PhaseProgress::new(&self.progress, ProgressStatus::Extracting, config.progress.extract);
        extract_progress.begin("Extracting records");
        let phase_start = Instant::now();
        let raw = self.pipeline.extract(&self.context, &extract_progress).await;
        self.context
            .stats
            .timings
            .record(Phase::Extract, phase_start.elapsed());
        let raw = raw?;

        // Transform
        let transform_progress = PhaseProgress::new(
            &self.progress,
            ProgressStatus::Transforming,
            config.progress.transform,
        );
        transform_progress.begin("Transforming records");
        let phase_start = Instant::now();
        let transformed =
            transform_items(&self.pipeline, &mut self.context, raw, &transform_progress);
        self.context
            .stats
            .timings
            .record(Phase::Transform, phase_start.elapsed());
        let transformed = transformed?;

        // Load
        let load_progress =
            PhaseProgress::new(&self.progress, ProgressStatus::Loading, config.progress.load);
        load_progress.begin(format!("Loading {} records", transformed.len()));
        let phase_start = Instant::now();
        let loaded = self.destination.load(transformed, &load_progress).await;
        self.context
            .stats
            .timings
            .record(Phase::Load, phase_start.elapsed());
        let loaded = loaded?;

        self.context.stats.loaded = loaded.written;
        self.context.stats.successes = loaded.written;
        info!(
            phase = %Phase::Load,
            written = loaded.written,
            batches = loaded.batches,
            "Load complete"
        );

        Ok(())
    }
}

/// Split `raw` into items and transform each one, skipping failed items
fn transform_items<P: Pipeline>(
    pipeline: &P,
    context: &mut PipelineContext,
    raw: P::Raw,
    progress: &PhaseProgress<'_>,
) -> Result<Vec<P::Output>, PipelineError> {
    let items = pipeline.items(context, raw)?;
    let total = items.len();
    context.stats.extracted = total;

    let mut output = Vec::with_capacity(total);
    for (index, item) in items.into_iter().enumerate() {
        match pipeline.transform_item(context, item) {
            Ok(transformed) => output.push(transformed),
            Err(e) => {
                context.stats.record_item_failure();
                warn!(
                    phase = %Phase::Transform,
                    index,
                    key = e.key.as_deref().unwrap_or("-"),
                    error = %e,
                    "Item failed to transform, skipping"
                );
            }
        }
        progress.report(index + 1, total, format!("Transformed {}/{}", index + 1, total));
    }

    context.stats.transformed = output.len();
    info!(
        phase = %Phase::Transform,
        items = total,
        transformed = output.len(),
        failures = total - output.len(),
        "Transform complete"
    );

    Ok(output)
}

impl<P, D> std::fmt::Debug for Orchestrator<P, D>
where
    P: Pipeline,
    D: Destination<P::Output>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("run_id", &self.context.run_id)
            .field("pipeline", &self.pipeline.name())
            .field("destination", &self.destination.name())
            .field("progress", &self.progress)
            .finish()
    }
}
