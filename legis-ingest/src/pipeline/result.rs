//! Terminal output of a pipeline run

use super::statistics::{ProcessingStats, TimingsMs};
use serde::Serialize;
use uuid::Uuid;

/// Summary of one completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    pub run_id: Uuid,
    pub pipeline: String,
    pub destination: String,
    /// Items that went through the transform phase
    pub total_processed: usize,
    pub successes: usize,
    pub failures: usize,
    pub warnings: usize,
    pub timings: TimingsMs,
}

impl ProcessResult {
    pub fn from_stats(
        run_id: Uuid,
        pipeline: &str,
        destination: &str,
        stats: &ProcessingStats,
    ) -> Self {
        Self {
            run_id,
            pipeline: pipeline.to_string(),
            destination: destination.to_string(),
            total_processed: stats.extracted,
            successes: stats.successes,
            failures: stats.failures,
            warnings: stats.warnings,
            timings: stats.timings.as_millis(),
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failures > 0
    }

    /// One-line summary for logs and terminal output
    pub fn summary(&self) -> String {
        format!(
            "{} -> {}: {} processed, {} succeeded, {} failed, {} warning(s) in {} ms",
            self.pipeline,
            self.destination,
            self.total_processed,
            self.successes,
            self.failures,
            self.warnings,
            self.timings.total
        )
    }
}
