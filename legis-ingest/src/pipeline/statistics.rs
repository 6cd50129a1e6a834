//! Running counters for one pipeline run

use super::Phase;
use serde::Serialize;
use std::time::Duration;

/// Elapsed time per phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    pub validate: Duration,
    pub extract: Duration,
    pub transform: Duration,
    pub load: Duration,
    /// Whole run, including event emission between phases
    pub total: Duration,
}

impl PhaseTimings {
    pub fn record(&mut self, phase: Phase, elapsed: Duration) {
        match phase {
            Phase::Validate => self.validate = elapsed,
            Phase::Extract => self.extract = elapsed,
            Phase::Transform => self.transform = elapsed,
            Phase::Load => self.load = elapsed,
        }
    }

    pub fn get(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Validate => self.validate,
            Phase::Extract => self.extract,
            Phase::Transform => self.transform,
            Phase::Load => self.load,
        }
    }

    pub fn as_millis(&self) -> TimingsMs {
        TimingsMs {
            validate: self.validate.as_millis() as u64,
            extract: self.extract.as_millis() as u64,
            transform: self.transform.as_millis() as u64,
            load: self.load.as_millis() as u64,
            total: self.total.as_millis() as u64,
        }
    }
}

/// [`PhaseTimings`] in whole milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimingsMs {
    pub validate: u64,
    pub extract: u64,
    pub transform: u64,
    pub load: u64,
    pub total: u64,
}

/// Counters for one run, reset when the run starts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    /// Items handed to the transform phase
    pub extracted: usize,
    /// Items that transformed successfully
    pub transformed: usize,
    /// Items written by the destination
    pub loaded: usize,
    pub successes: usize,
    pub failures: usize,
    pub warnings: usize,
    pub timings: PhaseTimings,
}

impl ProcessingStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_item_failure(&mut self) {
        self.failures += 1;
        self.warnings += 1;
    }
}
