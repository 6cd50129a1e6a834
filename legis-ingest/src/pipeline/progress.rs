//! Per-phase progress reporting

use legis_common::config::PhaseRange;
use legis_common::{ProgressChannel, ProgressStatus};
use std::sync::atomic::{AtomicI16, Ordering};

/// Reports progress for one phase within its slice of the 0-100 range
///
/// `report(completed, total)` maps to `round(completed / total * weight) + start`.
/// Reports that would not move the percent are skipped.
pub struct PhaseProgress<'a> {
    channel: &'a ProgressChannel,
    status: ProgressStatus,
    range: PhaseRange,
    last_percent: AtomicI16,
}

impl<'a> PhaseProgress<'a> {
    pub fn new(channel: &'a ProgressChannel, status: ProgressStatus, range: PhaseRange) -> Self {
        Self {
            channel,
            status,
            range,
            last_percent: AtomicI16::new(-1),
        }
    }

    /// Announce the phase at the start of its range
    pub fn begin(&self, message: impl Into<String>) {
        self.emit(self.range.start, message);
    }

    pub fn report(&self, completed: usize, total: usize, message: impl Into<String>) {
        let percent = self.range.percent(completed, total);
        if i16::from(percent) <= self.last_percent.load(Ordering::Relaxed) {
            return;
        }
        self.emit(percent, message);
    }

    pub fn status(&self) -> ProgressStatus {
        self.status
    }

    pub fn range(&self) -> PhaseRange {
        self.range
    }

    fn emit(&self, percent: u8, message: impl Into<String>) {
        self.last_percent.store(i16::from(percent), Ordering::Relaxed);
        self.channel.emit_progress(self.status, percent, message);
    }
}

impl std::fmt::Debug for PhaseProgress<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseProgress")
            .field("status", &self.status)
            .field("range", &self.range)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use legis_common::ProgressEvent;
    use std::sync::{Arc, Mutex};

    fn recording_channel() -> (ProgressChannel, Arc<Mutex<Vec<ProgressEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mut channel = ProgressChannel::new();
        channel.on_progress(move |event| sink.lock().unwrap().push(event.clone()));
        (channel, events)
    }

    #[test]
    fn test_reports_scale_into_phase_range() {
        let (channel, events) = recording_channel();
        let progress =
            PhaseProgress::new(&channel, ProgressStatus::Extracting, PhaseRange::new(0, 50));

        progress.begin("Extracting");
        for done in 1..=4 {
            progress.report(done, 4, format!("{done}/4"));
        }

        let percents: Vec<u8> = events.lock().unwrap().iter().map(|e| e.percent).collect();
        // 12.5 rounds to 13, 37.5 to 38
        assert_eq!(percents, vec![0, 13, 25, 38, 50]);
    }

    #[test]
    fn test_reports_that_do_not_move_percent_are_skipped() {
        let (channel, events) = recording_channel();
        let progress =
            PhaseProgress::new(&channel, ProgressStatus::Loading, PhaseRange::new(75, 100));

        progress.begin("Loading");
        for done in 1..=1_000 {
            progress.report(done, 1_000, "writing");
        }

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 26);
        assert_eq!(events.last().map(|e| e.percent), Some(100));
        assert!(events.iter().all(|e| e.status == ProgressStatus::Loading));
    }
}
