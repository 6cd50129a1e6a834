//! Progress events for pipeline runs
//!
//! A run moves through `STARTED → EXTRACTING → TRANSFORMING → LOADING` and ends in
//! exactly one of `FINISHED` or `FAILED`.
//!
//! [`ProgressChannel`] delivers events two ways:
//! - **Observers** registered with [`ProgressChannel::on_progress`] are called
//!   synchronously, in registration order, before `emit_progress` returns.
//! - **Subscribers** created with [`ProgressChannel::subscribe`] receive events over a
//!   bounded queue. Emission never waits on a subscriber; an event that does not fit
//!   is dropped and counted.
//!
//! Emitting with no observers and no subscribers is a no-op, not an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

/// Status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProgressStatus {
    /// Run accepted, validation in progress
    Started,
    /// Pulling raw records from upstream
    Extracting,
    /// Reshaping records item by item
    Transforming,
    /// Writing records to the destination
    Loading,
    /// Run completed (possibly with per-item failures)
    Finished,
    /// Run aborted by a fatal error
    Failed,
}

impl ProgressStatus {
    /// `Finished` and `Failed` end a run
    pub fn is_terminal(self) -> bool {
        matches!(self, ProgressStatus::Finished | ProgressStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::Started => "STARTED",
            ProgressStatus::Extracting => "EXTRACTING",
            ProgressStatus::Transforming => "TRANSFORMING",
            ProgressStatus::Loading => "LOADING",
            ProgressStatus::Finished => "FINISHED",
            ProgressStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status/percent update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub status: ProgressStatus,
    /// Overall run completion, 0-100
    pub percent: u8,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

type Observer = Box<dyn Fn(&ProgressEvent) + Send + Sync>;

#[derive(Debug, Default)]
struct RunState {
    last_percent: u8,
    terminal: Option<ProgressStatus>,
}

/// Observer list plus bounded subscriber queues for progress events
pub struct ProgressChannel {
    observers: Vec<Observer>,
    subscribers: Mutex<Vec<mpsc::Sender<ProgressEvent>>>,
    run: Mutex<RunState>,
    dropped: AtomicU64,
}

impl ProgressChannel {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
            subscribers: Mutex::new(Vec::new()),
            run: Mutex::new(RunState::default()),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a synchronous observer
    ///
    /// Observers run on the emitting task, so they should be quick. Anything slow
    /// belongs behind [`subscribe`](Self::subscribe).
    pub fn on_progress<F>(&mut self, observer: F)
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Subscribe through a bounded queue holding at most `capacity` undelivered events
    ///
    /// Only events emitted after subscription are received.
    pub fn subscribe(&self, capacity: usize) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        lock(&self.subscribers).push(tx);
        rx
    }

    /// Reset per-run state (percent floor, terminal flag)
    pub fn begin_run(&self) {
        *lock(&self.run) = RunState::default();
    }

    /// Emit a progress event
    ///
    /// `percent` is clamped to 100 and raised to the last emitted value, so the
    /// sequence seen by listeners never decreases within a run. Events after a
    /// terminal event are ignored. Returns the event as delivered, or `None` when
    /// it was ignored.
    pub fn emit_progress(
        &self,
        status: ProgressStatus,
        percent: u8,
        message: impl Into<String>,
    ) -> Option<ProgressEvent> {
        let event = {
            let mut run = lock(&self.run);
            if let Some(terminal) = run.terminal {
                tracing::debug!(
                    terminal = %terminal,
                    ignored = %status,
                    "Progress event after terminal status ignored"
                );
                return None;
            }

            let percent = percent.min(100).max(run.last_percent);
            run.last_percent = percent;
            if status.is_terminal() {
                run.terminal = Some(status);
            }

            ProgressEvent {
                status,
                percent,
                message: message.into(),
                timestamp: crate::time::now(),
            }
        };

        for observer in &self.observers {
            observer(&event);
        }

        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(status = %event.status, "Progress subscriber full, event dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });

        Some(event)
    }

    /// Number of registered synchronous observers
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Number of live queue subscribers
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).iter().filter(|tx| !tx.is_closed()).count()
    }

    /// Events dropped because a subscriber queue was full
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProgressChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressChannel")
            .field("observers", &self.observers.len())
            .field("subscribers", &self.subscriber_count())
            .field("dropped", &self.dropped_events())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_emit_without_listeners_is_noop() {
        let channel = ProgressChannel::new();

        let event = channel.emit_progress(ProgressStatus::Started, 0, "starting");

        assert!(event.is_some());
        assert_eq!(channel.observer_count(), 0);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_observers_called_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut channel = ProgressChannel::new();

        for name in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            channel.on_progress(move |event| {
                seen.lock().unwrap().push(format!("{}:{}", name, event.percent));
            });
        }

        channel.emit_progress(ProgressStatus::Extracting, 10, "extracting");

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first:10", "second:10", "third:10"]
        );
    }

    #[test]
    fn test_percent_never_decreases() {
        let channel = ProgressChannel::new();

        channel.emit_progress(ProgressStatus::Extracting, 40, "a");
        let lower = channel.emit_progress(ProgressStatus::Transforming, 30, "b").unwrap();
        let over = channel.emit_progress(ProgressStatus::Loading, 180, "c").unwrap();

        assert_eq!(lower.percent, 40);
        assert_eq!(over.percent, 100);
    }

    #[test]
    fn test_terminal_status_ends_run() {
        let channel = ProgressChannel::new();

        channel.emit_progress(ProgressStatus::Failed, 20, "boom");
        assert!(channel
            .emit_progress(ProgressStatus::Finished, 100, "late")
            .is_none());

        channel.begin_run();
        let restarted = channel.emit_progress(ProgressStatus::Started, 0, "again").unwrap();
        assert_eq!(restarted.percent, 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let channel = ProgressChannel::new();
        let mut rx = channel.subscribe(8);

        channel.emit_progress(ProgressStatus::Started, 0, "start");
        channel.emit_progress(ProgressStatus::Finished, 100, "done");

        assert_eq!(rx.recv().await.unwrap().status, ProgressStatus::Started);
        assert_eq!(rx.recv().await.unwrap().status, ProgressStatus::Finished);
    }

    #[test]
    fn test_full_subscriber_drops_instead_of_blocking() {
        let channel = ProgressChannel::new();
        let _rx = channel.subscribe(1);

        channel.emit_progress(ProgressStatus::Started, 0, "kept");
        channel.emit_progress(ProgressStatus::Extracting, 5, "dropped");
        channel.emit_progress(ProgressStatus::Extracting, 10, "dropped");

        assert_eq!(channel.dropped_events(), 2);
    }

    #[test]
    fn test_closed_subscriber_is_pruned() {
        let channel = ProgressChannel::new();
        let rx = channel.subscribe(4);
        drop(rx);

        channel.emit_progress(ProgressStatus::Started, 0, "start");

        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&ProgressStatus::Transforming).unwrap();
        assert_eq!(json, "\"TRANSFORMING\"");
        assert!(ProgressStatus::Finished.is_terminal());
        assert!(!ProgressStatus::Loading.is_terminal());
    }
}
