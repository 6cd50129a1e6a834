//! Shared test doubles for legis-ingest integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use legis_common::config::IngestConfig;
use legis_common::ProgressEvent;
use legis_ingest::fetcher::{decode_payload, FetchError, RecordSource};
use legis_ingest::pipeline::{
    Destination, LoadResult, PhaseProgress, Pipeline, PipelineContext, RunOptions,
    ValidationReport,
};
use legis_ingest::store::batch::{BatchOperation, Document};
use legis_ingest::store::{Address, DocumentStore, StoreError};
use legis_ingest::{ItemError, PipelineError};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Context with default configuration for `destination`
pub fn context(destination: &str) -> PipelineContext {
    context_with(RunOptions::new(destination), IngestConfig::default())
}

pub fn context_with(options: RunOptions, config: IngestConfig) -> PipelineContext {
    PipelineContext::new(options, Arc::new(config))
}

/// Document from a JSON object literal
pub fn doc(value: Value) -> Document {
    value.as_object().cloned().expect("test document must be a JSON object")
}

/// Observer that appends every event to a shared list
pub fn event_log() -> (
    Arc<Mutex<Vec<ProgressEvent>>>,
    impl Fn(&ProgressEvent) + Send + Sync + 'static,
) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    (events, move |event: &ProgressEvent| {
        sink.lock().unwrap().push(event.clone())
    })
}

/// Call counters shared between a [`ScriptedPipeline`] and the test
#[derive(Debug, Default)]
pub struct Calls {
    pub validate: AtomicUsize,
    pub extract: AtomicUsize,
    pub items: AtomicUsize,
    pub transform: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Pipeline over integers with scripted outcomes
///
/// Each item `n` transforms to `"item-n"`, except items listed in `failing`.
pub struct ScriptedPipeline {
    pub report: ValidationReport,
    pub records: Vec<i64>,
    pub extract_error: Option<String>,
    pub items_error: Option<String>,
    pub failing: Vec<i64>,
    pub calls: Arc<Calls>,
}

impl ScriptedPipeline {
    pub fn new(records: Vec<i64>) -> Self {
        Self {
            report: ValidationReport::ok(),
            records,
            extract_error: None,
            items_error: None,
            failing: Vec::new(),
            calls: Arc::new(Calls::default()),
        }
    }

    pub fn failing_on(mut self, item: i64) -> Self {
        self.failing.push(item);
        self
    }

    pub fn with_report(mut self, report: ValidationReport) -> Self {
        self.report = report;
        self
    }
}

#[async_trait]
impl Pipeline for ScriptedPipeline {
    type Raw = Vec<i64>;
    type Item = i64;
    type Output = String;

    fn name(&self) -> &str {
        "scripted"
    }

    async fn validate(&self, _ctx: &PipelineContext) -> ValidationReport {
        self.calls.validate.fetch_add(1, Ordering::SeqCst);
        self.report.clone()
    }

    async fn extract(
        &self,
        _ctx: &PipelineContext,
        progress: &PhaseProgress<'_>,
    ) -> Result<Vec<i64>, PipelineError> {
        self.calls.extract.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.extract_error {
            return Err(PipelineError::phase(
                legis_ingest::pipeline::Phase::Extract,
                message.clone(),
            ));
        }

        let total = self.records.len();
        for done in 1..=total {
            progress.report(done, total, format!("extracted {done}"));
        }
        Ok(self.records.clone())
    }

    fn items(&self, _ctx: &PipelineContext, raw: Vec<i64>) -> Result<Vec<i64>, PipelineError> {
        self.calls.items.fetch_add(1, Ordering::SeqCst);
        match &self.items_error {
            Some(message) => Err(PipelineError::phase(
                legis_ingest::pipeline::Phase::Transform,
                message.clone(),
            )),
            None => Ok(raw),
        }
    }

    fn transform_item(&self, _ctx: &PipelineContext, item: i64) -> Result<String, ItemError> {
        self.calls.transform.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&item) {
            return Err(ItemError::for_key(item.to_string(), "scripted failure"));
        }
        Ok(format!("item-{item}"))
    }
}

/// Destination that keeps everything it is given
pub struct RecordingDestination<T> {
    pub loaded: Arc<Mutex<Vec<T>>>,
    pub loads: Arc<AtomicUsize>,
    pub fail_with: Option<String>,
}

impl<T> RecordingDestination<T> {
    pub fn new() -> Self {
        Self {
            loaded: Arc::new(Mutex::new(Vec::new())),
            loads: Arc::new(AtomicUsize::new(0)),
            fail_with: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new()
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Destination<T> for RecordingDestination<T> {
    fn name(&self) -> String {
        "recording".to_string()
    }

    async fn load(
        &mut self,
        items: Vec<T>,
        progress: &PhaseProgress<'_>,
    ) -> Result<LoadResult, PipelineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_with {
            return Err(PipelineError::Store(StoreError::Unavailable(message.clone())));
        }

        let written = items.len();
        self.loaded.lock().unwrap().extend(items);
        progress.report(written, written, "loaded");
        Ok(LoadResult {
            written,
            batches: 1,
        })
    }
}

/// Upstream double answering each path with scripted response bodies, in order
///
/// A body of `None` simulates a network failure. Once a path's script runs out,
/// further requests fail.
#[derive(Default)]
pub struct ScriptedSource {
    responses: Mutex<HashMap<String, VecDeque<Option<String>>>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, path: &str, body: &str) -> Self {
        self.push(path, Some(body.to_string()));
        self
    }

    pub fn fail(self, path: &str) -> Self {
        self.push(path, None);
        self
    }

    fn push(&self, path: &str, body: Option<String>) {
        self.responses
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(body);
    }

    /// Paths requested, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSource for ScriptedSource {
    async fn fetch_records(&self, path: &str) -> Result<Vec<Value>, FetchError> {
        self.requests.lock().unwrap().push(path.to_string());
        let next = self
            .responses
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(|queue| queue.pop_front());

        match next {
            Some(Some(body)) => Ok(decode_payload(&body)?.into_records()),
            Some(None) => Err(FetchError::Network(format!("connection reset: {path}"))),
            None => Err(FetchError::Status {
                status: 404,
                body: format!("no script for {path}"),
            }),
        }
    }
}

/// Store wrapper recording the size of every commit call
pub struct CountingStore<S> {
    pub inner: S,
    commits: Mutex<Vec<usize>>,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            commits: Mutex::new(Vec::new()),
        }
    }

    pub fn commit_sizes(&self) -> Vec<usize> {
        self.commits.lock().unwrap().clone()
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for CountingStore<S> {
    async fn commit(&self, operations: &[BatchOperation]) -> Result<(), StoreError> {
        self.commits.lock().unwrap().push(operations.len());
        self.inner.commit(operations).await
    }

    async fn get(&self, address: &Address) -> Result<Option<Document>, StoreError> {
        self.inner.get(address).await
    }
}
