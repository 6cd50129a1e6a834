//! Load strategies
//!
//! - [`StoreDestination`]: documents through a [`BatchWriter`]
//! - [`JsonFileDestination`]: a pretty-printed JSON array on disk

use super::progress::PhaseProgress;
use super::Phase;
use crate::error::PipelineError;
use crate::store::address::{is_collection_path, Address, AddressError};
use crate::store::{BatchWriter, DocumentRecord, SetOptions, StoreError, WriterStats};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// What a destination did with the items it was given
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadResult {
    /// Items persisted
    pub written: usize,
    /// Commits or files written
    pub batches: usize,
}

/// Caller-supplied load strategy for items of type `T`
#[async_trait]
pub trait Destination<T: Send + 'static>: Send {
    /// Short description, e.g. `store:senators`
    fn name(&self) -> String;

    async fn load(
        &mut self,
        items: Vec<T>,
        progress: &PhaseProgress<'_>,
    ) -> Result<LoadResult, PipelineError>;
}

/// Writes [`DocumentRecord`]s into one collection of a document store
#[derive(Debug)]
pub struct StoreDestination {
    writer: BatchWriter,
    collection: String,
    options: SetOptions,
}

impl StoreDestination {
    /// Fails when `collection` is not a collection path
    pub fn new(writer: BatchWriter, collection: impl Into<String>) -> Result<Self, AddressError> {
        let collection = collection.into();
        if !is_collection_path(&collection) {
            return Err(AddressError::NotACollection(collection));
        }

        Ok(Self {
            writer,
            collection,
            options: SetOptions::default(),
        })
    }

    /// Merge into existing documents instead of replacing them
    pub fn with_merge(mut self, merge: bool) -> Self {
        self.options = SetOptions { merge };
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn writer_stats(&self) -> WriterStats {
        self.writer.stats()
    }

    /// Queue one `set` per record, then commit the remainder
    async fn write_all(
        &mut self,
        addresses: Vec<Address>,
        items: Vec<DocumentRecord>,
        progress: &PhaseProgress<'_>,
    ) -> Result<(), StoreError> {
        let total = items.len();
        for (index, (address, record)) in addresses.into_iter().zip(items).enumerate() {
            self.writer.set_address(address, record.data, self.options).await?;
            progress.report(index + 1, total, format!("Queued {}/{} documents", index + 1, total));
        }
        self.writer.commit_and_reset().await?;
        Ok(())
    }
}

#[async_trait]
impl Destination<DocumentRecord> for StoreDestination {
    fn name(&self) -> String {
        format!("store:{}", self.collection)
    }

    async fn load(
        &mut self,
        items: Vec<DocumentRecord>,
        progress: &PhaseProgress<'_>,
    ) -> Result<LoadResult, PipelineError> {
        let total = items.len();
        let commits_before = self.writer.stats().commits;

        // Every id must name a document directly in the collection before anything is queued
        let addresses = items
            .iter()
            .map(|record| Address::in_collection(&self.collection, &record.id))
            .collect::<Result<Vec<_>, _>>()?;

        if let Err(e) = self.write_all(addresses, items, progress).await {
            self.writer.discard_pending();
            return Err(e.into());
        }

        let batches = self.writer.stats().commits - commits_before;
        info!(
            collection = %self.collection,
            documents = total,
            batches,
            "Documents written"
        );

        Ok(LoadResult {
            written: total,
            batches,
        })
    }
}

/// Writes all items as one JSON array file
#[derive(Debug, Clone)]
pub struct JsonFileDestination {
    path: PathBuf,
}

impl JsonFileDestination {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<T> Destination<T> for JsonFileDestination
where
    T: Serialize + Send + Sync + 'static,
{
    fn name(&self) -> String {
        format!("json:{}", self.path.display())
    }

    async fn load(
        &mut self,
        items: Vec<T>,
        progress: &PhaseProgress<'_>,
    ) -> Result<LoadResult, PipelineError> {
        let body = serde_json::to_vec_pretty(&items)
            .map_err(|e| PipelineError::phase(Phase::Load, format!("serialize records: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                PipelineError::phase(Phase::Load, format!("create {}: {}", parent.display(), e))
            })?;
        }
        tokio::fs::write(&self.path, body).await.map_err(|e| {
            PipelineError::phase(Phase::Load, format!("write {}: {}", self.path.display(), e))
        })?;

        progress.report(items.len(), items.len(), format!("Wrote {} records", items.len()));
        info!(path = %self.path.display(), records = items.len(), "Records written to file");

        Ok(LoadResult {
            written: items.len(),
            batches: 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use legis_common::config::{BatchConfig, PhaseRange};
    use legis_common::{ManualClock, ProgressChannel, ProgressStatus};
    use serde_json::json;
    use std::sync::Arc;

    fn record(id: &str) -> DocumentRecord {
        DocumentRecord::new(id, json!({"id": id}).as_object().cloned().unwrap())
    }

    fn writer(store: Arc<MemoryStore>, max_operations: usize) -> BatchWriter {
        let config = BatchConfig {
            max_operations,
            pause_between_batches_ms: 0,
        };
        BatchWriter::new(store, Arc::new(ManualClock::default()), &config)
    }

    #[test]
    fn test_store_destination_requires_collection_path() {
        let store = Arc::new(MemoryStore::new());
        assert!(matches!(
            StoreDestination::new(writer(store.clone(), 10), "senate/2024"),
            Err(AddressError::NotACollection(_))
        ));
        assert!(StoreDestination::new(writer(store.clone(), 10), "senate//members").is_err());
        assert!(StoreDestination::new(writer(store, 10), "senate/2024/members").is_ok());
    }

    #[tokio::test]
    async fn test_store_destination_flushes_in_batches() {
        let store = Arc::new(MemoryStore::new());
        let mut destination = StoreDestination::new(writer(store.clone(), 2), "senators").unwrap();
        let channel = ProgressChannel::new();
        let progress =
            PhaseProgress::new(&channel, ProgressStatus::Loading, PhaseRange::new(75, 100));

        let result = destination
            .load(vec![record("a"), record("b"), record("c")], &progress)
            .await
            .unwrap();

        assert_eq!(result, LoadResult { written: 3, batches: 2 });
        assert_eq!(store.commit_sizes(), vec![2, 1]);
        assert_eq!(store.list("senators").len(), 3);
    }

    #[tokio::test]
    async fn test_nested_id_is_rejected_not_written_to_subcollection() {
        let store = Arc::new(MemoryStore::new());
        let mut destination = StoreDestination::new(writer(store.clone(), 10), "senators").unwrap();
        let channel = ProgressChannel::new();
        let progress =
            PhaseProgress::new(&channel, ProgressStatus::Loading, PhaseRange::new(75, 100));

        let err = destination
            .load(vec![record("a/votes/1")], &progress)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Address(AddressError::InvalidDocumentId(ref id)) if id == "a/votes/1"
        ));
        assert!(store.commit_sizes().is_empty());
        assert!(store.list("senators/a/votes").is_empty());
    }

    #[tokio::test]
    async fn test_failed_load_leaves_nothing_for_the_next_one() {
        let store = Arc::new(MemoryStore::new());
        let mut destination = StoreDestination::new(writer(store.clone(), 10), "senators").unwrap();
        let channel = ProgressChannel::new();
        let progress =
            PhaseProgress::new(&channel, ProgressStatus::Loading, PhaseRange::new(75, 100));

        assert!(destination
            .load(vec![record("ok1"), record("bad/x")], &progress)
            .await
            .is_err());

        let result = destination.load(vec![record("ok2")], &progress).await.unwrap();

        assert_eq!(result, LoadResult { written: 1, batches: 1 });
        assert_eq!(store.commit_sizes(), vec![1]);
        assert_eq!(store.list("senators"), vec!["senators/ok2"]);
    }

    #[tokio::test]
    async fn test_failed_commit_is_reported_and_queue_emptied() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next_commit("quota exceeded");
        let mut destination = StoreDestination::new(writer(store.clone(), 10), "senators").unwrap();
        let channel = ProgressChannel::new();
        let progress =
            PhaseProgress::new(&channel, ProgressStatus::Loading, PhaseRange::new(75, 100));

        let err = destination
            .load(vec![record("a"), record("b")], &progress)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Store(StoreError::CommitFailed { discarded: 2, .. })));
        assert_eq!(destination.writer_stats().operations_discarded, 2);
        assert!(store.list("senators").is_empty());
    }

    #[tokio::test]
    async fn test_json_file_destination_writes_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("records.json");
        let mut destination = JsonFileDestination::new(&path);
        let channel = ProgressChannel::new();
        let progress =
            PhaseProgress::new(&channel, ProgressStatus::Loading, PhaseRange::new(75, 100));

        let result = destination
            .load(vec![record("a"), record("b")], &progress)
            .await
            .unwrap();

        assert_eq!(result.written, 2);
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written[1]["id"], "b");
    }
}
