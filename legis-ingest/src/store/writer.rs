//! Batched persistence writer
//!
//! Queues writes into a [`WriteBatch`] and commits it as one atomic store call when
//! it reaches `max_operations`, or when the caller calls
//! [`commit_and_reset`](BatchWriter::commit_and_reset). Every commit is awaited and
//! followed by a pause, so batch N is committed before batch N+1 starts filling and
//! sustained write throughput stays under the store's ingestion limits.
//!
//! A failed commit still empties the queue. The error carries how many operations
//! were dropped; reconciling them is left to the caller.

use super::batch::{BatchOperation, Document, SetOptions, WriteBatch};
use super::{Address, DocumentStore, StoreError};
use legis_common::config::BatchConfig;
use legis_common::Clock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Addresses listed in the log when a commit fails
const DISCARD_LOG_LIMIT: usize = 10;

/// Counters for one writer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriterStats {
    /// Successful commits
    pub commits: usize,
    pub failed_commits: usize,
    pub operations_committed: usize,
    /// Operations dropped by failed commits
    pub operations_discarded: usize,
}

/// Batched, paced writer over a [`DocumentStore`]
pub struct BatchWriter {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    batch: WriteBatch,
    operation_count: usize,
    max_operations: usize,
    pause_between_batches: Duration,
    stats: WriterStats,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, config: &BatchConfig) -> Self {
        let max_operations = config.max_operations.max(1);
        Self {
            store,
            clock,
            batch: WriteBatch::new(max_operations),
            operation_count: 0,
            max_operations,
            pause_between_batches: config.pause_between_batches(),
            stats: WriterStats::default(),
        }
    }

    /// Queue a `set`
    ///
    /// Stamps `updatedAt`, plus `createdAt` unless `options.merge`. Flushes before
    /// returning when the batch is full.
    pub async fn set(
        &mut self,
        address: &str,
        data: Document,
        options: SetOptions,
    ) -> Result<(), StoreError> {
        let address = Address::parse(address)?;
        self.set_address(address, data, options).await
    }

    /// [`set`](Self::set) for an already parsed address
    pub async fn set_address(
        &mut self,
        address: Address,
        data: Document,
        options: SetOptions,
    ) -> Result<(), StoreError> {
        let operation = BatchOperation::set(address, data, options, self.clock.now());
        self.enqueue(operation).await
    }

    /// Queue an `update` (the document must exist when the batch commits)
    pub async fn update(&mut self, address: &str, data: Document) -> Result<(), StoreError> {
        let address = Address::parse(address)?;
        self.enqueue(BatchOperation::update(address, data)).await
    }

    /// Queue a `delete`
    pub async fn delete(&mut self, address: &str) -> Result<(), StoreError> {
        let address = Address::parse(address)?;
        self.enqueue(BatchOperation::delete(address)).await
    }

    async fn enqueue(&mut self, operation: BatchOperation) -> Result<(), StoreError> {
        self.batch.push(operation);
        self.operation_count += 1;

        if self.operation_count >= self.max_operations {
            debug!(
                operations = self.operation_count,
                max_operations = self.max_operations,
                "Batch full, flushing"
            );
            self.commit_and_reset().await?;
        }

        Ok(())
    }

    /// Commit everything queued, then pause
    ///
    /// Empty queue: no store call, returns `Ok(0)`. Otherwise returns the number of
    /// operations committed. The queue and counter are reset whether or not the
    /// commit succeeds; the pause only follows a successful commit.
    pub async fn commit_and_reset(&mut self) -> Result<usize, StoreError> {
        if self.batch.is_empty() {
            debug!("No pending operations, nothing to commit");
            return Ok(0);
        }

        let operations = self.batch.take();
        self.operation_count = 0;
        let count = operations.len();

        match self.store.commit(&operations).await {
            Ok(()) => {
                self.stats.commits += 1;
                self.stats.operations_committed += count;
                info!(
                    operations = count,
                    commits = self.stats.commits,
                    "Batch committed"
                );
            }
            Err(e) => {
                self.stats.failed_commits += 1;
                self.stats.operations_discarded += count;

                let mut listed: Vec<String> = operations
                    .iter()
                    .take(DISCARD_LOG_LIMIT)
                    .map(|op| op.address.to_string())
                    .collect();
                if count > DISCARD_LOG_LIMIT {
                    listed.push(format!("... and {} more", count - DISCARD_LOG_LIMIT));
                }
                error!(
                    operations = count,
                    error = %e,
                    discarded = %listed.join(", "),
                    "Batch commit failed, queued operations discarded"
                );

                return Err(StoreError::CommitFailed {
                    discarded: count,
                    source: Box::new(e),
                });
            }
        }

        if !self.pause_between_batches.is_zero() {
            debug!(
                pause_ms = self.pause_between_batches.as_millis() as u64,
                "Pausing between batches"
            );
            self.clock.sleep(self.pause_between_batches).await;
        }

        Ok(count)
    }

    /// Drop everything queued without committing
    ///
    /// Returns how many operations were dropped; they are counted as discarded.
    pub fn discard_pending(&mut self) -> usize {
        let count = self.batch.take().len();
        self.operation_count = 0;
        self.stats.operations_discarded += count;
        if count > 0 {
            warn!(operations = count, "Pending operations discarded without commit");
        }
        count
    }

    /// Operations queued and not yet committed
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    pub fn max_operations(&self) -> usize {
        self.max_operations
    }
}

impl std::fmt::Debug for BatchWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchWriter")
            .field("pending", &self.batch.len())
            .field("max_operations", &self.max_operations)
            .field("pause_between_batches", &self.pause_between_batches)
            .field("stats", &self.stats)
            .finish()
    }
}
