//! Hierarchical document store access
//!
//! - [`address`]: `collection/doc/collection/doc` path parsing
//! - [`batch`]: queued operations and the bounded write batch
//! - [`writer`]: batched, paced writer with auto-flush
//! - [`memory`] / [`sqlite`]: [`DocumentStore`] implementations
//!
//! Stores are handed to writers as `Arc<dyn DocumentStore>`; there is no global
//! client. One store can back any number of independent writers.

pub mod address;
pub mod batch;
pub mod memory;
pub mod sqlite;
pub mod writer;

pub use address::{Address, AddressError};
pub use batch::{BatchOperation, Document, OperationKind, SetOptions, WriteBatch};
pub use memory::MemoryStore;
pub use sqlite::SqliteDocumentStore;
pub use writer::{BatchWriter, WriterStats};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Document store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Address(#[from] AddressError),

    /// A batch commit failed; its operations were dropped from the queue
    #[error("Batch commit failed, {discarded} operation(s) discarded: {source}")]
    CommitFailed {
        discarded: usize,
        #[source]
        source: Box<StoreError>,
    },

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Document store with all-or-nothing multi-operation commits
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Apply `operations` in order, atomically
    async fn commit(&self, operations: &[BatchOperation]) -> Result<(), StoreError>;

    /// Read one document back
    async fn get(&self, address: &Address) -> Result<Option<Document>, StoreError>;
}

/// A transformed record ready to be written as one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Document id within the destination collection
    pub id: String,
    pub data: Document,
}

impl DocumentRecord {
    pub fn new(id: impl Into<String>, data: Document) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}
