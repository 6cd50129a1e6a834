//! In-process document store
//!
//! Used for dry runs and as the store double in tests. Commits are applied to a
//! copy of the document map and swapped in only if every operation succeeds.

use super::batch::{merge_documents, BatchOperation, Document, OperationKind};
use super::{Address, DocumentStore, StoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    documents: BTreeMap<String, Document>,
    /// Size of every commit call, successful or not
    commit_sizes: Vec<usize>,
    fail_next: Option<String>,
}

/// Document store held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit fail with `StoreError::Unavailable(reason)`
    pub fn fail_next_commit(&self, reason: impl Into<String>) {
        self.lock().fail_next = Some(reason.into());
    }

    /// Operation count of each commit call, in call order
    pub fn commit_sizes(&self) -> Vec<usize> {
        self.lock().commit_sizes.clone()
    }

    /// Document at `address`, if present
    pub fn document(&self, address: &str) -> Option<Document> {
        self.lock().documents.get(address).cloned()
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.lock().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().documents.is_empty()
    }

    /// Addresses of documents directly inside `collection_path`
    pub fn list(&self, collection_path: &str) -> Vec<String> {
        self.lock()
            .documents
            .keys()
            .filter(|key| {
                Address::parse(key)
                    .map(|address| address.collection_path() == collection_path)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn apply(
    documents: &mut BTreeMap<String, Document>,
    operation: &BatchOperation,
) -> Result<(), StoreError> {
    let key = operation.address.to_string();
    let payload = operation.payload.clone().unwrap_or_default();

    match operation.kind {
        OperationKind::Set if operation.merge => {
            merge_documents(documents.entry(key).or_default(), payload);
        }
        OperationKind::Set => {
            documents.insert(key, payload);
        }
        OperationKind::Update => match documents.get_mut(&key) {
            Some(existing) => merge_documents(existing, payload),
            None => return Err(StoreError::DocumentNotFound(key)),
        },
        OperationKind::Delete => {
            documents.remove(&key);
        }
    }

    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn commit(&self, operations: &[BatchOperation]) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.commit_sizes.push(operations.len());

        if let Some(reason) = state.fail_next.take() {
            return Err(StoreError::Unavailable(reason));
        }

        let mut staged = state.documents.clone();
        for operation in operations {
            apply(&mut staged, operation)?;
        }
        state.documents = staged;

        Ok(())
    }

    async fn get(&self, address: &Address) -> Result<Option<Document>, StoreError> {
        Ok(self.lock().documents.get(&address.to_string()).cloned())
    }
}
