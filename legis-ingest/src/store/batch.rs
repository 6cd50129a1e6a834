//! Batch operations and the bounded write queue

use super::address::Address;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Document body: a JSON object
pub type Document = Map<String, Value>;

/// Field stamped on every `set`
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Field stamped on non-merge `set`
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Kind of write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Create or replace (or merge, with `merge`)
    Set,
    /// Merge fields into an existing document
    Update,
    Delete,
}

/// Options for `set`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Merge top-level fields into an existing document instead of replacing it
    pub merge: bool,
}

impl SetOptions {
    pub fn merge() -> Self {
        Self { merge: true }
    }
}

/// One queued write
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOperation {
    pub kind: OperationKind,
    pub address: Address,
    /// Absent for deletes
    pub payload: Option<Document>,
    pub merge: bool,
}

impl BatchOperation {
    /// `set`, with timestamp markers frozen at `now`
    pub fn set(
        address: Address,
        mut data: Document,
        options: SetOptions,
        now: DateTime<Utc>,
    ) -> Self {
        let stamp = Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true));
        data.insert(UPDATED_AT_FIELD.to_string(), stamp.clone());
        if !options.merge {
            data.insert(CREATED_AT_FIELD.to_string(), stamp);
        }

        Self {
            kind: OperationKind::Set,
            address,
            payload: Some(data),
            merge: options.merge,
        }
    }

    pub fn update(address: Address, data: Document) -> Self {
        Self {
            kind: OperationKind::Update,
            address,
            payload: Some(data),
            merge: true,
        }
    }

    pub fn delete(address: Address) -> Self {
        Self {
            kind: OperationKind::Delete,
            address,
            payload: None,
            merge: false,
        }
    }
}

/// Merge top-level fields of `incoming` into `existing` (incoming wins)
pub(crate) fn merge_documents(existing: &mut Document, incoming: Document) {
    for (key, value) in incoming {
        existing.insert(key, value);
    }
}

/// Ordered queue of operations, bounded by a capacity
#[derive(Debug)]
pub struct WriteBatch {
    operations: Vec<BatchOperation>,
    capacity: usize,
}

impl WriteBatch {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            operations: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an operation; returns true once the batch is full
    pub fn push(&mut self, operation: BatchOperation) -> bool {
        self.operations.push(operation);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.operations.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn operations(&self) -> &[BatchOperation] {
        &self.operations
    }

    /// Move the queued operations out, leaving a fresh empty batch
    pub fn take(&mut self) -> Vec<BatchOperation> {
        std::mem::replace(&mut self.operations, Vec::with_capacity(self.capacity))
    }
}
