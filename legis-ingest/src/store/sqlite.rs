//! SQLite-backed document store
//!
//! Documents live in one table keyed by `(collection, document_id)` with the body
//! stored as JSON text. Each commit runs in a single SQL transaction, so a batch
//! is applied completely or not at all.

use super::batch::{merge_documents, BatchOperation, Document, OperationKind};
use super::{Address, DocumentStore, StoreError};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::path::Path;
use tracing::debug;

/// Document store over a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Open (or create) the database file at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| {
                    StoreError::Unavailable(format!("create {}: {}", parent.display(), e))
                })?;
        }

        // mode=rwc: read, write, create
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        debug!("Connecting to document store: {}", db_url);

        let pool = SqlitePool::connect(&db_url).await?;
        Self::from_pool(pool).await
    }

    /// Private in-memory database (single connection, so every query sees it)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the documents table if needed
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                document_id TEXT NOT NULL,
                data TEXT NOT NULL,
                written_at TEXT NOT NULL,
                PRIMARY KEY (collection, document_id)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Number of documents directly inside `collection_path`
    pub async fn count(&self, collection_path: &str) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?")
            .bind(collection_path)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

async fn load(
    tx: &mut Transaction<'_, Sqlite>,
    address: &Address,
) -> Result<Option<Document>, StoreError> {
    let data: Option<String> = sqlx::query_scalar(
        "SELECT data FROM documents WHERE collection = ? AND document_id = ?",
    )
    .bind(address.collection_path())
    .bind(address.document_id())
    .fetch_optional(&mut **tx)
    .await?;

    match data {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

async fn upsert(
    tx: &mut Transaction<'_, Sqlite>,
    address: &Address,
    document: &Document,
) -> Result<(), StoreError> {
    let data = serde_json::to_string(document)?;
    sqlx::query(
        r#"
        INSERT INTO documents (collection, document_id, data, written_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (collection, document_id)
        DO UPDATE SET data = excluded.data, written_at = excluded.written_at
        "#,
    )
    .bind(address.collection_path())
    .bind(address.document_id())
    .bind(&data)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn commit(&self, operations: &[BatchOperation]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for operation in operations {
            let address = &operation.address;
            let payload = operation.payload.clone().unwrap_or_default();

            match operation.kind {
                OperationKind::Set if operation.merge => {
                    let mut document = load(&mut tx, address).await?.unwrap_or_default();
                    merge_documents(&mut document, payload);
                    upsert(&mut tx, address, &document).await?;
                }
                OperationKind::Set => {
                    upsert(&mut tx, address, &payload).await?;
                }
                OperationKind::Update => {
                    // Returning early drops the transaction, which rolls it back
                    let mut document = load(&mut tx, address)
                        .await?
                        .ok_or_else(|| StoreError::DocumentNotFound(address.to_string()))?;
                    merge_documents(&mut document, payload);
                    upsert(&mut tx, address, &document).await?;
                }
                OperationKind::Delete => {
                    sqlx::query("DELETE FROM documents WHERE collection = ? AND document_id = ?")
                        .bind(address.collection_path())
                        .bind(address.document_id())
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        debug!(operations = operations.len(), "SQLite batch committed");
        Ok(())
    }

    async fn get(&self, address: &Address) -> Result<Option<Document>, StoreError> {
        let data: Option<String> = sqlx::query_scalar(
            "SELECT data FROM documents WHERE collection = ? AND document_id = ?",
        )
        .bind(address.collection_path())
        .bind(address.document_id())
        .fetch_optional(&self.pool)
        .await?;

        match data {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }
}
