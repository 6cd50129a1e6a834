//! legis-ingest library interface
//!
//! Engine for syncing legislative records from an upstream API into a
//! hierarchical document store:
//! - [`fetcher`]: fixed-delay retry, request pacing, upstream client
//! - [`store`]: document addresses, batched writer, document stores
//! - [`pipeline`]: validate → extract → transform → load orchestration
//! - [`records`]: the generic record sync pipeline used by the binary

pub mod error;
pub mod fetcher;
pub mod pipeline;
pub mod records;
pub mod store;

pub use error::{ItemError, PipelineError};
pub use fetcher::{FetchError, Fetcher, RecordSource, UpstreamClient};
pub use pipeline::{
    Destination, JsonFileDestination, Orchestrator, Pipeline, PipelineContext, ProcessResult,
    RunOptions, StoreDestination, ValidationReport,
};
pub use records::RecordSyncPipeline;
pub use store::{
    Address, AddressError, BatchWriter, DocumentRecord, DocumentStore, MemoryStore,
    SqliteDocumentStore, StoreError,
};
