//! Pipeline error types

use crate::fetcher::FetchError;
use crate::pipeline::Phase;
use crate::store::{AddressError, StoreError};
use thiserror::Error;

/// Fatal errors that abort a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Preconditions failed; nothing was extracted
    #[error("Validation failed: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },

    #[error(transparent)]
    Address(#[from] AddressError),

    /// Remote call still failing after every retry
    #[error("{label} failed after {attempts} attempt(s): {source}")]
    Remote {
        label: String,
        attempts: u32,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{phase} phase failed: {message}")]
    Phase { phase: Phase, message: String },
}

impl PipelineError {
    pub fn phase(phase: Phase, message: impl Into<String>) -> Self {
        PipelineError::Phase {
            phase,
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, PipelineError::Validation { .. })
    }
}

/// One item failed inside a transform loop
///
/// Counted and skipped by the orchestrator; never aborts a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    /// Identifier of the failed item, when one could be read
    pub key: Option<String>,
    pub reason: String,
}

impl ItemError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            key: None,
            reason: reason.into(),
        }
    }

    pub fn for_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.key {
            Some(key) => write!(f, "item {}: {}", key, self.reason),
            None => f.write_str(&self.reason),
        }
    }
}

impl std::error::Error for ItemError {}
