//! Hierarchical document addresses
//!
//! An address alternates collection and document segments:
//! `senate/2024/members/A123` is document `A123` in collection `senate/2024/members`.
//! The segment count must be even, and no segment may be empty.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Malformed document address (fatal, never retried)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Address '{address}' has {segments} segment(s); a document address needs an even count")]
    OddSegmentCount { address: String, segments: usize },

    #[error("Address '{0}' contains an empty segment")]
    EmptySegment(String),

    #[error("'{0}' is not a collection path; it needs an odd number of non-empty segments")]
    NotACollection(String),

    #[error("Document id '{0}' must be a single non-empty segment")]
    InvalidDocumentId(String),
}

/// Parsed document address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    collection_path: String,
    document_id: String,
}

impl Address {
    /// Parse a `/`-delimited address
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let segments: Vec<&str> = address.split('/').collect();

        if segments.len() % 2 != 0 {
            return Err(AddressError::OddSegmentCount {
                address: address.to_string(),
                segments: segments.len(),
            });
        }

        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(AddressError::EmptySegment(address.to_string()));
        }

        // Even and non-empty, so at least two segments
        let (document_id, collection) = segments
            .split_last()
            .ok_or_else(|| AddressError::EmptySegment(address.to_string()))?;

        Ok(Self {
            collection_path: collection.join("/"),
            document_id: (*document_id).to_string(),
        })
    }

    /// Address of document `document_id` directly inside `collection_path`
    ///
    /// `document_id` must be one segment; an id like `a/votes/1` would otherwise
    /// land in a nested subcollection.
    pub fn in_collection(collection_path: &str, document_id: &str) -> Result<Self, AddressError> {
        if document_id.is_empty() || document_id.contains('/') {
            return Err(AddressError::InvalidDocumentId(document_id.to_string()));
        }
        Self::parse(&format!("{}/{}", collection_path, document_id))
    }

    /// Every segment but the last, joined with `/`
    pub fn collection_path(&self) -> &str {
        &self.collection_path
    }

    /// Last segment
    pub fn document_id(&self) -> &str {
        &self.document_id
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection_path, self.document_id)
    }
}

/// Whether `path` names a collection (odd number of non-empty segments)
pub fn is_collection_path(path: &str) -> bool {
    let segments: Vec<&str> = path.split('/').collect();
    segments.len() % 2 == 1 && segments.iter().all(|segment| !segment.is_empty())
}
