//! Shared types used by every vector store backend.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{processing::ErrorKind, qdrant::QdrantError};

/// Errors returned by vector store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The persistent index could not be opened, created, or reached.
    #[error("Vector store unavailable: {0}")]
    Unavailable(String),
    /// A vector's length disagrees with the collection dimension.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension fixed by the collection.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },
    /// A vector contained NaN or infinite components.
    #[error("Entry {index} has a non-finite vector component")]
    NonFiniteVector {
        /// Position of the entry within the upsert call.
        index: usize,
    },
    /// Search or scroll was asked for zero results.
    #[error("Limit must be greater than zero")]
    InvalidLimit,
    /// A pagination cursor did not come from this backend.
    #[error("Invalid scroll cursor: {0}")]
    InvalidCursor(String),
    /// Qdrant request failed.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
    /// Local SQLite database operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Local store directory could not be prepared.
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Map the error onto its failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Self::NonFiniteVector { .. } | Self::InvalidLimit | Self::InvalidCursor(_) => {
                ErrorKind::InvalidConfiguration
            }
            Self::Unavailable(_) | Self::Qdrant(_) | Self::Sqlite(_) | Self::Io(_) => {
                ErrorKind::StoreUnavailable
            }
        }
    }
}

/// Metadata persisted with every vector.
///
/// Field names are the local table columns and the Qdrant payload keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPayload {
    /// Chunk text.
    pub text: String,
    /// Base name of the source document.
    pub file_name: String,
    /// Corpus the entry belongs to.
    pub corpus_tag: String,
    /// Chunk position within its document.
    pub ordinal: u64,
}

/// Entry submitted for insertion; the store assigns its id.
#[derive(Debug, Clone)]
pub struct NewEntry {
    /// Embedding of the chunk text.
    pub vector: Vec<f32>,
    /// Metadata stored alongside the vector.
    pub payload: EntryPayload,
}

/// Search hit ranked by cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    /// Identifier assigned at insertion.
    pub id: String,
    /// Cosine similarity to the query vector.
    pub score: f32,
    /// Stored metadata.
    pub payload: EntryPayload,
}

/// Exact-match allow-list over `corpus_tag`.
///
/// Entries match when their tag equals any member of the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusFilter {
    tags: BTreeSet<String>,
}

impl CorpusFilter {
    /// Build a filter from tags; `None` when no tags are given (whole collection).
    pub fn from_tags<I, S>(tags: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: BTreeSet<String> = tags.into_iter().map(Into::into).collect();
        if tags.is_empty() {
            None
        } else {
            Some(Self { tags })
        }
    }

    /// Filter matching a single tag.
    pub fn single(tag: impl Into<String>) -> Self {
        Self {
            tags: BTreeSet::from([tag.into()]),
        }
    }

    /// Whether `corpus_tag` is a member of the allow-list.
    pub fn matches(&self, corpus_tag: &str) -> bool {
        self.tags.contains(corpus_tag)
    }

    /// Allowed tags in sorted order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }
}

/// Opaque position of the next scroll page, produced by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollCursor(pub(crate) Value);

/// Identifier and tag of one stored entry, as returned by scrolling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointRef {
    /// Entry identifier.
    pub id: String,
    /// Corpus tag, when the stored payload carries one.
    pub corpus_tag: Option<String>,
}

/// One page of a scroll over the collection.
#[derive(Debug, Clone, Default)]
pub struct ScrollPage {
    /// Entries on this page.
    pub points: Vec<PointRef>,
    /// Cursor for the following page; `None` once the scan is complete.
    pub next: Option<ScrollCursor>,
}

/// Physical properties of the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionInfo {
    /// Number of stored entries.
    pub points_count: u64,
    /// Vector length fixed at creation.
    pub dimension: usize,
}

/// Aggregate statistics reported to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Number of stored entries.
    pub total_entries: u64,
    /// Vector length fixed at creation.
    pub vector_dimension: usize,
    /// Number of distinct corpus tags.
    pub distinct_corpus_count: usize,
}
