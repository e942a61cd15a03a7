//! Core data types and error definitions for the indexing and retrieval pipelines.

use std::path::PathBuf;

use crate::{conversion::ConversionError, embedding::EmbeddingError, store::StoreError};
use thiserror::Error;

/// Failure categories surfaced to callers, independent of which layer raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Source document unreadable or its conversion failed.
    ConversionFailed,
    /// Embedding model or service failed.
    EmbeddingUnavailable,
    /// Parameters or inputs rejected before any work started.
    InvalidConfiguration,
    /// Persistent index could not be opened, created, or reached.
    StoreUnavailable,
    /// A vector's length disagrees with the collection dimension.
    DimensionMismatch,
}

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// The window would never advance.
    #[error("invalid chunking configuration: overlap {overlap} must be smaller than size {size}")]
    InvalidConfiguration {
        /// Requested window size.
        size: usize,
        /// Requested overlap.
        overlap: usize,
    },
}

/// Errors emitted while indexing one document.
#[derive(Debug, Error)]
pub enum IndexingError {
    /// File type or chunking parameters rejected before conversion.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Document could not be converted to text.
    #[error("Failed to convert {path}: {reason}")]
    ConversionFailed {
        /// Source document.
        path: PathBuf,
        /// Converter diagnostic.
        reason: String,
    },
    /// Embedding provider failed to produce vectors for the chunks.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// Vector store rejected or failed the write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IndexingError {
    /// Map the error onto its failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            Self::ConversionFailed { .. } => ErrorKind::ConversionFailed,
            Self::Embedding(_) => ErrorKind::EmbeddingUnavailable,
            Self::Store(err) => err.kind(),
        }
    }
}

impl From<ConversionError> for IndexingError {
    fn from(error: ConversionError) -> Self {
        match error {
            ConversionError::UnsupportedExtension { .. } => {
                Self::InvalidConfiguration(error.to_string())
            }
            ConversionError::Failed { path, reason } => Self::ConversionFailed { path, reason },
        }
    }
}

/// Errors emitted while answering a query.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Embedding provider failed to return vectors for the query text.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// Vector store search failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Returned embedding dimension does not match configuration.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected embedding dimension configured on the server.
        expected: usize,
        /// Actual embedding dimension produced by the provider.
        actual: usize,
    },
    /// Embedding provider returned no vectors.
    #[error("Embedding provider returned no vectors for the query")]
    EmptyEmbedding,
}

impl SearchError {
    /// Map the error onto its failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Embedding(_) | Self::EmptyEmbedding => ErrorKind::EmbeddingUnavailable,
            Self::Store(err) => err.kind(),
            Self::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
        }
    }
}

/// Summary of a completed document ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOutcome {
    /// Base name of the source file, as stored in each entry.
    pub file_name: String,
    /// Corpus the entries were tagged with.
    pub corpus_tag: String,
    /// Number of vector entries written.
    pub chunks_written: usize,
}

/// Result of indexing a batch of paths under one corpus.
#[derive(Debug, Default)]
pub struct IndexReport {
    /// Documents indexed successfully.
    pub indexed: Vec<IndexOutcome>,
    /// Documents that failed, with their errors.
    pub failed: Vec<(PathBuf, IndexingError)>,
    /// Paths ignored because their extension is not supported.
    pub skipped: Vec<PathBuf>,
}

impl IndexReport {
    /// Total vector entries written across the batch.
    pub fn chunks_written(&self) -> usize {
        self.indexed.iter().map(|outcome| outcome.chunks_written).sum()
    }
}
