//! Document processing pipeline: chunking, embedding, and vector store orchestration.

pub mod chunking;
mod service;
pub mod types;

pub use service::{CorpusScope, IndexingService, RetrievalService};
pub use types::{
    ChunkingError, ErrorKind, IndexOutcome, IndexReport, IndexingError, SearchError,
};
