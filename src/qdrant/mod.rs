//! Qdrant vector store integration.

pub mod client;
pub mod filters;
mod payload;
pub mod types;

pub use client::QdrantStore;
pub use filters::build_corpus_filter;
pub use types::QdrantError;
