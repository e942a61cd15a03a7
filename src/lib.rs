#![deny(missing_docs)]

//! Core library for the localrag document retrieval server.

/// Environment-driven configuration management.
pub mod config;
/// Turning source documents into plain text.
pub mod conversion;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Structured logging and tracing setup.
pub mod logging;
/// Model Context Protocol server implementation.
pub mod mcp;
/// Indexing counters.
pub mod metrics;
/// Chunking, indexing and retrieval pipelines.
pub mod processing;
/// Qdrant REST vector store backend.
pub mod qdrant;
/// Vector store abstraction and the SQLite backend.
pub mod store;
/// stdio and HTTP transports for the MCP server.
pub mod transport;
