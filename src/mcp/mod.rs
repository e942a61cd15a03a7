//! Model Context Protocol (MCP) surface for document retrieval.
//!
//! The server exposes two tools, `search_documents` and `list_data_sources`, over a fixed corpus
//! allow-list chosen at startup. Tool descriptors, argument handlers and markdown formatting live
//! in focused submodules.

mod format;
pub mod handlers;
mod schemas;
mod server;
mod tools;

pub use handlers::search::clamp_limit;
pub use server::{ConnectionState, RagMcpServer};
pub use tools::{CatalogError, ToolKind, validate_tool_catalog};
