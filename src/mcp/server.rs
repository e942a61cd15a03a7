//! MCP server bootstrap and request dispatch.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use rmcp::{
    ErrorData as McpError,
    handler::server::ServerHandler,
    model::{CallToolRequestParam, CallToolResult, ListToolsResult, ServerCapabilities, ServerInfo},
};

use crate::{
    mcp::{
        handlers::{search::handle_search_documents, sources::handle_list_data_sources},
        tools::ToolKind,
    },
    processing::{CorpusScope, RetrievalService},
};

/// Lifecycle of a single client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected, no tool has been called yet.
    Idle,
    /// At least one tool call has been handled.
    Serving,
}

/// MCP server answering document retrieval tools for a fixed set of corpora.
#[derive(Clone)]
pub struct RagMcpServer {
    retrieval: Arc<RetrievalService>,
    serving: Arc<AtomicBool>,
}

impl RagMcpServer {
    /// Create a server over the shared retrieval service.
    pub fn new(retrieval: Arc<RetrievalService>) -> Self {
        Self {
            retrieval,
            serving: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handler for a new connection: shares the retrieval service, starts `Idle`.
    pub fn for_connection(&self) -> Self {
        Self::new(self.retrieval.clone())
    }

    /// Current state of this connection.
    pub fn connection_state(&self) -> ConnectionState {
        if self.serving.load(Ordering::Acquire) {
            ConnectionState::Serving
        } else {
            ConnectionState::Idle
        }
    }

    /// Corpus allow-list this server searches.
    pub fn sources(&self) -> &CorpusScope {
        self.retrieval.scope()
    }

    async fn dispatch(
        &self,
        tool: ToolKind,
        request: CallToolRequestParam,
    ) -> Result<CallToolResult, McpError> {
        if !self.serving.swap(true, Ordering::AcqRel) {
            tracing::debug!("Connection serving first tool call");
        }
        match tool {
            ToolKind::SearchDocuments => {
                handle_search_documents(&self.retrieval, request.arguments).await
            }
            ToolKind::ListDataSources => {
                handle_list_data_sources(self.retrieval.scope(), request.arguments)
            }
        }
    }
}

impl ServerHandler for RagMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut implementation = rmcp::model::Implementation::from_build_env();
        implementation.name = "localrag".to_string();
        implementation.title = Some("Local Document Retrieval".to_string());
        implementation.version = env!("CARGO_PKG_VERSION").to_string();

        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: implementation,
            instructions: Some(
                "Search indexed documents with search_documents; call list_data_sources to see which corpora are available.".into(),
            ),
            ..ServerInfo::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools = ToolKind::ALL.into_iter().map(ToolKind::descriptor).collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            let Some(tool) = ToolKind::from_name(request.name.as_ref()) else {
                tracing::warn!(tool = %request.name, "Unknown tool requested");
                return Err(McpError::invalid_params(
                    format!("Unknown tool: {}", request.name),
                    None,
                ));
            };
            self.dispatch(tool, request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        embedding::HashEmbeddingClient,
        store::{LocalStore, VectorStore},
    };
    use std::borrow::Cow;

    fn server(dir: &std::path::Path, tags: &[&str]) -> RagMcpServer {
        let store: Arc<dyn VectorStore> =
            Arc::new(LocalStore::open(dir, "documents", 16).expect("store"));
        let retrieval = RetrievalService::new(
            Arc::new(HashEmbeddingClient::new(16)),
            store,
            CorpusScope::new(tags.iter().copied()),
        );
        RagMcpServer::new(Arc::new(retrieval))
    }

    fn request(name: &'static str) -> CallToolRequestParam {
        CallToolRequestParam {
            name: Cow::Borrowed(name),
            arguments: None,
        }
    }

    #[tokio::test]
    async fn first_tool_call_moves_connection_to_serving() {
        let dir = tempfile::tempdir().expect("tempdir");
        let server = server(dir.path(), &["A"]);
        assert_eq!(server.connection_state(), ConnectionState::Idle);

        let result = server
            .dispatch(ToolKind::ListDataSources, request("list_data_sources"))
            .await
            .expect("result");

        assert_eq!(result.is_error, Some(false));
        assert_eq!(server.connection_state(), ConnectionState::Serving);
    }

    #[tokio::test]
    async fn new_connections_start_idle_and_share_sources() {
        let dir = tempfile::tempdir().expect("tempdir");
        let server = server(dir.path(), &["A", "B"]);
        server
            .dispatch(ToolKind::ListDataSources, request("list_data_sources"))
            .await
            .expect("result");

        let next = server.for_connection();
        assert_eq!(next.connection_state(), ConnectionState::Idle);
        assert_eq!(next.sources().tags(), &["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn info_advertises_tools_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let info = server(dir.path(), &[]).get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_none());
        assert_eq!(info.server_info.name, "localrag");
    }
}
