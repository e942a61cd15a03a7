//! Transports that carry the MCP server: stdio for editor integrations, HTTP for remote agents.

use std::{net::SocketAddr, time::Duration};

use axum::{Json, Router, extract::State, routing::get};
use rmcp::{
    service::ServiceExt,
    transport::{
        sse_server::{SseServer, SseServerConfig},
        stdio,
        streamable_http_server::{
            StreamableHttpServerConfig, StreamableHttpService,
            session::local::LocalSessionManager,
        },
    },
};
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::mcp::RagMcpServer;

/// Path of the server-sent event stream.
pub const SSE_PATH: &str = "/sse";
/// Path clients post session messages to.
pub const MESSAGE_PATH: &str = "/messages/";
/// Mount point of the streamable HTTP transport.
pub const STREAMABLE_PATH: &str = "/mcp";

const KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Failures while starting or running a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The MCP session could not be established or ended abnormally.
    #[error("MCP session failed: {0}")]
    Session(String),
    /// Binding or serving the HTTP listener failed.
    #[error("HTTP server error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
struct HealthState {
    sources: Vec<String>,
}

#[derive(Debug, Serialize)]
struct HealthPayload {
    status: &'static str,
    sources: Vec<String>,
}

/// Serve a single MCP session over stdin/stdout until the client disconnects.
pub async fn serve_stdio(server: RagMcpServer) -> Result<(), TransportError> {
    tracing::info!(sources = ?server.sources().tags(), "Serving MCP over stdio");
    let service = server
        .serve(stdio())
        .await
        .map_err(|err| TransportError::Session(err.to_string()))?;
    service
        .waiting()
        .await
        .map_err(|err| TransportError::Session(err.to_string()))?;
    Ok(())
}

/// Build the HTTP router: SSE endpoints, streamable HTTP under `/mcp`, and `GET /health`.
///
/// Every SSE or streamable session gets its own handler from [`RagMcpServer::for_connection`].
pub fn build_router(server: RagMcpServer, bind: SocketAddr, ct: CancellationToken) -> Router {
    let (sse_server, sse_router) = SseServer::new(SseServerConfig {
        bind,
        sse_path: SSE_PATH.to_string(),
        post_path: MESSAGE_PATH.to_string(),
        ct,
        sse_keep_alive: Some(KEEP_ALIVE),
    });
    let sse_factory = server.clone();
    // The returned token is a child of `ct`; cancelling `ct` stops the SSE sessions.
    let _sse_ct = sse_server.with_service(move || sse_factory.for_connection());

    let streamable_factory = server.clone();
    let streamable = StreamableHttpService::new(
        move || Ok(streamable_factory.for_connection()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig {
            stateful_mode: false,
            ..Default::default()
        },
    );

    let health = Router::new()
        .route("/health", get(health))
        .with_state(HealthState {
            sources: server.sources().tags().to_vec(),
        });

    sse_router
        .nest_service(STREAMABLE_PATH, streamable)
        .merge(health)
}

async fn health(State(state): State<HealthState>) -> Json<HealthPayload> {
    Json(HealthPayload {
        status: "ok",
        sources: state.sources,
    })
}

/// Serve the HTTP transports on `bind` until Ctrl-C.
pub async fn serve_http(server: RagMcpServer, bind: SocketAddr) -> Result<(), TransportError> {
    let ct = CancellationToken::new();
    let listener = TcpListener::bind(bind).await?;
    let local_addr = listener.local_addr()?;
    let router = build_router(server, local_addr, ct.clone());

    tracing::info!(
        addr = %local_addr,
        sse = SSE_PATH,
        streamable = STREAMABLE_PATH,
        "Serving MCP over HTTP"
    );

    let shutdown = ct.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "Failed to listen for Ctrl-C");
            return;
        }
        tracing::info!("Shutdown requested");
        shutdown.cancel();
    });

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        embedding::HashEmbeddingClient,
        processing::{CorpusScope, RetrievalService},
        store::{LocalStore, VectorStore},
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use futures_util::StreamExt;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt as _;

    fn router(dir: &std::path::Path) -> Router {
        let store: Arc<dyn VectorStore> =
            Arc::new(LocalStore::open(dir, "documents", 8).expect("store"));
        let retrieval = RetrievalService::new(
            Arc::new(HashEmbeddingClient::new(8)),
            store,
            CorpusScope::new(["A", "B"]),
        );
        build_router(
            RagMcpServer::new(Arc::new(retrieval)),
            "127.0.0.1:0".parse().expect("addr"),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn health_reports_configured_sources() {
        let dir = tempfile::tempdir().expect("tempdir");
        let response = router(dir.path())
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let payload: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["sources"], serde_json::json!(["A", "B"]));
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let response = router(dir.path())
            .oneshot(
                Request::builder()
                    .uri("/nope")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    /// POST one JSON-RPC message to the streamable endpoint and return the first SSE event.
    async fn post_streamable(router: Router, message: Value) -> Value {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(STREAMABLE_PATH)
                    .header("accept", "application/json, text/event-stream")
                    .header("content-type", "application/json")
                    .body(Body::from(message.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let mut stream = response.into_body().into_data_stream();
        let mut buffer = String::new();
        let data = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(chunk) = stream.next().await {
                buffer.push_str(&String::from_utf8_lossy(&chunk.expect("chunk")));
                let complete = buffer
                    .split_inclusive('\n')
                    .filter(|line| line.ends_with('\n'))
                    .find_map(|line| line.strip_prefix("data:"));
                if let Some(data) = complete {
                    return data.trim().to_string();
                }
            }
            panic!("event stream ended without data: {buffer}");
        })
        .await
        .expect("event before timeout");
        serde_json::from_str(&data).expect("json-rpc message")
    }

    #[tokio::test]
    async fn streamable_http_serves_tool_calls() {
        let dir = tempfile::tempdir().expect("tempdir");

        let initialized = post_streamable(
            router(dir.path()),
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {
                    "protocolVersion": "2025-03-26",
                    "capabilities": {},
                    "clientInfo": { "name": "transport-test", "version": "0.0.0" }
                }
            }),
        )
        .await;
        assert_eq!(initialized["id"], 1);
        assert_eq!(initialized["result"]["serverInfo"]["name"], "localrag");

        let listed = post_streamable(
            router(dir.path()),
            json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "tools/call",
                "params": { "name": "list_data_sources", "arguments": {} }
            }),
        )
        .await;
        assert_eq!(listed["id"], 2);
        assert_eq!(listed["result"]["isError"], false);
        let text = listed["result"]["content"][0]["text"]
            .as_str()
            .expect("text content");
        assert!(text.contains("- **A**\n- **B**"), "{text}");

        let searched = post_streamable(
            router(dir.path()),
            json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "tools/call",
                "params": { "name": "search_documents", "arguments": { "query": "anything" } }
            }),
        )
        .await;
        assert_eq!(searched["result"]["isError"], false);
        let text = searched["result"]["content"][0]["text"]
            .as_str()
            .expect("text content");
        assert!(text.contains("No documents matched"), "{text}");
    }
}
