//! `localrag` MCP server entrypoint.
//!
//! Serves document retrieval tools for the corpora named on the command line. stdio is the
//! default transport for editor and agent integrations; `--http` exposes SSE and streamable HTTP
//! endpoints instead.
use std::{net::ToSocketAddrs, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::Parser;
use localrag::{
    config,
    embedding::build_embedding_client,
    logging,
    mcp::{RagMcpServer, validate_tool_catalog},
    processing::{CorpusScope, RetrievalService},
    store::open_store,
    transport,
};

#[derive(Parser)]
#[command(
    name = "localrag",
    version,
    about = "Serve semantic search over local document corpora via MCP"
)]
struct Cli {
    /// Corpus tags this server may search.
    #[arg(value_name = "CORPUS_TAG", required = true, num_args = 1..)]
    corpora: Vec<String>,
    /// Serve over HTTP (SSE and streamable HTTP) instead of stdio.
    #[arg(long)]
    http: bool,
    /// Interface to bind in HTTP mode.
    #[arg(long)]
    host: Option<String>,
    /// Port to bind in HTTP mode.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    logging::init_tracing();
    let config = config::init_config().context("invalid configuration")?;

    if let Some(tag) = cli.corpora.iter().find(|tag| tag.trim().is_empty()) {
        bail!("corpus tags must not be empty (got {tag:?})");
    }
    validate_tool_catalog().context("tool schemas disagree with their handlers")?;

    let store = open_store(config)
        .await
        .context("failed to open vector store")?;
    let embedder = build_embedding_client(&config.embedding_settings())
        .context("failed to build embedding client")?;
    let scope = CorpusScope::new(cli.corpora);
    tracing::info!(sources = ?scope.tags(), "Starting localrag");

    let retrieval = Arc::new(RetrievalService::new(embedder, store, scope));
    let server = RagMcpServer::new(retrieval);

    if cli.http {
        let host = cli.host.unwrap_or_else(|| config.server_host.clone());
        let port = cli.port.unwrap_or(config.server_port);
        let bind = (host.as_str(), port)
            .to_socket_addrs()
            .with_context(|| format!("invalid bind address {host}:{port}"))?
            .next()
            .with_context(|| format!("{host} did not resolve to an address"))?;
        transport::serve_http(server, bind)
            .await
            .context("HTTP transport failed")?;
    } else {
        transport::serve_stdio(server)
            .await
            .context("MCP server terminated unexpectedly")?;
    }

    Ok(())
}
