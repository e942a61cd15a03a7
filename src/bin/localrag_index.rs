//! Corpus administration CLI.
//!
//! Indexes files and directories into a corpus, lists and deletes corpora, prints collection
//! statistics, and runs ad-hoc searches against the same store the MCP server reads.
use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use localrag::{
    config::{self, Config},
    conversion::MarkitdownConverter,
    embedding::build_embedding_client,
    logging,
    mcp::clamp_limit,
    metrics::IndexMetrics,
    processing::{CorpusScope, IndexingService, RetrievalService, chunking::ChunkConfig},
    store::{VectorStore, open_store},
};

#[derive(Parser)]
#[command(
    name = "localrag-index",
    version,
    about = "Manage the document corpora served by localrag"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index files (directories are walked recursively) under a corpus tag.
    Index {
        /// Corpus tag to file the documents under.
        #[arg(long = "corpus", value_name = "TAG")]
        corpus: String,
        /// Files or directories to index.
        #[arg(required = true, num_args = 1..)]
        paths: Vec<PathBuf>,
    },
    /// List every corpus tag present in the store.
    Corpora,
    /// Delete every entry filed under a corpus tag.
    Delete {
        /// Corpus tag to remove.
        tag: String,
    },
    /// Print collection statistics.
    Stats,
    /// Run a semantic search and print the ranked chunks.
    Search {
        /// Text to search for.
        query: String,
        /// Restrict results to these corpus tags (repeatable).
        #[arg(long = "corpus", value_name = "TAG")]
        corpora: Vec<String>,
        /// Number of results (clamped to 1-20).
        #[arg(long, default_value_t = 5)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    logging::init_tracing();
    let config = config::init_config().context("invalid configuration")?;

    let store = open_store(config)
        .await
        .context("failed to open vector store")?;

    match cli.command {
        Command::Index { corpus, paths } => index(config, store, &corpus, paths).await,
        Command::Corpora => {
            let service = indexing_service(config, store)?;
            let tags = service.list_corpora().await.context("failed to list corpora")?;
            if tags.is_empty() {
                println!("No corpora indexed in {}", config.collection_name);
            }
            for tag in tags {
                println!("{tag}");
            }
            Ok(())
        }
        Command::Delete { tag } => {
            let service = indexing_service(config, store)?;
            let removed = service
                .delete_corpus(&tag)
                .await
                .with_context(|| format!("failed to delete corpus {tag}"))?;
            println!("Deleted {removed} entries from corpus {tag}");
            Ok(())
        }
        Command::Stats => {
            let service = indexing_service(config, store)?;
            let stats = service.stats().await.context("failed to read statistics")?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Command::Search {
            query,
            corpora,
            limit,
        } => search(config, store, query, corpora, limit).await,
    }
}

fn indexing_service(config: &Config, store: Arc<dyn VectorStore>) -> Result<IndexingService> {
    let embedder = build_embedding_client(&config.embedding_settings())
        .context("failed to build embedding client")?;
    let chunking = ChunkConfig::new(config.chunk_size, config.chunk_overlap)?;
    Ok(IndexingService::new(
        Arc::new(MarkitdownConverter::new(config.markitdown_command.clone())),
        embedder,
        store,
        chunking,
        Arc::new(IndexMetrics::new()),
    ))
}

async fn index(
    config: &Config,
    store: Arc<dyn VectorStore>,
    corpus: &str,
    paths: Vec<PathBuf>,
) -> Result<()> {
    if corpus.trim().is_empty() {
        bail!("corpus tag must not be empty");
    }
    let service = Arc::new(indexing_service(config, store)?);
    let report = service
        .clone()
        .spawn_index_paths(paths, corpus.to_string())
        .await
        .context("indexing task panicked")?;

    for outcome in &report.indexed {
        println!(
            "indexed {} ({} chunks)",
            outcome.file_name, outcome.chunks_written
        );
    }
    for path in &report.skipped {
        println!("skipped {} (unsupported file type)", path.display());
    }
    for (path, err) in &report.failed {
        eprintln!("failed {}: {err}", path.display());
    }

    let metrics = service.metrics_snapshot();
    println!(
        "corpus {corpus}: {} documents indexed, {} chunks written, {} failed",
        metrics.documents_indexed, metrics.chunks_written, metrics.documents_failed
    );

    if !report.failed.is_empty() && report.indexed.is_empty() {
        bail!("no documents were indexed");
    }
    Ok(())
}

async fn search(
    config: &Config,
    store: Arc<dyn VectorStore>,
    query: String,
    corpora: Vec<String>,
    limit: i64,
) -> Result<()> {
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }
    let embedder = build_embedding_client(&config.embedding_settings())
        .context("failed to build embedding client")?;
    let retrieval = RetrievalService::new(embedder, store, CorpusScope::new(corpora));
    let hits = retrieval
        .search(&query, clamp_limit(limit))
        .await
        .context("search failed")?;

    if hits.is_empty() {
        println!("No documents matched {query:?}");
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.4}] {} ({}) #{}",
            rank + 1,
            hit.score,
            hit.payload.file_name,
            hit.payload.corpus_tag,
            hit.payload.ordinal
        );
        println!("{}\n", hit.payload.text);
    }
    Ok(())
}
