//! Indexing and retrieval services coordinating conversion, chunking, embedding, and storage.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::task::JoinHandle;
use walkdir::WalkDir;

use crate::{
    conversion::{DocumentConverter, is_supported_file},
    embedding::EmbeddingClient,
    metrics::{IndexMetrics, MetricsSnapshot},
    processing::{
        chunking::{ChunkConfig, chunk},
        types::{IndexOutcome, IndexReport, IndexingError, SearchError},
    },
    store::{
        CorpusFilter, EntryPayload, NewEntry, ScoredEntry, StoreError, StoreStats, VectorStore,
    },
};

/// Coordinates the write path: conversion, chunking, one batched embedding call, and the
/// store upsert.
///
/// The service owns long-lived handles to the converter, embedding client, vector store, and
/// metrics so that the CLI and background tasks reuse the same components. Construct it once
/// near process start and share it through an `Arc`.
pub struct IndexingService {
    converter: Arc<dyn DocumentConverter>,
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    chunking: ChunkConfig,
    metrics: Arc<IndexMetrics>,
}

impl IndexingService {
    /// Assemble the pipeline from explicit handles.
    pub fn new(
        converter: Arc<dyn DocumentConverter>,
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        chunking: ChunkConfig,
        metrics: Arc<IndexMetrics>,
    ) -> Self {
        Self {
            converter,
            embedder,
            store,
            chunking,
            metrics,
        }
    }

    /// Convert, chunk, embed, and store one document under `corpus_tag`.
    ///
    /// Entries written before a failure are not rolled back.
    pub async fn index_document(
        &self,
        file_path: &Path,
        corpus_tag: &str,
    ) -> Result<IndexOutcome, IndexingError> {
        match self.index_document_inner(file_path, corpus_tag).await {
            Ok(outcome) => {
                self.metrics.record_document(outcome.chunks_written as u64);
                tracing::info!(
                    file_name = %outcome.file_name,
                    corpus_tag,
                    chunks = outcome.chunks_written,
                    "Document indexed"
                );
                Ok(outcome)
            }
            Err(error) => {
                self.metrics.record_failure();
                tracing::warn!(
                    path = %file_path.display(),
                    corpus_tag,
                    kind = ?error.kind(),
                    error = %error,
                    "Document indexing failed"
                );
                Err(error)
            }
        }
    }

    async fn index_document_inner(
        &self,
        file_path: &Path,
        corpus_tag: &str,
    ) -> Result<IndexOutcome, IndexingError> {
        if corpus_tag.is_empty() {
            return Err(IndexingError::InvalidConfiguration(
                "corpus tag must not be empty".into(),
            ));
        }
        if !is_supported_file(file_path) {
            return Err(IndexingError::InvalidConfiguration(format!(
                "unsupported file type: {}",
                file_path.display()
            )));
        }

        let file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.display().to_string());

        let text = self.converter.convert(file_path).await?;
        let chunks: Vec<(u64, String)> = chunk(&text, self.chunking)
            .map(|chunk| (chunk.ordinal as u64, chunk.text.to_string()))
            .collect();
        tracing::debug!(
            file_name = %file_name,
            chars = text.chars().count(),
            chunks = chunks.len(),
            chunk_size = self.chunking.size(),
            overlap = self.chunking.overlap(),
            "Document chunked"
        );

        if chunks.is_empty() {
            return Ok(IndexOutcome {
                file_name,
                corpus_tag: corpus_tag.to_string(),
                chunks_written: 0,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|(_, text)| text.clone()).collect();
        let vectors = self.embedder.generate_embeddings(texts).await?;

        let expected = self.embedder.dimension();
        if let Some(vector) = vectors.iter().find(|vector| vector.len() != expected) {
            return Err(StoreError::DimensionMismatch {
                expected,
                actual: vector.len(),
            }
            .into());
        }

        let entries: Vec<NewEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|((ordinal, text), vector)| NewEntry {
                vector,
                payload: EntryPayload {
                    text,
                    file_name: file_name.clone(),
                    corpus_tag: corpus_tag.to_string(),
                    ordinal,
                },
            })
            .collect();
        let chunks_written = self.store.upsert(entries).await?;

        Ok(IndexOutcome {
            file_name,
            corpus_tag: corpus_tag.to_string(),
            chunks_written,
        })
    }

    /// Index a document on a background task.
    pub fn spawn_index(
        self: Arc<Self>,
        file_path: PathBuf,
        corpus_tag: String,
    ) -> JoinHandle<Result<IndexOutcome, IndexingError>> {
        tokio::spawn(async move { self.index_document(&file_path, &corpus_tag).await })
    }

    /// Index files and directory trees one document at a time.
    ///
    /// Directories are walked recursively and unsupported files are skipped. A failing
    /// document is recorded in the report and the batch continues.
    pub async fn index_paths(&self, paths: &[PathBuf], corpus_tag: &str) -> IndexReport {
        let mut report = IndexReport::default();
        for file in expand_paths(paths, &mut report) {
            match self.index_document(&file, corpus_tag).await {
                Ok(outcome) => report.indexed.push(outcome),
                Err(error) => report.failed.push((file, error)),
            }
        }
        tracing::info!(
            corpus_tag,
            indexed = report.indexed.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            chunks = report.chunks_written(),
            "Batch indexing finished"
        );
        report
    }

    /// Run [`IndexingService::index_paths`] on a background task.
    pub fn spawn_index_paths(
        self: Arc<Self>,
        paths: Vec<PathBuf>,
        corpus_tag: String,
    ) -> JoinHandle<IndexReport> {
        tokio::spawn(async move { self.index_paths(&paths, &corpus_tag).await })
    }

    /// Every corpus tag currently present in the store.
    pub async fn list_corpora(&self) -> Result<BTreeSet<String>, StoreError> {
        self.store.distinct_corpus_tags().await
    }

    /// Remove every entry of `corpus_tag`, returning how many were deleted.
    pub async fn delete_corpus(&self, corpus_tag: &str) -> Result<usize, StoreError> {
        self.store.delete_by_corpus_tag(corpus_tag).await
    }

    /// Collection statistics.
    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        self.store.stats().await
    }

    /// Counters accumulated by this service.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

fn expand_paths(paths: &[PathBuf], report: &mut IndexReport) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            if path.exists() && !is_supported_file(path) {
                report.skipped.push(path.clone());
            } else {
                files.push(path.clone());
            }
            continue;
        }

        for entry in WalkDir::new(path).sort_by_file_name() {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    let file = entry.into_path();
                    if is_supported_file(&file) {
                        files.push(file);
                    } else {
                        report.skipped.push(file);
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Failed to walk directory");
                }
            }
        }
    }
    files
}

/// Fixed allow-list of corpus tags a server instance searches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusScope {
    tags: Vec<String>,
}

impl CorpusScope {
    /// Build a scope from the tags given at startup, dropping duplicates but keeping order.
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = BTreeSet::new();
        let tags = tags
            .into_iter()
            .map(Into::into)
            .filter(|tag: &String| seen.insert(tag.clone()))
            .collect();
        Self { tags }
    }

    /// Tags in the order they were configured.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Whether the scope allows the whole collection.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Store filter for this scope; `None` searches the whole collection.
    pub fn filter(&self) -> Option<CorpusFilter> {
        CorpusFilter::from_tags(self.tags.iter().cloned())
    }
}

/// Read path: embeds a query and searches the store within a fixed corpus scope.
pub struct RetrievalService {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    scope: CorpusScope,
}

impl RetrievalService {
    /// Build a retrieval service restricted to `scope`.
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        scope: CorpusScope,
    ) -> Self {
        Self {
            embedder,
            store,
            scope,
        }
    }

    /// Corpora this service searches.
    pub fn scope(&self) -> &CorpusScope {
        &self.scope
    }

    /// Return up to `limit` entries most similar to `query`. `limit` must already be clamped.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredEntry>, SearchError> {
        let mut vectors = self
            .embedder
            .generate_embeddings(vec![query.to_string()])
            .await?;
        let vector = vectors.pop().ok_or(SearchError::EmptyEmbedding)?;

        let expected = self.embedder.dimension();
        let actual = vector.len();
        if actual != expected {
            return Err(SearchError::DimensionMismatch { expected, actual });
        }

        let filter = self.scope.filter();
        let hits = self.store.search(vector, filter.as_ref(), limit).await?;
        tracing::debug!(
            limit,
            scope = ?self.scope.tags(),
            hits = hits.len(),
            "Search completed"
        );
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        conversion::ConversionError,
        embedding::{EmbeddingError, HashEmbeddingClient},
        processing::ErrorKind,
        store::LocalStore,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns fixed text for any path and counts calls.
    struct StaticConverter {
        text: String,
        calls: AtomicUsize,
    }

    impl StaticConverter {
        fn new(text: &str) -> Arc<Self> {
            Arc::new(Self {
                text: text.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DocumentConverter for StaticConverter {
        async fn convert(&self, path: &Path) -> Result<String, ConversionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if path.to_string_lossy().contains("broken") {
                return Err(ConversionError::Failed {
                    path: path.to_path_buf(),
                    reason: "corrupt".into(),
                });
            }
            Ok(self.text.clone())
        }
    }

    /// Counts batches and returns vectors of a configurable length.
    struct CountingEmbedder {
        dimension: usize,
        produced: usize,
        batches: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingClient for CountingEmbedder {
        fn dimension(&self) -> usize {
            self.dimension
        }

        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![1.0; self.produced]).collect())
        }
    }

    fn service(
        converter: Arc<dyn DocumentConverter>,
        embedder: Arc<dyn EmbeddingClient>,
        dir: &Path,
    ) -> (IndexingService, Arc<dyn VectorStore>) {
        let store: Arc<dyn VectorStore> =
            Arc::new(LocalStore::open(dir, "documents", embedder.dimension()).expect("store"));
        let service = IndexingService::new(
            converter,
            embedder,
            Arc::clone(&store),
            ChunkConfig::new(10, 2).expect("chunking"),
            Arc::new(IndexMetrics::new()),
        );
        (service, store)
    }

    #[tokio::test]
    async fn embeds_all_chunks_in_one_batch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let embedder = Arc::new(CountingEmbedder {
            dimension: 3,
            produced: 3,
            batches: AtomicUsize::new(0),
        });
        let (service, store) = service(
            StaticConverter::new("abcdefghijklmnopqrstuvwxyz"),
            embedder.clone(),
            dir.path(),
        );

        let outcome = service
            .index_document(Path::new("/docs/alphabet.txt"), "letters")
            .await
            .expect("index");

        assert_eq!(outcome.file_name, "alphabet.txt");
        assert_eq!(outcome.corpus_tag, "letters");
        assert_eq!(outcome.chunks_written, 4);
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 1);
        assert_eq!(store.collection_info().await.expect("info").points_count, 4);
        assert_eq!(service.metrics_snapshot().chunks_written, 4);
    }

    #[tokio::test]
    async fn unsupported_files_fail_before_conversion() {
        let dir = tempfile::tempdir().expect("tempdir");
        let converter = StaticConverter::new("ignored");
        let (service, _) = service(
            converter.clone(),
            Arc::new(HashEmbeddingClient::new(4)),
            dir.path(),
        );

        let err = service
            .index_document(Path::new("setup.exe"), "tools")
            .await
            .expect_err("unsupported");
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
        assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.metrics_snapshot().documents_failed, 1);
    }

    #[tokio::test]
    async fn conversion_failures_surface_as_conversion_failed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (service, _) = service(
            StaticConverter::new("text"),
            Arc::new(HashEmbeddingClient::new(4)),
            dir.path(),
        );

        let err = service
            .index_document(Path::new("broken.pdf"), "docs")
            .await
            .expect_err("conversion");
        assert_eq!(err.kind(), ErrorKind::ConversionFailed);
    }

    #[tokio::test]
    async fn empty_documents_skip_embedding() {
        let dir = tempfile::tempdir().expect("tempdir");
        let embedder = Arc::new(CountingEmbedder {
            dimension: 3,
            produced: 3,
            batches: AtomicUsize::new(0),
        });
        let (service, _) = service(StaticConverter::new("   \n  "), embedder.clone(), dir.path());

        let outcome = service
            .index_document(Path::new("blank.md"), "docs")
            .await
            .expect("index");
        assert_eq!(outcome.chunks_written, 0);
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wrong_vector_length_is_dimension_mismatch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let embedder = Arc::new(CountingEmbedder {
            dimension: 3,
            produced: 5,
            batches: AtomicUsize::new(0),
        });
        let (service, store) = service(StaticConverter::new("some text"), embedder, dir.path());

        let err = service
            .index_document(Path::new("notes.txt"), "docs")
            .await
            .expect_err("mismatch");
        assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
        assert_eq!(store.collection_info().await.expect("info").points_count, 0);
    }

    #[tokio::test]
    async fn empty_corpus_tag_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (service, _) = service(
            StaticConverter::new("text"),
            Arc::new(HashEmbeddingClient::new(4)),
            dir.path(),
        );
        let err = service
            .index_document(Path::new("notes.txt"), "")
            .await
            .expect_err("empty tag");
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[tokio::test]
    async fn index_paths_walks_directories_and_records_failures() {
        let docs = tempfile::tempdir().expect("docs");
        std::fs::create_dir_all(docs.path().join("nested")).expect("nested");
        std::fs::write(docs.path().join("a.txt"), "x").expect("a");
        std::fs::write(docs.path().join("nested/b.md"), "x").expect("b");
        std::fs::write(docs.path().join("nested/broken.txt"), "x").expect("broken");
        std::fs::write(docs.path().join("image.svg"), "x").expect("svg");

        let store_dir = tempfile::tempdir().expect("store");
        let (service, _) = service(
            StaticConverter::new("hello world, this is a document"),
            Arc::new(HashEmbeddingClient::new(8)),
            store_dir.path(),
        );
        let service = Arc::new(service);

        let report = service
            .clone()
            .spawn_index_paths(vec![docs.path().to_path_buf()], "docs".into())
            .await
            .expect("join");

        assert_eq!(report.indexed.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.chunks_written() > 0);
        assert_eq!(
            service.list_corpora().await.expect("corpora").into_iter().collect::<Vec<_>>(),
            vec!["docs"]
        );
    }

    #[tokio::test]
    async fn retrieval_restricts_to_scope() {
        let dir = tempfile::tempdir().expect("tempdir");
        let embedder: Arc<dyn EmbeddingClient> = Arc::new(HashEmbeddingClient::new(16));
        let (service, store) = service(
            StaticConverter::new("shared words"),
            Arc::clone(&embedder),
            dir.path(),
        );
        let service = Arc::new(service);
        for tag in ["A", "B"] {
            service
                .clone()
                .spawn_index(PathBuf::from(format!("{tag}.txt")), tag.to_string())
                .await
                .expect("join")
                .expect("index");
        }

        let scoped = RetrievalService::new(
            Arc::clone(&embedder),
            Arc::clone(&store),
            CorpusScope::new(["A"]),
        );
        let hits = scoped.search("shared words", 10).await.expect("search");
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|hit| hit.payload.corpus_tag == "A"));

        let open = RetrievalService::new(embedder, store, CorpusScope::default());
        let hits = open.search("shared words", 10).await.expect("search");
        let tags: BTreeSet<_> = hits.iter().map(|hit| hit.payload.corpus_tag.as_str()).collect();
        assert_eq!(tags, BTreeSet::from(["A", "B"]));
    }

    #[test]
    fn corpus_scope_dedupes_in_order() {
        let scope = CorpusScope::new(["b", "a", "b"]);
        assert_eq!(scope.tags(), ["b".to_string(), "a".to_string()]);
        assert_eq!(
            scope.filter().expect("filter").tags().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert!(CorpusScope::default().filter().is_none());
    }
}
