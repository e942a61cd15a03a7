//! Vector store abstraction shared by the local SQLite backend and Qdrant.
//!
//! Backends implement a handful of primitives (create, write, rank, scroll, delete by id).
//! Corpus-level operations have default implementations on top of the paginated scroll, so a
//! backend enumerates the whole collection rather than a single page. The SQLite backend
//! overrides them with single statements.

pub mod local;
pub mod scroller;
pub mod types;

use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;
use futures_util::{StreamExt, pin_mut};

use crate::{
    config::{Config, StoreBackend},
    qdrant::QdrantStore,
};

pub use local::LocalStore;
pub use types::{
    CollectionInfo, CorpusFilter, EntryPayload, NewEntry, PointRef, ScoredEntry, ScrollCursor,
    ScrollPage, StoreError, StoreStats,
};

/// Entries fetched per scroll request.
pub const SCROLL_PAGE_SIZE: usize = 256;

/// Persistent collection of `(id, vector, payload)` entries.
///
/// A handle is created once per process and shared as `Arc<dyn VectorStore>`. A write that
/// returns `Ok` is visible to every handle on the same collection, including ones in other
/// processes.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection with the configured dimension and cosine distance if absent.
    ///
    /// Idempotent, and safe when several processes race to create the same collection.
    async fn ensure_collection(&self) -> Result<(), StoreError>;

    /// Insert entries under freshly generated ids, returning how many were written.
    ///
    /// Every vector is validated before anything is written, so a rejected call writes nothing.
    async fn upsert(&self, entries: Vec<NewEntry>) -> Result<usize, StoreError>;

    /// Return up to `limit` entries ordered by descending cosine similarity.
    ///
    /// When `filter` is present only entries whose tag is in the allow-list are considered.
    async fn search(
        &self,
        vector: Vec<f32>,
        filter: Option<&CorpusFilter>,
        limit: usize,
    ) -> Result<Vec<ScoredEntry>, StoreError>;

    /// Fetch one page of entry references, starting at `cursor`.
    async fn scroll(
        &self,
        filter: Option<&CorpusFilter>,
        cursor: Option<ScrollCursor>,
        page_size: usize,
    ) -> Result<ScrollPage, StoreError>;

    /// Delete entries by id, returning how many were removed.
    async fn delete_points(&self, ids: Vec<String>) -> Result<usize, StoreError>;

    /// Report the entry count and vector dimension.
    async fn collection_info(&self) -> Result<CollectionInfo, StoreError>;

    /// Enumerate every distinct corpus tag in the collection.
    async fn distinct_corpus_tags(&self) -> Result<BTreeSet<String>, StoreError> {
        let stream = scroller::stream_points(self, None, SCROLL_PAGE_SIZE);
        pin_mut!(stream);
        let mut tags = BTreeSet::new();
        while let Some(point) = stream.next().await {
            if let Some(tag) = point?.corpus_tag {
                tags.insert(tag);
            }
        }
        Ok(tags)
    }

    /// Delete every entry tagged `corpus_tag`, returning how many were enumerated and removed.
    async fn delete_by_corpus_tag(&self, corpus_tag: &str) -> Result<usize, StoreError> {
        let filter = CorpusFilter::single(corpus_tag);
        let stream = scroller::stream_points(self, Some(filter), SCROLL_PAGE_SIZE);
        pin_mut!(stream);
        let mut ids = Vec::new();
        while let Some(point) = stream.next().await {
            ids.push(point?.id);
        }

        let matched = ids.len();
        if matched == 0 {
            tracing::debug!(corpus_tag, "No entries to delete");
            return Ok(0);
        }

        for batch in ids.chunks(SCROLL_PAGE_SIZE) {
            self.delete_points(batch.to_vec()).await?;
        }
        tracing::info!(corpus_tag, deleted = matched, "Corpus deleted");
        Ok(matched)
    }

    /// Summarize the collection.
    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let info = self.collection_info().await?;
        let tags = self.distinct_corpus_tags().await?;
        Ok(StoreStats {
            total_entries: info.points_count,
            vector_dimension: info.dimension,
            distinct_corpus_count: tags.len(),
        })
    }
}

/// Open the backend selected by `config` and make sure its collection exists.
pub async fn open_store(config: &Config) -> Result<Arc<dyn VectorStore>, StoreError> {
    let store: Arc<dyn VectorStore> = match config.store_backend {
        StoreBackend::Local => Arc::new(LocalStore::open(
            &config.store_path,
            &config.collection_name,
            config.embedding_dimension,
        )?),
        StoreBackend::Qdrant => Arc::new(QdrantStore::new(
            &config.qdrant_url,
            config.qdrant_api_key.clone(),
            &config.collection_name,
            config.embedding_dimension,
        )?),
    };
    store.ensure_collection().await?;
    tracing::info!(
        backend = ?config.store_backend,
        collection = %config.collection_name,
        dimension = config.embedding_dimension,
        "Vector store ready"
    );
    Ok(store)
}

pub(crate) fn check_dimension(expected: usize, actual: usize) -> Result<(), StoreError> {
    if expected == actual {
        Ok(())
    } else {
        Err(StoreError::DimensionMismatch { expected, actual })
    }
}

/// Reject the whole batch if any vector has the wrong length or a non-finite component.
pub(crate) fn validate_entries(entries: &[NewEntry], dimension: usize) -> Result<(), StoreError> {
    for (index, entry) in entries.iter().enumerate() {
        check_dimension(dimension, entry.vector.len())?;
        if entry.vector.iter().any(|value| !value.is_finite()) {
            return Err(StoreError::NonFiniteVector { index });
        }
    }
    Ok(())
}

/// Cosine similarity of two equal-length vectors; zero when either has no magnitude.
pub(crate) fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let mut dot = 0.0_f32;
    let mut left_norm = 0.0_f32;
    let mut right_norm = 0.0_f32;
    for (a, b) in left.iter().zip(right) {
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    dot / (left_norm.sqrt() * right_norm.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_handles_orientation_and_zero_vectors() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn corpus_filter_is_exact_match() {
        let filter = CorpusFilter::from_tags(["docs", "notes"]).expect("filter");
        assert!(filter.matches("docs"));
        assert!(!filter.matches("doc"));
        assert!(!filter.matches("docs "));
        assert!(!filter.matches("Docs"));
        assert_eq!(filter.tags().collect::<Vec<_>>(), vec!["docs", "notes"]);
        assert!(CorpusFilter::from_tags(Vec::<String>::new()).is_none());
    }
}
