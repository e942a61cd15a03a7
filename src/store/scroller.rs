//! Streaming helpers for iterating a store's scroll pages without manual loops.

use async_stream::try_stream;
use futures_core::Stream;

use super::{CorpusFilter, PointRef, StoreError, VectorStore};

/// Stream every entry reference matching `filter`, following scroll cursors until exhausted.
pub fn stream_points<'a, S>(
    store: &'a S,
    filter: Option<CorpusFilter>,
    page_size: usize,
) -> impl Stream<Item = Result<PointRef, StoreError>> + Send + 'a
where
    S: VectorStore + ?Sized,
{
    try_stream! {
        let mut cursor = None;
        loop {
            let page = store.scroll(filter.as_ref(), cursor.take(), page_size).await?;
            for point in page.points {
                yield point;
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CollectionInfo, NewEntry, ScoredEntry, ScrollCursor, ScrollPage};
    use async_trait::async_trait;
    use futures_util::{pin_mut, stream::StreamExt};
    use serde_json::json;
    use std::sync::Mutex;

    /// Serves fixed pages of two points and records the cursors it was asked for.
    struct PagedStore {
        points: Vec<PointRef>,
        cursors: Mutex<Vec<Option<ScrollCursor>>>,
    }

    impl PagedStore {
        fn new(count: usize) -> Self {
            let points = (0..count)
                .map(|index| PointRef {
                    id: format!("p{index}"),
                    corpus_tag: Some(if index % 2 == 0 { "even" } else { "odd" }.into()),
                })
                .collect();
            Self {
                points,
                cursors: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VectorStore for PagedStore {
        async fn ensure_collection(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn upsert(&self, _entries: Vec<NewEntry>) -> Result<usize, StoreError> {
            Ok(0)
        }

        async fn search(
            &self,
            _vector: Vec<f32>,
            _filter: Option<&CorpusFilter>,
            _limit: usize,
        ) -> Result<Vec<ScoredEntry>, StoreError> {
            Ok(Vec::new())
        }

        async fn scroll(
            &self,
            filter: Option<&CorpusFilter>,
            cursor: Option<ScrollCursor>,
            page_size: usize,
        ) -> Result<ScrollPage, StoreError> {
            self.cursors.lock().expect("cursors").push(cursor.clone());
            let start = match cursor {
                Some(ScrollCursor(value)) => value
                    .as_u64()
                    .ok_or_else(|| StoreError::InvalidCursor(value.to_string()))?
                    as usize,
                None => 0,
            };
            let end = (start + page_size).min(self.points.len());
            let points = self.points[start..end]
                .iter()
                .filter(|point| {
                    filter.is_none_or(|filter| {
                        point.corpus_tag.as_deref().is_some_and(|tag| filter.matches(tag))
                    })
                })
                .cloned()
                .collect();
            let next = (end < self.points.len()).then(|| ScrollCursor(json!(end)));
            Ok(ScrollPage { points, next })
        }

        async fn delete_points(&self, ids: Vec<String>) -> Result<usize, StoreError> {
            Ok(ids.len())
        }

        async fn collection_info(&self) -> Result<CollectionInfo, StoreError> {
            Ok(CollectionInfo {
                points_count: self.points.len() as u64,
                dimension: 4,
            })
        }
    }

    #[tokio::test]
    async fn stream_points_follows_cursors_across_pages() {
        let store = PagedStore::new(5);
        let stream = stream_points(&store, None, 2);
        pin_mut!(stream);
        let mut ids = Vec::new();
        while let Some(point) = stream.next().await {
            ids.push(point.expect("point").id);
        }

        assert_eq!(ids, vec!["p0", "p1", "p2", "p3", "p4"]);
        let cursors = store.cursors.lock().expect("cursors").clone();
        assert_eq!(
            cursors,
            vec![None, Some(ScrollCursor(json!(2))), Some(ScrollCursor(json!(4)))]
        );
    }

    #[tokio::test]
    async fn provided_methods_enumerate_beyond_first_page() {
        let store = PagedStore::new(7);

        let tags = store.distinct_corpus_tags().await.expect("tags");
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["even", "odd"]);

        let deleted = store.delete_by_corpus_tag("odd").await.expect("delete");
        assert_eq!(deleted, 3);

        let stats = store.stats().await.expect("stats");
        assert_eq!(stats.total_entries, 7);
        assert_eq!(stats.distinct_corpus_count, 2);
    }

    #[tokio::test]
    async fn stream_points_surfaces_scroll_errors() {
        struct BrokenStore;

        #[async_trait]
        impl VectorStore for BrokenStore {
            async fn ensure_collection(&self) -> Result<(), StoreError> {
                Ok(())
            }
            async fn upsert(&self, _entries: Vec<NewEntry>) -> Result<usize, StoreError> {
                Ok(0)
            }
            async fn search(
                &self,
                _vector: Vec<f32>,
                _filter: Option<&CorpusFilter>,
                _limit: usize,
            ) -> Result<Vec<ScoredEntry>, StoreError> {
                Ok(Vec::new())
            }
            async fn scroll(
                &self,
                _filter: Option<&CorpusFilter>,
                _cursor: Option<ScrollCursor>,
                _page_size: usize,
            ) -> Result<ScrollPage, StoreError> {
                Err(StoreError::Unavailable("offline".into()))
            }
            async fn delete_points(&self, _ids: Vec<String>) -> Result<usize, StoreError> {
                Ok(0)
            }
            async fn collection_info(&self) -> Result<CollectionInfo, StoreError> {
                Err(StoreError::Unavailable("offline".into()))
            }
        }

        let err = BrokenStore.distinct_corpus_tags().await.expect_err("offline");
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
