//! HTTP client implementing [`VectorStore`] over the Qdrant REST API.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

use super::{
    filters::{CORPUS_TAG_FIELD, build_corpus_filter},
    payload::{build_payload, corpus_tag_of, parse_payload, point_id_value, stringify_point_id},
    types::{CollectionResponse, QdrantError, QueryResponse, QueryResponseResult, ScrollResponse},
};
use crate::store::{
    CollectionInfo, CorpusFilter, NewEntry, PointRef, ScoredEntry, ScrollCursor, ScrollPage,
    StoreError, VectorStore, check_dimension, validate_entries,
};

/// Qdrant-backed vector store bound to one collection.
pub struct QdrantStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
    dimension: usize,
}

impl QdrantStore {
    /// Build a client for `collection` on the Qdrant instance at `url`.
    pub fn new(
        url: &str,
        api_key: Option<String>,
        collection: &str,
        dimension: usize,
    ) -> Result<Self, QdrantError> {
        let client = Client::builder().user_agent("localrag/0.1").build()?;
        let base_url = normalize_base_url(url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            collection,
            has_api_key = api_key.as_deref().is_some_and(|value| !value.is_empty()),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
            collection: collection.to_string(),
            dimension,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    fn collection_path(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("collections/{}", self.collection)
        } else {
            format!("collections/{}/{suffix}", self.collection)
        }
    }

    async fn ensure_success(
        &self,
        response: reqwest::Response,
        operation: &str,
    ) -> Result<reqwest::Response, QdrantError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let error = QdrantError::UnexpectedStatus { status, body };
        tracing::error!(
            collection = %self.collection,
            operation,
            error = %error,
            "Qdrant request failed"
        );
        Err(error)
    }

    /// Fetch collection properties; `None` when the collection does not exist.
    async fn fetch_collection(&self) -> Result<Option<CollectionInfo>, QdrantError> {
        let response = self
            .request(Method::GET, &self.collection_path(""))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = self.ensure_success(response, "get collection").await?;
        let CollectionResponse { result } = response.json().await?;
        let dimension = result.config.params.vector_size().ok_or_else(|| {
            QdrantError::MalformedResponse("collection has no single vector size".into())
        })?;
        Ok(Some(CollectionInfo {
            points_count: result.points_count.unwrap_or(0),
            dimension,
        }))
    }

    /// Create the collection, returning `false` when another creator got there first.
    async fn create_collection(&self) -> Result<bool, QdrantError> {
        let body = json!({
            "vectors": {
                "size": self.dimension,
                "distance": "Cosine"
            }
        });
        let response = self
            .request(Method::PUT, &self.collection_path(""))
            .json(&body)
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Ok(false);
        }
        self.ensure_success(response, "create collection").await?;
        Ok(true)
    }

    /// Create the keyword index on the corpus tag field.
    ///
    /// Only transport failures are returned. A non-success status other than 409 is logged at
    /// `warn` and ignored, since filtered queries still work without the index.
    async fn ensure_payload_index(&self) -> Result<(), QdrantError> {
        let body = json!({
            "field_name": CORPUS_TAG_FIELD,
            "field_schema": "keyword",
        });
        let response = self
            .request(Method::PUT, &self.collection_path("index"))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::CONFLICT {
            tracing::debug!(
                collection = %self.collection,
                field = CORPUS_TAG_FIELD,
                "Payload index ensured"
            );
        } else {
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::warn!(collection = %self.collection, error = %error, "Failed to ensure payload index");
        }
        Ok(())
    }

    fn check_existing(&self, info: CollectionInfo) -> Result<(), StoreError> {
        if info.dimension != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: info.dimension,
                actual: self.dimension,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self) -> Result<(), StoreError> {
        if let Some(info) = self.fetch_collection().await? {
            return self.check_existing(info);
        }

        if self.create_collection().await? {
            tracing::info!(
                collection = %self.collection,
                dimension = self.dimension,
                "Created Qdrant collection"
            );
            self.ensure_payload_index().await?;
            return Ok(());
        }

        tracing::debug!(collection = %self.collection, "Collection created concurrently");
        match self.fetch_collection().await? {
            Some(info) => self.check_existing(info),
            None => Err(StoreError::Unavailable(format!(
                "collection {} vanished after a create conflict",
                self.collection
            ))),
        }
    }

    async fn upsert(&self, entries: Vec<NewEntry>) -> Result<usize, StoreError> {
        if entries.is_empty() {
            return Ok(0);
        }
        validate_entries(&entries, self.dimension)?;

        let points: Vec<Value> = entries
            .iter()
            .map(|entry| {
                json!({
                    "id": Uuid::new_v4().to_string(),
                    "vector": entry.vector,
                    "payload": build_payload(&entry.payload),
                })
            })
            .collect();
        let written = points.len();

        let response = self
            .request(Method::PUT, &self.collection_path("points"))
            .query(&[("wait", true)])
            .json(&json!({ "points": points }))
            .send()
            .await
            .map_err(QdrantError::from)?;
        self.ensure_success(response, "upsert points").await?;
        tracing::debug!(collection = %self.collection, written, "Points indexed");
        Ok(written)
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        filter: Option<&CorpusFilter>,
        limit: usize,
    ) -> Result<Vec<ScoredEntry>, StoreError> {
        if limit == 0 {
            return Err(StoreError::InvalidLimit);
        }
        check_dimension(self.dimension, vector.len())?;

        let mut body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let (Some(filter), Some(object)) = (filter, body.as_object_mut()) {
            object.insert("filter".into(), build_corpus_filter(filter));
        }

        let response = self
            .request(Method::POST, &self.collection_path("points/query"))
            .json(&body)
            .send()
            .await
            .map_err(QdrantError::from)?;
        let response = self.ensure_success(response, "query points").await?;
        let payload: QueryResponse = response.json().await.map_err(QdrantError::from)?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };

        let mut hits = Vec::with_capacity(points.len());
        for point in points {
            let id = stringify_point_id(point.id);
            match point.payload.and_then(parse_payload) {
                Some(payload) => hits.push(ScoredEntry {
                    id,
                    score: point.score,
                    payload,
                }),
                None => tracing::warn!(
                    collection = %self.collection,
                    id = %id,
                    "Skipping point with incomplete payload"
                ),
            }
        }
        hits.truncate(limit);
        Ok(hits)
    }

    async fn scroll(
        &self,
        filter: Option<&CorpusFilter>,
        cursor: Option<ScrollCursor>,
        page_size: usize,
    ) -> Result<ScrollPage, StoreError> {
        if page_size == 0 {
            return Err(StoreError::InvalidLimit);
        }

        let offset = cursor.map(|ScrollCursor(value)| value).unwrap_or(Value::Null);
        let filter = filter
            .map(build_corpus_filter)
            .unwrap_or_else(|| json!({ "must": [] }));
        let body = json!({
            "with_payload": [CORPUS_TAG_FIELD],
            "with_vector": false,
            "limit": page_size,
            "offset": offset,
            "filter": filter,
        });

        let response = self
            .request(Method::POST, &self.collection_path("points/scroll"))
            .json(&body)
            .send()
            .await
            .map_err(QdrantError::from)?;
        let response = self.ensure_success(response, "scroll points").await?;
        let ScrollResponse { result } = response.json().await.map_err(QdrantError::from)?;

        let points = result
            .points
            .into_iter()
            .filter_map(|point| {
                let id = stringify_point_id(point.id?);
                let corpus_tag = point.payload.as_ref().and_then(corpus_tag_of);
                Some(PointRef { id, corpus_tag })
            })
            .collect();
        Ok(ScrollPage {
            points,
            next: result
                .next_page_offset
                .filter(|offset| !offset.is_null())
                .map(ScrollCursor),
        })
    }

    /// Qdrant does not report how many ids existed, so the requested count is returned.
    async fn delete_points(&self, ids: Vec<String>) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let points: Vec<Value> = ids.iter().map(|id| point_id_value(id)).collect();
        let response = self
            .request(Method::POST, &self.collection_path("points/delete"))
            .query(&[("wait", true)])
            .json(&json!({ "points": points }))
            .send()
            .await
            .map_err(QdrantError::from)?;
        self.ensure_success(response, "delete points").await?;
        tracing::debug!(collection = %self.collection, removed = ids.len(), "Points deleted");
        Ok(ids.len())
    }

    async fn collection_info(&self) -> Result<CollectionInfo, StoreError> {
        self.fetch_collection().await?.ok_or_else(|| {
            StoreError::Unavailable(format!("collection {} does not exist", self.collection))
        })
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
