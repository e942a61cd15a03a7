//! SQLite-backed vector store for single-machine deployments.
//!
//! Each collection lives in `<root>/<name>.sqlite3` with two tables: `collection_meta`
//! fixes the dimension on first open and `entries` holds one row per chunk with its
//! vector as a little-endian `f32` blob. Ranking is brute-force cosine similarity.

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use rusqlite::{Connection, TransactionBehavior, params, params_from_iter};
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use super::{
    CollectionInfo, CorpusFilter, EntryPayload, NewEntry, PointRef, ScoredEntry, ScrollCursor,
    ScrollPage, StoreError, VectorStore, check_dimension, cosine_similarity, validate_entries,
};

const DB_EXTENSION: &str = "sqlite3";
const DISTANCE: &str = "Cosine";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS collection_meta (
    name TEXT PRIMARY KEY,
    dimension INTEGER NOT NULL,
    distance TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY,
    vector BLOB NOT NULL,
    text TEXT NOT NULL,
    file_name TEXT NOT NULL,
    corpus_tag TEXT NOT NULL,
    ordinal INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entries_corpus_tag ON entries(corpus_tag, id);
";

struct LocalInner {
    path: PathBuf,
    collection: String,
    dimension: usize,
    conn: Mutex<Option<Connection>>,
}

/// SQLite-backed [`VectorStore`] with brute-force cosine ranking.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<LocalInner>,
}

impl LocalStore {
    /// Prepare a handle for `collection` under `root`. The database is opened on the first
    /// operation.
    pub fn open(
        root: impl AsRef<Path>,
        collection: &str,
        dimension: usize,
    ) -> Result<Self, StoreError> {
        if collection.is_empty()
            || collection.starts_with('.')
            || collection.contains(['/', '\\'])
        {
            return Err(StoreError::Unavailable(format!(
                "invalid collection name `{collection}`"
            )));
        }
        if dimension == 0 {
            return Err(StoreError::Unavailable(
                "vector dimension must be greater than zero".into(),
            ));
        }

        Ok(Self {
            inner: Arc::new(LocalInner {
                path: root.as_ref().join(format!("{collection}.{DB_EXTENSION}")),
                collection: collection.to_string(),
                dimension,
                conn: Mutex::new(None),
            }),
        })
    }

    async fn run_blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&LocalInner, &mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.with_connection(op))
            .await
            .map_err(|err| StoreError::Unavailable(format!("store task failed: {err}")))?
    }
}

impl LocalInner {
    fn with_connection<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&LocalInner, &mut Connection) -> Result<T, StoreError>,
    {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| StoreError::Unavailable("store connection lock poisoned".into()))?;
        if guard.is_none() {
            *guard = Some(self.connect()?);
        }
        let conn = guard
            .as_mut()
            .ok_or_else(|| StoreError::Unavailable("store connection missing".into()))?;
        op(self, conn)
    }

    /// Open the database, create the schema, and pin or check the collection dimension.
    fn connect(&self) -> Result<Connection, StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let created_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        let dimension = usize_to_i64(self.dimension)?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(SCHEMA_SQL)?;
        let created = tx.execute(
            "INSERT OR IGNORE INTO collection_meta (name, dimension, distance, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![self.collection, dimension, DISTANCE, created_at],
        )?;
        let stored: i64 = tx.query_row(
            "SELECT dimension FROM collection_meta WHERE name = ?1",
            params![self.collection],
            |row| row.get(0),
        )?;
        tx.commit()?;

        let stored = usize::try_from(stored).map_err(|_| {
            StoreError::Unavailable(format!("corrupt collection dimension {stored}"))
        })?;
        if stored != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: stored,
                actual: self.dimension,
            });
        }

        if created == 1 {
            tracing::info!(
                collection = %self.collection,
                dimension = self.dimension,
                path = %self.path.display(),
                "Created local collection"
            );
        } else {
            tracing::debug!(collection = %self.collection, "Opened local collection");
        }
        Ok(conn)
    }
}

/// Append `corpus_tag IN (...)` for `filter` to `clauses`, pushing its bind values.
fn push_tag_clause(
    filter: Option<&CorpusFilter>,
    clauses: &mut Vec<String>,
    binds: &mut Vec<String>,
) {
    let Some(filter) = filter else {
        return;
    };
    let before = binds.len();
    binds.extend(filter.tags().map(str::to_string));
    let placeholders = vec!["?"; binds.len() - before].join(", ");
    clauses.push(format!("corpus_tag IN ({placeholders})"));
}

fn where_sql(clauses: &[String]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_vector(blob: &[u8], dimension: usize) -> Result<Vec<f32>, StoreError> {
    if blob.len() != dimension * std::mem::size_of::<f32>() {
        return Err(StoreError::Unavailable(format!(
            "stored vector has {} bytes, expected {}",
            blob.len(),
            dimension * std::mem::size_of::<f32>()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn usize_to_i64(value: usize) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Unavailable(format!("{value} exceeds i64")))
}

fn read_ordinal(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(index)?;
    u64::try_from(raw).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(index, raw))
}

#[async_trait]
impl VectorStore for LocalStore {
    async fn ensure_collection(&self) -> Result<(), StoreError> {
        self.run_blocking(|_, _| Ok(())).await
    }

    async fn upsert(&self, entries: Vec<NewEntry>) -> Result<usize, StoreError> {
        if entries.is_empty() {
            return Ok(0);
        }
        validate_entries(&entries, self.inner.dimension)?;

        self.run_blocking(move |inner, conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            {
                let mut insert = tx.prepare_cached(
                    "INSERT INTO entries (id, vector, text, file_name, corpus_tag, ordinal)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for entry in &entries {
                    let ordinal = i64::try_from(entry.payload.ordinal).map_err(|_| {
                        StoreError::Unavailable(format!(
                            "ordinal {} exceeds i64",
                            entry.payload.ordinal
                        ))
                    })?;
                    insert.execute(params![
                        Uuid::new_v4().to_string(),
                        encode_vector(&entry.vector),
                        entry.payload.text,
                        entry.payload.file_name,
                        entry.payload.corpus_tag,
                        ordinal,
                    ])?;
                }
            }
            tx.commit()?;

            let written = entries.len();
            tracing::debug!(collection = %inner.collection, written, "Inserted entries");
            Ok(written)
        })
        .await
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
        check_dimension(self.inner.dimension, vector.len())?;
        let filter = filter.cloned();

        self.run_blocking(move |inner, conn| {
            let mut clauses = Vec::new();
            let mut binds = Vec::new();
            push_tag_clause(filter.as_ref(), &mut clauses, &mut binds);
            let sql = format!(
                "SELECT id, vector, text, file_name, corpus_tag, ordinal FROM entries{}",
                where_sql(&clauses)
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(binds.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    EntryPayload {
                        text: row.get(2)?,
                        file_name: row.get(3)?,
                        corpus_tag: row.get(4)?,
                        ordinal: read_ordinal(row, 5)?,
                    },
                ))
            })?;

            let mut hits = Vec::new();
            for row in rows {
                let (id, blob, payload) = row?;
                let stored = decode_vector(&blob, inner.dimension)?;
                hits.push(ScoredEntry {
                    id,
                    score: cosine_similarity(&vector, &stored),
                    payload,
                });
            }
            hits.sort_by(|left, right| {
                right
                    .score
                    .total_cmp(&left.score)
                    .then_with(|| left.id.cmp(&right.id))
            });
            hits.truncate(limit);
            Ok(hits)
        })
        .await
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
        let after = match cursor {
            Some(ScrollCursor(Value::String(raw))) => Uuid::parse_str(&raw)
                .map_err(|_| StoreError::InvalidCursor(raw.clone()))?
                .to_string(),
            Some(ScrollCursor(other)) => return Err(StoreError::InvalidCursor(other.to_string())),
            None => String::new(),
        };
        let filter = filter.cloned();

        self.run_blocking(move |_, conn| {
            let mut clauses = Vec::new();
            let mut binds = Vec::new();
            push_tag_clause(filter.as_ref(), &mut clauses, &mut binds);
            clauses.push("id > ?".to_string());
            binds.push(after);
            let sql = format!(
                "SELECT id, corpus_tag FROM entries{} ORDER BY id LIMIT {}",
                where_sql(&clauses),
                page_size.saturating_add(1)
            );

            let mut stmt = conn.prepare(&sql)?;
            let mut points = stmt
                .query_map(params_from_iter(binds.iter()), |row| {
                    Ok(PointRef {
                        id: row.get(0)?,
                        corpus_tag: Some(row.get(1)?),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let next = if points.len() > page_size {
                points.truncate(page_size);
                points
                    .last()
                    .map(|point| ScrollCursor(Value::String(point.id.clone())))
            } else {
                None
            };
            Ok(ScrollPage { points, next })
        })
        .await
    }

    async fn delete_points(&self, ids: Vec<String>) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        self.run_blocking(move |inner, conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut removed = 0;
            {
                let mut delete = tx.prepare_cached("DELETE FROM entries WHERE id = ?1")?;
                for id in &ids {
                    removed += delete.execute(params![id])?;
                }
            }
            tx.commit()?;
            tracing::debug!(collection = %inner.collection, removed, "Deleted entries");
            Ok(removed)
        })
        .await
    }

    async fn collection_info(&self) -> Result<CollectionInfo, StoreError> {
        self.run_blocking(|inner, conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
            Ok(CollectionInfo {
                points_count: u64::try_from(count).unwrap_or_default(),
                dimension: inner.dimension,
            })
        })
        .await
    }

    async fn distinct_corpus_tags(&self) -> Result<BTreeSet<String>, StoreError> {
        self.run_blocking(|_, conn| {
            let mut stmt = conn.prepare("SELECT DISTINCT corpus_tag FROM entries")?;
            let tags = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<BTreeSet<_>, _>>()?;
            Ok(tags)
        })
        .await
    }

    async fn delete_by_corpus_tag(&self, corpus_tag: &str) -> Result<usize, StoreError> {
        let tag = corpus_tag.to_string();
        let deleted = self
            .run_blocking(move |_, conn| {
                Ok(conn.execute("DELETE FROM entries WHERE corpus_tag = ?1", params![tag])?)
            })
            .await?;
        if deleted == 0 {
            tracing::debug!(corpus_tag, "No entries to delete");
        } else {
            tracing::info!(corpus_tag, deleted, "Corpus deleted");
        }
        Ok(deleted)
    }
}
