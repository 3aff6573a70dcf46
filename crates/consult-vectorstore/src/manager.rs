use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use consult_core::embed::Embedder;
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::codec::{cosine_distance, decode_embedding, encode_embedding};
use crate::error::VectorStoreError;
use crate::types::{DocFilter, Document, NewDocument};

/// Narrow interface the analysis graph depends on for retrieval. A brute
/// force cosine scan over a collection's rows — fine at the row counts this
/// system targets; the trait boundary is what lets a future indexed
/// implementation swap in without touching callers.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn similarity_search(
        &self,
        collection: &str,
        query: &str,
        k: usize,
        filter: Option<&DocFilter>,
    ) -> Result<Vec<Document>, VectorStoreError>;

    async fn similarity_search_with_score(
        &self,
        collection: &str,
        query: &str,
        k: usize,
        filter: Option<&DocFilter>,
    ) -> Result<Vec<(Document, f32)>, VectorStoreError>;

    async fn upsert(
        &self,
        collection: &str,
        documents: Vec<NewDocument>,
    ) -> Result<(), VectorStoreError>;
}

/// SQLite-backed vector store. Embeddings are stored as little-endian
/// `f32` blobs; distance is computed in Rust after loading a collection's
/// rows, never pushed down into SQL.
pub struct SqliteVectorStore {
    db: Mutex<Connection>,
    embedder: Arc<dyn Embedder>,
    /// Set when the backing store failed to open (e.g. bad path at
    /// startup). Queries degrade to empty results instead of erroring.
    is_degraded: bool,
}

impl SqliteVectorStore {
    pub fn new(conn: Connection, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            db: Mutex::new(conn),
            embedder,
            is_degraded: false,
        }
    }

    /// Construct a store that always returns empty results — used when the
    /// configured database path could not be opened at startup.
    pub fn degraded(embedder: Arc<dyn Embedder>) -> Self {
        warn!("vector store opened in degraded mode: backend unavailable, queries return empty results");
        Self {
            db: Mutex::new(Connection::open_in_memory().expect("in-memory sqlite never fails")),
            embedder,
            is_degraded: true,
        }
    }

    fn load_collection(&self, collection: &str) -> Result<Vec<Document>, VectorStoreError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, collection, text, metadata, embedding, created_at
             FROM documents WHERE collection = ?1",
        )?;
        let rows = stmt.query_map(rusqlite::params![collection], row_to_document)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn similarity_search(
        &self,
        collection: &str,
        query: &str,
        k: usize,
        filter: Option<&DocFilter>,
    ) -> Result<Vec<Document>, VectorStoreError> {
        Ok(self
            .similarity_search_with_score(collection, query, k, filter)
            .await?
            .into_iter()
            .map(|(doc, _)| doc)
            .collect())
    }

    async fn similarity_search_with_score(
        &self,
        collection: &str,
        query: &str,
        k: usize,
        filter: Option<&DocFilter>,
    ) -> Result<Vec<(Document, f32)>, VectorStoreError> {
        if k == 0 || self.is_degraded {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| VectorStoreError::Embedding(e.to_string()))?;

        let candidates = self.load_collection(collection)?;
        let mut scored: Vec<(Document, f32)> = candidates
            .into_iter()
            .filter(|d| filter.map(|f| f.matches(d)).unwrap_or(true))
            .map(|d| {
                let dist = cosine_distance(&query_embedding, &d.embedding);
                (d, dist)
            })
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn upsert(
        &self,
        collection: &str,
        documents: Vec<NewDocument>,
    ) -> Result<(), VectorStoreError> {
        if self.is_degraded {
            debug!(collection, "skipping upsert: vector store is degraded");
            return Ok(());
        }
        let now = chrono::Utc::now().to_rfc3339();

        let mut rows = Vec::with_capacity(documents.len());
        for doc in documents {
            let embedding = self
                .embedder
                .embed(&doc.text)
                .await
                .map_err(|e| VectorStoreError::Embedding(e.to_string()))?;
            let metadata = serde_json::to_string(&doc.metadata)
                .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
            rows.push((doc.id, doc.text, metadata, encode_embedding(&embedding)));
        }

        let db = self.db.lock().unwrap();
        for (id, text, metadata, embedding) in rows {
            db.execute(
                "INSERT INTO documents (id, collection, text, metadata, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    text = excluded.text, metadata = excluded.metadata,
                    embedding = excluded.embedding",
                rusqlite::params![id, collection, text, metadata, embedding, now],
            )?;
        }
        Ok(())
    }
}

pub(crate) fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let metadata_str: String = row.get(3)?;
    let embedding_blob: Vec<u8> = row.get(4)?;
    let created_at_str: String = row.get(5)?;
    Ok(Document {
        id: row.get(0)?,
        collection: row.get(1)?,
        text: row.get(2)?,
        metadata: serde_json::from_str(&metadata_str).unwrap_or_default(),
        embedding: decode_embedding(&embedding_blob),
        created_at: created_at_str
            .parse()
            .unwrap_or_else(|_| chrono::Utc::now()),
    })
}
