use std::sync::{Arc, Mutex};

use consult_core::embed::Embedder;
use rusqlite::Connection;
use tracing::debug;

use crate::codec::{cosine_distance, decode_embedding, encode_embedding};
use crate::error::VectorStoreError;
use crate::manager::VectorStore;
use crate::types::{CacheLookup, Document};

/// Semantic cache sitting in front of a [`VectorStore`]: a query whose
/// embedding lands within `threshold` cosine distance of a previously
/// answered query in the same category reuses that answer instead of
/// re-running the similarity search.
///
/// No automatic expiry — entries live until [`SemanticCache::clear_cache`]
/// is called explicitly.
pub struct SemanticCache {
    db: Mutex<Connection>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    threshold: f32,
}

impl SemanticCache {
    pub fn new(
        conn: Connection,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        threshold: f32,
    ) -> Self {
        Self {
            db: Mutex::new(conn),
            embedder,
            store,
            threshold,
        }
    }

    /// Look up `query` in `category`'s cache; on miss, search the primary
    /// collection and insert a new cache row.
    pub async fn lookup_or_search(
        &self,
        collection: &str,
        category: &str,
        query: &str,
        k: usize,
    ) -> Result<CacheLookup, VectorStoreError> {
        if k == 0 {
            return Ok(CacheLookup {
                documents: Vec::new(),
                cache_hit: false,
            });
        }

        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| VectorStoreError::Embedding(e.to_string()))?;

        if let Some((entry_id, doc_ids)) = self.best_cache_match(category, &query_embedding)? {
            self.bump_hit_count(entry_id)?;
            let docs = self.fetch_documents(collection, &doc_ids)?;
            if !docs.is_empty() {
                debug!(category, entry_id, "semantic cache hit");
                return Ok(CacheLookup {
                    documents: docs,
                    cache_hit: true,
                });
            }
        }

        let documents = self
            .store
            .similarity_search(collection, query, k, None)
            .await?;
        let doc_ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
        self.insert_cache_row(query, &query_embedding, category, &doc_ids)?;

        Ok(CacheLookup {
            documents,
            cache_hit: false,
        })
    }

    /// Clear cache rows — all of them, or just one category.
    pub fn clear_cache(&self, category: Option<&str>) -> Result<(), VectorStoreError> {
        let db = self.db.lock().unwrap();
        match category {
            Some(cat) => {
                db.execute("DELETE FROM cache_entries WHERE category = ?1", [cat])?;
            }
            None => {
                db.execute("DELETE FROM cache_entries", [])?;
            }
        }
        Ok(())
    }

    /// Returns the closest cache row for `category` within `threshold`,
    /// breaking ties by higher hit count, then newer creation time.
    fn best_cache_match(
        &self,
        category: &str,
        query_embedding: &[f32],
    ) -> Result<Option<(i64, Vec<String>)>, VectorStoreError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, query_embedding, doc_ids, hit_count, created_at
             FROM cache_entries WHERE category = ?1",
        )?;
        let rows = stmt.query_map(rusqlite::params![category], |row| {
            let id: i64 = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            let doc_ids_str: String = row.get(2)?;
            let hit_count: i64 = row.get(3)?;
            let created_at: String = row.get(4)?;
            Ok((id, blob, doc_ids_str, hit_count, created_at))
        })?;

        let mut best: Option<(i64, Vec<String>, f32, i64, String)> = None;
        for row in rows.filter_map(|r| r.ok()) {
            let (id, blob, doc_ids_str, hit_count, created_at) = row;
            let embedding = decode_embedding(&blob);
            let dist = cosine_distance(query_embedding, &embedding);
            if dist > self.threshold {
                continue;
            }
            let doc_ids: Vec<String> = serde_json::from_str(&doc_ids_str).unwrap_or_default();
            let better = match &best {
                None => true,
                Some((_, _, best_dist, best_hits, best_created)) => {
                    dist < *best_dist
                        || (dist == *best_dist && hit_count > *best_hits)
                        || (dist == *best_dist
                            && hit_count == *best_hits
                            && created_at.as_str() > best_created.as_str())
                }
            };
            if better {
                best = Some((id, doc_ids, dist, hit_count, created_at));
            }
        }

        Ok(best.map(|(id, doc_ids, _, _, _)| (id, doc_ids)))
    }

    fn bump_hit_count(&self, entry_id: i64) -> Result<(), VectorStoreError> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE cache_entries SET hit_count = hit_count + 1 WHERE id = ?1",
            rusqlite::params![entry_id],
        )?;
        Ok(())
    }

    fn insert_cache_row(
        &self,
        query_text: &str,
        query_embedding: &[f32],
        category: &str,
        doc_ids: &[String],
    ) -> Result<(), VectorStoreError> {
        let now = chrono::Utc::now().to_rfc3339();
        let doc_ids_json = serde_json::to_string(doc_ids)
            .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO cache_entries
                (query_text, query_embedding, category, doc_ids, hit_count, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            rusqlite::params![
                query_text,
                encode_embedding(query_embedding),
                category,
                doc_ids_json,
                now,
            ],
        )?;
        Ok(())
    }

    fn fetch_documents(
        &self,
        collection: &str,
        doc_ids: &[String],
    ) -> Result<Vec<Document>, VectorStoreError> {
        if doc_ids.is_empty() {
            return Ok(Vec::new());
        }
        let db = self.db.lock().unwrap();
        let placeholders = doc_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT id, collection, text, metadata, embedding, created_at
             FROM documents WHERE collection = ? AND id IN ({})",
            placeholders
        );
        let mut stmt = db.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> = std::iter::once(&collection as &dyn rusqlite::ToSql)
            .chain(doc_ids.iter().map(|id| id as &dyn rusqlite::ToSql))
            .collect();
        let rows = stmt.query_map(params.as_slice(), crate::manager::row_to_document)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}
