use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map as JsonMap;

/// A stored document with its dense embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub collection: String,
    pub text: String,
    pub metadata: JsonMap<String, serde_json::Value>,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// A document awaiting insertion — `embed()` fills in the vector, the
/// caller assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub id: String,
    pub text: String,
    pub metadata: JsonMap<String, serde_json::Value>,
}

/// Metadata filter applied after the similarity scan (small candidate sets
/// only — this is not a secondary index).
#[derive(Debug, Clone, Default)]
pub struct DocFilter {
    pub metadata_equals: Vec<(String, serde_json::Value)>,
}

impl DocFilter {
    pub fn eq(key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            metadata_equals: vec![(key.into(), value.into())],
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.metadata_equals
            .iter()
            .all(|(k, v)| doc.metadata.get(k) == Some(v))
    }
}

/// A semantic-cache row: a previously embedded query plus the document ids
/// it resolved to last time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: i64,
    pub query_text: String,
    pub query_embedding: Vec<f32>,
    pub category: String,
    pub doc_ids: Vec<String>,
    pub hit_count: u64,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a cache lookup — tells the caller whether the result came
/// from a prior query or a fresh similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheLookup {
    pub documents: Vec<Document>,
    pub cache_hit: bool,
}
