//! Index records written to the store and ranked search results.

use serde::{Deserialize, Serialize};

use crate::{point_id, Document, MultiVector};

/// Non-vector metadata stored with each point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayload {
    pub doc_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
}

/// One point as written by the indexer.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub point_id: String,
    pub vectors: MultiVector,
    pub payload: RecordPayload,
}

impl IndexRecord {
    pub fn new(doc_id: &str, title: &str, text: &str, vectors: MultiVector) -> Self {
        Self {
            point_id: point_id(doc_id),
            vectors,
            payload: RecordPayload {
                doc_id: doc_id.to_string(),
                title: title.to_string(),
                text: text.to_string(),
            },
        }
    }

    pub fn doc_id(&self) -> &str {
        &self.payload.doc_id
    }
}

impl From<Document> for IndexRecord {
    fn from(doc: Document) -> Self {
        Self {
            point_id: point_id(&doc.id),
            vectors: doc.embeddings,
            payload: RecordPayload {
                doc_id: doc.id,
                title: doc.title,
                text: doc.text,
            },
        }
    }
}

/// A ranked document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub doc_id: String,
    pub score: f32,
    /// 1-based position in the ranking.
    pub rank: usize,
}
