//! Vector storage for multi-vector records.
//!
//! [`VectorStore`] is the protocol the retrieval core speaks: collection
//! management, batch upsert, single-vector nearest-neighbor search against
//! multi-vector points, and retrieval of stored token vectors for exact
//! rescoring. Backends:
//!
//! - [`QdrantStore`]: Qdrant over gRPC with MaxSim multivector collections.
//! - [`MemoryStore`]: in-process, exhaustive search, used in tests.
//!
//! [`LimitedStore`] bounds the number of in-flight calls to any backend.

mod limit;
mod memory;
mod qdrant;

pub use limit::LimitedStore;
pub use memory::MemoryStore;
pub use qdrant::{QdrantConfig, QdrantStore};

use lateness_models::{CollectionSchema, IndexRecord, MultiVector, RecordPayload};

/// Error types for vector stores.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Store unreachable or timed out
    #[error("Store unreachable: {0}")]
    Connection(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Collection already exists: {0}")]
    CollectionExists(String),

    /// Request rejected before reaching storage (bad dimension, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),
}

/// Result type for vector stores.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Classify a backend error message.
    ///
    /// Transport-level failures become [`Error::Connection`]; missing
    /// collections become [`Error::CollectionNotFound`].
    pub fn classify(context: &str, collection: &str, message: &str) -> Self {
        let msg = message.to_lowercase();
        if msg.contains("unavailable")
            || msg.contains("transport")
            || msg.contains("connect")
            || msg.contains("deadline")
            || msg.contains("timed out")
            || msg.contains("timeout")
            || msg.contains("broken pipe")
        {
            Error::Connection(format!("{}: {}", context, message))
        } else if msg.contains("doesn't exist") || msg.contains("not found") {
            Error::CollectionNotFound(collection.to_string())
        } else {
            Error::VectorStore(format!("{}: {}", context, message))
        }
    }
}

/// Collection information as reported by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionInfo {
    pub name: String,
    pub exists: bool,
    pub points_count: u64,
    /// Schema read back from the store, when it exists.
    pub schema: Option<CollectionSchema>,
    /// Store reports the collection's index as ready to serve searches.
    pub ready: bool,
}

impl CollectionInfo {
    pub fn missing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            exists: false,
            points_count: 0,
            schema: None,
            ready: false,
        }
    }
}

/// One hit of a single-vector search.
///
/// `score` is the best similarity of the query vector to any of the point's
/// token vectors, higher is better for every metric.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub point_id: String,
    pub doc_id: String,
    pub score: f32,
}

/// A stored point with its token vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPoint {
    pub point_id: String,
    pub vectors: MultiVector,
    pub payload: RecordPayload,
}

/// Protocol between the retrieval core and a vector store.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Create a multi-vector collection. Fails with
    /// [`Error::CollectionExists`] if the name is taken.
    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()>;

    /// Drop a collection; a no-op when it does not exist.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo>;

    /// Write a batch of points in one call, overwriting existing ids.
    async fn upsert(&self, collection: &str, records: Vec<IndexRecord>) -> Result<()>;

    /// Points ranked by their best match against one query vector.
    async fn search(&self, collection: &str, vector: &[f32], limit: usize)
        -> Result<Vec<ScoredPoint>>;

    /// Stored points for the given ids; unknown ids are skipped.
    async fn retrieve(&self, collection: &str, point_ids: &[String]) -> Result<Vec<StoredPoint>>;
}

#[async_trait::async_trait]
impl<S: VectorStore + ?Sized> VectorStore for std::sync::Arc<S> {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        (**self).collection_exists(name).await
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        (**self).create_collection(schema).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        (**self).delete_collection(name).await
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        (**self).collection_info(name).await
    }

    async fn upsert(&self, collection: &str, records: Vec<IndexRecord>) -> Result<()> {
        (**self).upsert(collection, records).await
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        (**self).search(collection, vector, limit).await
    }

    async fn retrieve(&self, collection: &str, point_ids: &[String]) -> Result<Vec<StoredPoint>> {
        (**self).retrieve(collection, point_ids).await
    }
}
