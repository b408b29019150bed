//! In-process multi-vector store.
//!
//! Token vectors of every collection live in one [`RaggedArena`]; points map
//! to arena entries. Search is exhaustive, so results are exact. A
//! reachability switch lets tests simulate an outage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use lateness_models::{CollectionSchema, IndexRecord, RaggedArena, RecordPayload};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{CollectionInfo, Error, Result, ScoredPoint, StoredPoint, VectorStore};

struct MemoryCollection {
    schema: CollectionSchema,
    arena: RaggedArena,
    /// Point id and payload per arena entry.
    points: Vec<(String, RecordPayload)>,
    index: HashMap<String, usize>,
}

impl MemoryCollection {
    fn new(schema: CollectionSchema) -> Result<Self> {
        let arena = RaggedArena::new(schema.vector_dim)
            .map_err(|e| Error::InvalidRequest(e.to_string()))?;
        Ok(Self {
            schema,
            arena,
            points: Vec::new(),
            index: HashMap::new(),
        })
    }

    fn stored(&self, entry: usize) -> Option<StoredPoint> {
        let (point_id, payload) = self.points.get(entry)?;
        Some(StoredPoint {
            point_id: point_id.clone(),
            vectors: self.arena.get(entry)?.to_owned(),
            payload: payload.clone(),
        })
    }
}

/// Store that keeps everything in memory.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
    unreachable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle a simulated outage; while unreachable every call fails with
    /// [`Error::Connection`] and nothing is modified.
    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// All points of a collection, ordered by point id.
    pub async fn dump(&self, collection: &str) -> Result<Vec<StoredPoint>> {
        self.check_reachable()?;
        let collections = self.collections.read().await;
        let col = collections
            .get(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        let mut points: Vec<StoredPoint> =
            (0..col.points.len()).filter_map(|i| col.stored(i)).collect();
        points.sort_by(|a, b| a.point_id.cmp(&b.point_id));
        Ok(points)
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(Error::Connection("memory store marked unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl VectorStore for MemoryStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.check_reachable()?;
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        self.check_reachable()?;
        let collection = MemoryCollection::new(schema.clone())?;

        let mut collections = self.collections.write().await;
        if collections.contains_key(&schema.name) {
            return Err(Error::CollectionExists(schema.name.clone()));
        }
        collections.insert(schema.name.clone(), collection);

        debug!(collection = %schema.name, dimension = schema.vector_dim, "Created in-memory collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.check_reachable()?;
        self.collections.write().await.remove(name);
        Ok(())
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        self.check_reachable()?;
        let collections = self.collections.read().await;
        let Some(col) = collections.get(name) else {
            return Ok(CollectionInfo::missing(name));
        };

        Ok(CollectionInfo {
            name: name.to_string(),
            exists: true,
            points_count: col.points.len() as u64,
            schema: Some(col.schema.clone()),
            ready: true,
        })
    }

    async fn upsert(&self, collection: &str, records: Vec<IndexRecord>) -> Result<()> {
        self.check_reachable()?;
        let mut collections = self.collections.write().await;
        let col = collections
            .get_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        // Validate the whole batch before touching anything.
        for record in &records {
            record
                .vectors
                .check_dim(col.schema.vector_dim)
                .map_err(|e| Error::InvalidRequest(format!("point {}: {}", record.point_id, e)))?;
        }

        let count = records.len();
        for record in records {
            let shape_err = |e: lateness_models::ShapeError| Error::VectorStore(e.to_string());
            match col.index.get(&record.point_id) {
                Some(&entry) => {
                    col.arena.replace(entry, record.vectors.view()).map_err(shape_err)?;
                    col.points[entry].1 = record.payload;
                }
                None => {
                    let entry = col.arena.push(record.vectors.view()).map_err(shape_err)?;
                    col.index.insert(record.point_id.clone(), entry);
                    col.points.push((record.point_id, record.payload));
                }
            }
        }

        debug!(collection, count, "Upserted points");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        self.check_reachable()?;
        let collections = self.collections.read().await;
        let col = collections
            .get(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        if vector.len() != col.schema.vector_dim {
            return Err(Error::InvalidRequest(format!(
                "query vector has dimension {}, collection expects {}",
                vector.len(),
                col.schema.vector_dim
            )));
        }

        let metric = col.schema.distance;
        let mut hits: Vec<ScoredPoint> = col
            .arena
            .iter()
            .map(|(entry, tokens)| {
                let score = tokens
                    .rows()
                    .map(|t| metric.similarity(vector, t))
                    .fold(f32::NEG_INFINITY, f32::max);
                let (point_id, payload) = &col.points[entry];
                ScoredPoint {
                    point_id: point_id.clone(),
                    doc_id: payload.doc_id.clone(),
                    score,
                }
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.doc_id.cmp(&b.doc_id)));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn retrieve(&self, collection: &str, point_ids: &[String]) -> Result<Vec<StoredPoint>> {
        self.check_reachable()?;
        let collections = self.collections.read().await;
        let col = collections
            .get(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        Ok(point_ids
            .iter()
            .filter_map(|id| col.index.get(id).and_then(|&entry| col.stored(entry)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lateness_models::{DistanceMetric, MultiVector};

    fn record(doc_id: &str, rows: Vec<Vec<f32>>) -> IndexRecord {
        IndexRecord::new(doc_id, "", doc_id, MultiVector::from_rows(rows).unwrap())
    }

    async fn store_with_docs() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create_collection(&CollectionSchema::new("docs", 2))
            .await
            .unwrap();
        store
            .upsert(
                "docs",
                vec![
                    record("a", vec![vec![1.0, 0.0], vec![0.0, 1.0]]),
                    record("b", vec![vec![0.0, 1.0]]),
                    record("c", vec![vec![-1.0, 0.0]]),
                ],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let store = MemoryStore::new();
        let schema = CollectionSchema::new("docs", 4);
        store.create_collection(&schema).await.unwrap();
        assert_eq!(
            store.create_collection(&schema).await,
            Err(Error::CollectionExists("docs".to_string()))
        );
    }

    #[tokio::test]
    async fn test_create_rejects_zero_dimension() {
        let store = MemoryStore::new();
        let result = store.create_collection(&CollectionSchema::new("docs", 0)).await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
        assert!(!store.collection_exists("docs").await.unwrap());
    }

    #[tokio::test]
    async fn test_search_scores_best_token() {
        let store = store_with_docs().await;
        let hits = store.search("docs", &[1.0, 0.0], 10).await.unwrap();

        let order: Vec<&str> = hits.iter().map(|h| h.doc_id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!(hits[1].score.abs() < 1e-6);
        assert!((hits[2].score + 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_search_limit_and_ties() {
        let store = store_with_docs().await;
        // a and b both contain [0, 1]; tie breaks on doc id.
        let hits = store.search("docs", &[0.0, 1.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc_id, "a");
        assert_eq!(hits[1].doc_id, "b");
    }

    #[tokio::test]
    async fn test_search_rejects_wrong_dimension() {
        let store = store_with_docs().await;
        assert!(matches!(
            store.search("docs", &[1.0, 0.0, 0.0], 2).await,
            Err(Error::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_point() {
        let store = store_with_docs().await;
        store
            .upsert("docs", vec![record("a", vec![vec![0.5, 0.5]])])
            .await
            .unwrap();

        let info = store.collection_info("docs").await.unwrap();
        assert_eq!(info.points_count, 3);

        let points = store.retrieve("docs", &[lateness_models::point_id("a")]).await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].vectors.as_flat(), &[0.5, 0.5]);
    }

    #[tokio::test]
    async fn test_upsert_rejects_batch_with_wrong_dimension() {
        let store = store_with_docs().await;
        let result = store
            .upsert(
                "docs",
                vec![
                    record("d", vec![vec![1.0, 1.0]]),
                    record("e", vec![vec![1.0, 1.0, 1.0]]),
                ],
            )
            .await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
        assert_eq!(store.collection_info("docs").await.unwrap().points_count, 3);
    }

    #[tokio::test]
    async fn test_retrieve_skips_unknown_ids() {
        let store = store_with_docs().await;
        let ids = vec![lateness_models::point_id("b"), "missing".to_string()];
        let points = store.retrieve("docs", &ids).await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].payload.doc_id, "b");
    }

    #[tokio::test]
    async fn test_euclidean_scores_negated() {
        let store = MemoryStore::new();
        store
            .create_collection(&CollectionSchema::new("l2", 2).with_distance(DistanceMetric::Euclidean))
            .await
            .unwrap();
        store
            .upsert(
                "l2",
                vec![record("near", vec![vec![1.0, 1.0]]), record("far", vec![vec![4.0, 5.0]])],
            )
            .await
            .unwrap();

        let hits = store.search("l2", &[1.0, 1.0], 5).await.unwrap();
        assert_eq!(hits[0].doc_id, "near");
        assert!((hits[1].score + 5.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_unreachable_fails_without_changes() {
        let store = store_with_docs().await;
        store.set_reachable(false);

        let err = store
            .upsert("docs", vec![record("z", vec![vec![1.0, 0.0]])])
            .await
            .unwrap_err();
        assert!(err.is_connection());
        assert!(store.search("docs", &[1.0, 0.0], 1).await.unwrap_err().is_connection());

        store.set_reachable(true);
        assert_eq!(store.dump("docs").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_collection() {
        let store = MemoryStore::new();
        assert!(!store.collection_info("nope").await.unwrap().exists);
        assert_eq!(
            store.search("nope", &[1.0], 1).await,
            Err(Error::CollectionNotFound("nope".to_string()))
        );
        store.delete_collection("nope").await.unwrap();
    }
}
