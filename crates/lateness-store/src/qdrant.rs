//! Qdrant backend.
//!
//! Collections are created with a multivector config using the MaxSim
//! comparator, so a single-vector query scores each point by its best
//! matching token. Point ids are the UUIDs derived from document ids.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use lateness_models::{CollectionSchema, DistanceMetric, IndexRecord, MultiVector, RecordPayload};
use qdrant_client::qdrant::{
    point_id::PointIdOptions, value::Kind, vectors_config::Config as VectorsConfigKind,
    vectors::VectorsOptions, CollectionStatus, CreateCollectionBuilder, Distance,
    GetPointsBuilder, MultiVectorComparator, MultiVectorConfigBuilder, PointId, PointStruct, Query,
    QueryPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, Vector, VectorInput,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{CollectionInfo, Error, Result, ScoredPoint, StoredPoint, VectorStore};

/// Point payload key names
const KEY_DOC_ID: &str = "doc_id";
const KEY_TITLE: &str = "title";
const KEY_TEXT: &str = "text";

/// Configuration for the Qdrant backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl QdrantConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Multi-vector store backed by Qdrant.
#[derive(Clone)]
pub struct QdrantStore {
    inner: Arc<QdrantStoreInner>,
}

struct QdrantStoreInner {
    client: Qdrant,
    /// Schemas seen through create/info, so per-token searches skip the info RPCs.
    schemas: SchemaCache,
}

/// Collection schemas known to this client, keyed by collection name.
#[derive(Default)]
struct SchemaCache {
    entries: RwLock<HashMap<String, CollectionSchema>>,
}

impl SchemaCache {
    async fn get(&self, name: &str) -> Option<CollectionSchema> {
        self.entries.read().await.get(name).cloned()
    }

    async fn remember(&self, schema: CollectionSchema) {
        self.entries.write().await.insert(schema.name.clone(), schema);
    }

    async fn forget(&self, name: &str) {
        self.entries.write().await.remove(name);
    }
}

impl QdrantStore {
    /// Connect and verify the server answers.
    pub async fn new(config: &QdrantConfig) -> Result<Self> {
        let mut builder = Qdrant::from_url(&config.url).timeout(Duration::from_secs(config.timeout_secs));
        if let Some(key) = &config.api_key {
            builder = builder.api_key(key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| Error::Connection(format!("Failed to connect to Qdrant: {}", e)))?;

        // Test connection
        client
            .list_collections()
            .await
            .map_err(|e| Error::Connection(format!("Qdrant connection test failed: {}", e)))?;

        info!(url = %config.url, "Qdrant store connected");

        Ok(Self {
            inner: Arc::new(QdrantStoreInner {
                client,
                schemas: SchemaCache::default(),
            }),
        })
    }

    fn client(&self) -> &Qdrant {
        &self.inner.client
    }

    /// Schema of a collection, from the cache or the server.
    async fn schema(&self, collection: &str) -> Result<CollectionSchema> {
        if let Some(schema) = self.inner.schemas.get(collection).await {
            return Ok(schema);
        }
        self.collection_info(collection)
            .await?
            .schema
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))
    }
}

#[async_trait::async_trait]
impl VectorStore for QdrantStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.client()
            .collection_exists(name)
            .await
            .map_err(|e| Error::classify("Failed to check collection", name, &e.to_string()))
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        if self.collection_exists(&schema.name).await? {
            return Err(Error::CollectionExists(schema.name.clone()));
        }

        let mut params = VectorParamsBuilder::new(schema.vector_dim as u64, to_qdrant_distance(schema.distance))
            .on_disk(schema.on_disk);
        if schema.multi_vector {
            params = params.multivector_config(MultiVectorConfigBuilder::new(MultiVectorComparator::MaxSim));
        }

        self.client()
            .create_collection(CreateCollectionBuilder::new(&schema.name).vectors_config(params))
            .await
            .map_err(|e| Error::classify("Failed to create collection", &schema.name, &e.to_string()))?;
        self.inner.schemas.remember(schema.clone()).await;

        info!(
            collection = %schema.name,
            dimension = schema.vector_dim,
            distance = %schema.distance,
            on_disk = schema.on_disk,
            "Created Qdrant multivector collection"
        );

        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.inner.schemas.forget(name).await;
        if !self.collection_exists(name).await? {
            return Ok(());
        }

        self.client()
            .delete_collection(name)
            .await
            .map_err(|e| Error::classify("Failed to delete collection", name, &e.to_string()))?;

        info!(collection = %name, "Deleted Qdrant collection");

        Ok(())
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        if !self.collection_exists(name).await? {
            self.inner.schemas.forget(name).await;
            return Ok(CollectionInfo::missing(name));
        }

        let info = self
            .client()
            .collection_info(name)
            .await
            .map_err(|e| Error::classify("Failed to get collection info", name, &e.to_string()))?;

        let Some(result) = info.result else {
            return Ok(CollectionInfo::missing(name));
        };

        let schema = result
            .config
            .as_ref()
            .and_then(|c| c.params.as_ref())
            .and_then(|p| p.vectors_config.as_ref())
            .and_then(|vc| match vc.config.as_ref() {
                Some(VectorsConfigKind::Params(params)) => Some(CollectionSchema {
                    name: name.to_string(),
                    vector_dim: params.size as usize,
                    distance: from_qdrant_distance(params.distance()),
                    on_disk: params.on_disk.unwrap_or(false),
                    multi_vector: params.multivector_config.is_some(),
                }),
                _ => None,
            });
        if let Some(schema) = &schema {
            self.inner.schemas.remember(schema.clone()).await;
        }

        Ok(CollectionInfo {
            name: name.to_string(),
            exists: true,
            points_count: result.points_count.unwrap_or(0),
            ready: result.status() == CollectionStatus::Green,
            schema,
        })
    }

    async fn upsert(&self, collection: &str, records: Vec<IndexRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = records
            .into_iter()
            .map(|record| {
                PointStruct::new(
                    record.point_id,
                    Vector::new_multi(record.vectors.to_rows()),
                    payload_to_qdrant(record.payload),
                )
            })
            .collect();

        let count = points.len();

        self.client()
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(|e| Error::classify("Failed to upsert points", collection, &e.to_string()))?;

        debug!(collection, count, "Upserted points");

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let distance = self.schema(collection).await?.distance;

        // A one-row multi-dense query: MaxSim then reduces to the best token.
        let builder = QueryPointsBuilder::new(collection)
            .query(Query::new_nearest(VectorInput::new_multi(vec![vector.to_vec()])))
            .limit(limit as u64)
            .with_payload(true);

        let response = self
            .client()
            .query(builder)
            .await
            .map_err(|e| Error::classify("Search failed", collection, &e.to_string()))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| {
                let payload = payload_from_qdrant(point.payload);
                ScoredPoint {
                    point_id: point_id_to_string(point.id),
                    doc_id: payload.doc_id,
                    // Qdrant reports euclidean as a distance; keep higher-is-better.
                    score: match distance {
                        DistanceMetric::Euclidean => -point.score,
                        _ => point.score,
                    },
                }
            })
            .collect())
    }

    async fn retrieve(&self, collection: &str, point_ids: &[String]) -> Result<Vec<StoredPoint>> {
        if point_ids.is_empty() {
            return Ok(Vec::new());
        }

        let multi_vector = self.schema(collection).await?.multi_vector;
        let ids: Vec<PointId> = point_ids.iter().cloned().map(PointId::from).collect();

        let response = self
            .client()
            .get_points(
                GetPointsBuilder::new(collection, ids)
                    .with_vectors(true)
                    .with_payload(true),
            )
            .await
            .map_err(|e| Error::classify("Failed to retrieve points", collection, &e.to_string()))?;

        response
            .result
            .into_iter()
            .map(|point| {
                let point_id = point_id_to_string(point.id);
                let vector = match point.vectors.and_then(|v| v.vectors_options) {
                    Some(VectorsOptions::Vector(v)) => v,
                    _ => {
                        return Err(Error::VectorStore(format!(
                            "Point {} has no unnamed vector",
                            point_id
                        )))
                    }
                };

                let vectors = stored_vectors(vector, multi_vector)
                    .map_err(|e| Error::VectorStore(format!("Point {}: {}", point_id, e)))?;

                Ok(StoredPoint {
                    point_id,
                    vectors,
                    payload: payload_from_qdrant(point.payload),
                })
            })
            .collect()
    }
}

/// Reshape a stored Qdrant vector into its token rows.
///
/// Multivector points must report their row count; plain dense points are one row.
fn stored_vectors(vector: Vector, multi_vector: bool) -> std::result::Result<MultiVector, String> {
    let rows = match (vector.vectors_count, multi_vector) {
        (Some(count), _) => count as usize,
        (None, false) => 1,
        (None, true) => return Err("multivector point without a vectors count".to_string()),
    };
    if rows == 0 || vector.data.len() % rows != 0 {
        return Err(format!(
            "{} values cannot be split into {} rows",
            vector.data.len(),
            rows
        ));
    }

    let dim = vector.data.len() / rows;
    MultiVector::from_flat(dim, vector.data).map_err(|e| e.to_string())
}

fn to_qdrant_distance(metric: DistanceMetric) -> Distance {
    match metric {
        DistanceMetric::Cosine => Distance::Cosine,
        DistanceMetric::Dot => Distance::Dot,
        DistanceMetric::Euclidean => Distance::Euclid,
    }
}

fn from_qdrant_distance(distance: Distance) -> DistanceMetric {
    match distance {
        Distance::Dot => DistanceMetric::Dot,
        Distance::Euclid => DistanceMetric::Euclidean,
        _ => DistanceMetric::Cosine,
    }
}

/// Convert a record payload to Qdrant values
fn payload_to_qdrant(payload: RecordPayload) -> HashMap<String, QdrantValue> {
    HashMap::from([
        (KEY_DOC_ID.to_string(), QdrantValue::from(payload.doc_id)),
        (KEY_TITLE.to_string(), QdrantValue::from(payload.title)),
        (KEY_TEXT.to_string(), QdrantValue::from(payload.text)),
    ])
}

/// Convert Qdrant values back to a record payload
fn payload_from_qdrant(mut payload: HashMap<String, QdrantValue>) -> RecordPayload {
    let mut take = |key: &str| match payload.remove(key).and_then(|v| v.kind) {
        Some(Kind::StringValue(s)) => s,
        _ => String::new(),
    };

    RecordPayload {
        doc_id: take(KEY_DOC_ID),
        title: take(KEY_TITLE),
        text: take(KEY_TEXT),
    }
}

fn point_id_to_string(id: Option<PointId>) -> String {
    match id.and_then(|p| p.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}
