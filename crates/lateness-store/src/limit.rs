//! Bounded concurrency for store calls.

use lateness_models::{CollectionSchema, IndexRecord};
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::{CollectionInfo, Error, Result, ScoredPoint, StoredPoint, VectorStore};

/// Wraps a store so at most `max_in_flight` calls run at once.
///
/// Excess callers wait for a permit instead of failing.
pub struct LimitedStore<S> {
    inner: S,
    permits: Semaphore,
    max_in_flight: usize,
}

impl<S: VectorStore> LimitedStore<S> {
    pub fn new(inner: S, max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            inner,
            permits: Semaphore::new(max_in_flight),
            max_in_flight,
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn permit(&self) -> Result<SemaphorePermit<'_>> {
        self.permits
            .acquire()
            .await
            .map_err(|e| Error::VectorStore(format!("Store limiter closed: {}", e)))
    }
}

#[async_trait::async_trait]
impl<S: VectorStore> VectorStore for LimitedStore<S> {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let _permit = self.permit().await?;
        self.inner.collection_exists(name).await
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        let _permit = self.permit().await?;
        self.inner.create_collection(schema).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let _permit = self.permit().await?;
        self.inner.delete_collection(name).await
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let _permit = self.permit().await?;
        self.inner.collection_info(name).await
    }

    async fn upsert(&self, collection: &str, records: Vec<IndexRecord>) -> Result<()> {
        let _permit = self.permit().await?;
        self.inner.upsert(collection, records).await
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let _permit = self.permit().await?;
        self.inner.search(collection, vector, limit).await
    }

    async fn retrieve(&self, collection: &str, point_ids: &[String]) -> Result<Vec<StoredPoint>> {
        let _permit = self.permit().await?;
        self.inner.retrieve(collection, point_ids).await
    }
}
