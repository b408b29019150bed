//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use lateness_embeddings::{Encoder, HashingEncoder, MultiVector};
use lateness_models::{CollectionSchema, Corpus, DocumentText, IndexRecord};
use lateness_store::{CollectionInfo, MemoryStore, Result, ScoredPoint, StoredPoint, VectorStore};

pub const DIM: usize = 128;

pub const COLLECTION: &str = "lateness_demo";

/// Technology descriptions; `doc_{i}` is the i-th entry.
pub const DOCUMENTS: [&str; 15] = [
    "PyTorch is an open-source machine learning framework that provides tensor computations with GPU acceleration and deep neural networks built on tape-based autograd system.",
    "Kubernetes is a container orchestration platform that automates deployment, scaling, and management of containerized applications across clusters of machines.",
    "REST APIs follow representational state transfer architectural style using HTTP methods like GET, POST, PUT, DELETE for stateless client-server communication.",
    "Docker containers package applications with their dependencies into lightweight, portable units that can run consistently across different computing environments.",
    "PostgreSQL is an advanced open-source relational database system known for extensibility, SQL compliance, and support for JSON, arrays, and custom data types.",
    "Redis is an in-memory data structure store used as database, cache, and message broker supporting strings, hashes, lists, sets, and sorted sets.",
    "Microservices architecture decomposes applications into small, independent services that communicate via APIs, enabling scalability and technology diversity.",
    "GraphQL is a query language and runtime for APIs that allows clients to request exactly the data they need in a single request with strong type system.",
    "Apache Kafka is a distributed event streaming platform capable of handling trillions of events per day for real-time data pipelines and streaming applications.",
    "React is a JavaScript library for building user interfaces using component-based architecture with virtual DOM for efficient rendering and state management.",
    "Machine learning pipelines automate the workflow of data preprocessing, feature engineering, model training, validation, and deployment for ML systems.",
    "Vector databases store and retrieve high-dimensional embeddings for similarity search, recommendation systems, and semantic search applications.",
    "NGINX is a high-performance web server and reverse proxy that handles HTTP requests, load balancing, SSL termination, and serves static content efficiently.",
    "Elasticsearch is a distributed search and analytics engine built on Apache Lucene for full-text search, structured search, and analytics at scale.",
    "JWT tokens provide secure information transmission between parties as compact, URL-safe JSON objects that are digitally signed using HMAC or RSA algorithms.",
];

pub fn sample_corpus() -> Corpus {
    DOCUMENTS
        .iter()
        .enumerate()
        .map(|(i, text)| (format!("doc_{}", i), DocumentText::new("", *text)))
        .collect()
}

pub fn sample_schema() -> CollectionSchema {
    CollectionSchema::new(COLLECTION, DIM)
}

pub fn encoder() -> HashingEncoder {
    HashingEncoder::new(DIM)
}

/// Memory store that counts upserts and can go down after a number of them.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    upserts: AtomicUsize,
    fail_after: Option<usize>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Become unreachable once `n` upserts have succeeded.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl VectorStore for CountingStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.inner.collection_exists(name).await
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        self.inner.create_collection(schema).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.inner.delete_collection(name).await
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        self.inner.collection_info(name).await
    }

    async fn upsert(&self, collection: &str, records: Vec<IndexRecord>) -> Result<()> {
        if self.fail_after == Some(self.upserts()) {
            self.inner.set_reachable(false);
        }
        self.inner.upsert(collection, records).await?;
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        self.inner.search(collection, vector, limit).await
    }

    async fn retrieve(&self, collection: &str, point_ids: &[String]) -> Result<Vec<StoredPoint>> {
        self.inner.retrieve(collection, point_ids).await
    }
}

/// Hashing encoder that sleeps before every call.
pub struct SlowEncoder {
    inner: HashingEncoder,
    delay: Duration,
}

impl SlowEncoder {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: encoder(),
            delay,
        }
    }
}

#[async_trait::async_trait]
impl Encoder for SlowEncoder {
    fn model_id(&self) -> &str {
        "slow-hashing"
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn encode(&self, text: &str) -> lateness_embeddings::Result<MultiVector> {
        tokio::time::sleep(self.delay).await;
        self.inner.encode(text).await
    }

    async fn encode_query(&self, text: &str) -> lateness_embeddings::Result<MultiVector> {
        tokio::time::sleep(self.delay).await;
        self.inner.encode_query(text).await
    }
}
