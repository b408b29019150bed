//! Corpus indexing.
//!
//! The corpus is split into fixed-size batches in iteration order. Each
//! batch is encoded and then written with a single upsert; batches run
//! through a bounded stream so at most `concurrency` are in flight.
//!
//! Point ids are derived from document ids, so indexing the same corpus
//! again (with any batch size) overwrites rather than duplicates.

use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use lateness_embeddings::Encoder;
use lateness_models::{CollectionSchema, Corpus, Document, DocumentText, IndexRecord};
use lateness_store::VectorStore;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Default documents per batch
const DEFAULT_BATCH_SIZE: usize = 32;

/// Default batches in flight
const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Documents per upsert. Zero is rejected.
    pub batch_size: usize,
    /// Batches encoded/upserted concurrently.
    pub concurrency: usize,
    /// Abort the whole run after this long.
    pub deadline: Option<Duration>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            deadline: None,
        }
    }
}

impl IndexOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Outcome of an indexing run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexReport {
    pub batches: usize,
    pub succeeded: usize,
    /// Failed document ids with the reason, in corpus order.
    pub failed: Vec<(String, String)>,
}

impl IndexReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<String> {
        self.failed.iter().map(|(id, _)| id.clone()).collect()
    }

    /// `Err(PartialIndex)` when any document failed.
    pub fn into_result(self) -> Result<Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(Error::PartialIndex {
                failed: self.failed_ids(),
            })
        }
    }
}

/// Result of one batch.
struct BatchOutcome {
    index: usize,
    succeeded: usize,
    failed: Vec<(String, String)>,
}

/// Writes a corpus into a collection.
pub struct Indexer<'a> {
    store: &'a dyn VectorStore,
    encoder: &'a dyn Encoder,
    schema: CollectionSchema,
    options: IndexOptions,
}

impl<'a> Indexer<'a> {
    pub fn new(store: &'a dyn VectorStore, encoder: &'a dyn Encoder, schema: CollectionSchema) -> Self {
        Self {
            store,
            encoder,
            schema,
            options: IndexOptions::default(),
        }
    }

    pub fn with_options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    /// Index every document of the corpus.
    ///
    /// Documents that fail to encode, or whose batch the store rejects,
    /// are listed in the report. A store connection failure aborts the run;
    /// batches committed before it stay in the store.
    pub async fn index_documents(&self, corpus: &Corpus) -> Result<IndexReport> {
        if self.options.batch_size == 0 {
            return Err(Error::Config("batch_size must be greater than 0".into()));
        }
        if self.encoder.dimension() != self.schema.vector_dim {
            return Err(Error::InvalidInput(format!(
                "encoder {} produces {}-dimensional tokens, collection {} expects {}",
                self.encoder.model_id(),
                self.encoder.dimension(),
                self.schema.name,
                self.schema.vector_dim
            )));
        }

        match self.options.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.run(corpus))
                .await
                .map_err(|_| Error::Timeout(deadline))?,
            None => self.run(corpus).await,
        }
    }

    async fn run(&self, corpus: &Corpus) -> Result<IndexReport> {
        let start = Instant::now();
        let concurrency = self.options.concurrency.max(1);

        let mut outcomes = stream::iter(corpus.batches(self.options.batch_size).enumerate())
            .map(|(index, batch)| self.index_batch(index, batch))
            .buffer_unordered(concurrency);

        let mut finished = Vec::new();
        while let Some(outcome) = outcomes.next().await {
            // Connection errors end the run; dropping the stream cancels the rest.
            finished.push(outcome?);
        }
        finished.sort_by_key(|o| o.index);

        let mut report = IndexReport {
            batches: finished.len(),
            ..Default::default()
        };
        for outcome in finished {
            report.succeeded += outcome.succeeded;
            report.failed.extend(outcome.failed);
        }

        info!(
            collection = %self.schema.name,
            documents = corpus.len(),
            batches = report.batches,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Indexing complete"
        );

        Ok(report)
    }

    async fn index_batch(&self, index: usize, batch: &[(String, DocumentText)]) -> Result<BatchOutcome> {
        let texts: Vec<String> = batch.iter().map(|(_, doc)| doc.text.clone()).collect();
        let encoded = self.encoder.encode_batch(&texts).await;

        let mut failed = Vec::new();
        let mut records = Vec::with_capacity(batch.len());

        if encoded.len() != batch.len() {
            let reason = format!(
                "encoder returned {} results for {} documents",
                encoded.len(),
                batch.len()
            );
            warn!(batch = index, "{}", reason);
            failed.extend(batch.iter().map(|(id, _)| (id.clone(), reason.clone())));
            return Ok(BatchOutcome {
                index,
                succeeded: 0,
                failed,
            });
        }

        for ((id, doc), result) in batch.iter().zip(encoded) {
            let embeddings = match result {
                Ok(tokens) => tokens,
                Err(e) => {
                    warn!(doc_id = %id, error = %e, "Document failed to encode");
                    failed.push((id.clone(), Error::from(e).to_string()));
                    continue;
                }
            };

            if let Err(e) = embeddings.check_dim(self.schema.vector_dim) {
                warn!(doc_id = %id, error = %e, "Encoder output has wrong shape");
                failed.push((id.clone(), Error::Encoding(e.to_string()).to_string()));
                continue;
            }

            records.push(IndexRecord::from(Document {
                id: id.clone(),
                title: doc.title.clone(),
                text: doc.text.clone(),
                embeddings,
            }));
        }

        if records.is_empty() {
            return Ok(BatchOutcome {
                index,
                succeeded: 0,
                failed,
            });
        }

        let ids: Vec<String> = records.iter().map(|r| r.doc_id().to_string()).collect();
        match self.store.upsert(&self.schema.name, records).await {
            Ok(()) => {
                debug!(batch = index, count = ids.len(), "Batch committed");
                Ok(BatchOutcome {
                    index,
                    succeeded: ids.len(),
                    failed,
                })
            }
            Err(e) if e.is_connection() => Err(e.into()),
            Err(e) => {
                warn!(batch = index, error = %e, "Store rejected batch");
                let reason = Error::from(e).to_string();
                failed.extend(ids.into_iter().map(|id| (id, reason.clone())));
                Ok(BatchOutcome {
                    index,
                    succeeded: 0,
                    failed,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lateness_embeddings::HashingEncoder;
    use lateness_models::CollectionState;
    use lateness_store::MemoryStore;

    use crate::schema::SchemaManager;

    const DIM: usize = 16;

    fn corpus(texts: &[&str]) -> Corpus {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| (format!("doc_{}", i), DocumentText::new("", *text)))
            .collect()
    }

    async fn setup() -> (MemoryStore, HashingEncoder, CollectionSchema) {
        let store = MemoryStore::new();
        let schema = CollectionSchema::new("docs", DIM);
        SchemaManager::new(&store)
            .create_collection(&schema, false)
            .await
            .unwrap();
        (store, HashingEncoder::new(DIM), schema)
    }

    #[tokio::test]
    async fn test_batches_and_report() {
        let (store, encoder, schema) = setup().await;
        let corpus = corpus(&["alpha one", "beta two", "gamma three", "delta four", "epsilon five"]);

        let report = Indexer::new(&store, &encoder, schema)
            .with_options(IndexOptions::default().with_batch_size(2))
            .index_documents(&corpus)
            .await
            .unwrap();

        assert_eq!(report.batches, 3);
        assert_eq!(report.succeeded, 5);
        assert!(report.is_complete());
        assert_eq!(
            SchemaManager::new(&store).state("docs").await.unwrap(),
            CollectionState::Searchable
        );
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_config_error() {
        let (store, encoder, schema) = setup().await;
        let err = Indexer::new(&store, &encoder, schema)
            .with_options(IndexOptions::default().with_batch_size(0))
            .index_documents(&corpus(&["alpha"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_empty_text_reported_not_fatal() {
        let (store, encoder, schema) = setup().await;
        let corpus = corpus(&["alpha", "", "gamma"]);

        let report = Indexer::new(&store, &encoder, schema)
            .index_documents(&corpus)
            .await
            .unwrap();

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed_ids(), vec!["doc_1".to_string()]);
        assert_eq!(store.collection_info("docs").await.unwrap().points_count, 2);

        match report.into_result() {
            Err(Error::PartialIndex { failed }) => assert_eq!(failed, vec!["doc_1".to_string()]),
            other => panic!("expected PartialIndex, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_encoder_dimension_mismatch() {
        let (store, _, schema) = setup().await;
        let encoder = HashingEncoder::new(DIM * 2);
        let err = Indexer::new(&store, &encoder, schema)
            .index_documents(&corpus(&["alpha"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_missing_collection_marks_batch_failed() {
        let store = MemoryStore::new();
        let encoder = HashingEncoder::new(DIM);
        let report = Indexer::new(&store, &encoder, CollectionSchema::new("absent", DIM))
            .index_documents(&corpus(&["alpha", "beta"]))
            .await
            .unwrap();
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed.len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_store_aborts() {
        let (store, encoder, schema) = setup().await;
        store.set_reachable(false);
        let err = Indexer::new(&store, &encoder, schema)
            .index_documents(&corpus(&["alpha"]))
            .await
            .unwrap_err();
        assert!(err.is_connection());
    }

    #[test]
    fn test_report_into_result_complete() {
        let report = IndexReport {
            batches: 1,
            succeeded: 3,
            failed: vec![],
        };
        assert_eq!(report.clone().into_result().unwrap(), report);
    }
}
