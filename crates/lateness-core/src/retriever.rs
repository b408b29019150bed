//! Query-time retrieval.
//!
//! Two stages:
//! 1. **Candidates**: one store search per query token. The store scores each
//!    point by the best match of that token against any stored token.
//! 2. **Rescore**: stored token vectors of every candidate are fetched and
//!    scored exactly with MaxSim.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::future::try_join_all;
use lateness_embeddings::Encoder;
use lateness_models::{CollectionSchema, MultiVector, SearchResult};
use lateness_store::VectorStore;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::scorer::Scorer;

/// Default hits requested per query token
const DEFAULT_CANDIDATES_PER_TOKEN: usize = 100;

#[derive(Debug, Clone)]
pub struct RetrieverOptions {
    pub candidates_per_token: usize,
    /// Fail a search that has not finished after this long.
    pub deadline: Option<Duration>,
}

impl Default for RetrieverOptions {
    fn default() -> Self {
        Self {
            candidates_per_token: DEFAULT_CANDIDATES_PER_TOKEN,
            deadline: None,
        }
    }
}

/// Stage-one hit for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub point_id: String,
    /// Best stored-token similarity per query token; `None` where the
    /// document was not among that token's hits.
    pub token_scores: Vec<Option<f32>>,
}

impl Candidate {
    /// Sum of the known per-token scores.
    pub fn partial_score(&self) -> f32 {
        self.token_scores.iter().flatten().sum()
    }
}

/// Documents surfaced by any query token, keyed by doc id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidatePool {
    query_tokens: usize,
    candidates: BTreeMap<String, Candidate>,
}

impl CandidatePool {
    pub fn new(query_tokens: usize) -> Self {
        Self {
            query_tokens,
            candidates: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, token: usize, doc_id: &str, point_id: &str, score: f32) {
        let query_tokens = self.query_tokens;
        let candidate = self
            .candidates
            .entry(doc_id.to_string())
            .or_insert_with(|| Candidate {
                point_id: point_id.to_string(),
                token_scores: vec![None; query_tokens],
            });
        if let Some(slot) = candidate.token_scores.get_mut(token) {
            *slot = Some(slot.map_or(score, |s| s.max(score)));
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn get(&self, doc_id: &str) -> Option<&Candidate> {
        self.candidates.get(doc_id)
    }

    /// Candidates in doc id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Candidate)> {
        self.candidates.iter().map(|(id, c)| (id.as_str(), c))
    }

    /// Candidate with the highest stage-one estimate, ties by doc id.
    pub fn best_partial(&self) -> Option<(&str, f32)> {
        self.iter()
            .map(|(id, c)| (id, c.partial_score()))
            .fold(None, |best, (id, score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((id, score)),
            })
    }

    pub fn point_ids(&self) -> Vec<String> {
        self.candidates.values().map(|c| c.point_id.clone()).collect()
    }
}

/// Answers queries against one collection.
pub struct Retriever<'a> {
    store: &'a dyn VectorStore,
    encoder: &'a dyn Encoder,
    schema: CollectionSchema,
    scorer: Scorer,
    options: RetrieverOptions,
}

impl<'a> Retriever<'a> {
    pub fn new(store: &'a dyn VectorStore, encoder: &'a dyn Encoder, schema: CollectionSchema) -> Self {
        let scorer = Scorer::new(schema.distance);
        Self {
            store,
            encoder,
            schema,
            scorer,
            options: RetrieverOptions::default(),
        }
    }

    /// Build a retriever for an existing collection, reading its schema
    /// back from the store.
    pub async fn connect(
        store: &'a dyn VectorStore,
        encoder: &'a dyn Encoder,
        collection: &str,
    ) -> Result<Self> {
        let info = store.collection_info(collection).await?;
        let schema = info
            .schema
            .ok_or_else(|| Error::Store(format!("Collection not found: {}", collection)))?;

        if schema.vector_dim != encoder.dimension() {
            return Err(Error::InvalidInput(format!(
                "encoder {} produces {}-dimensional tokens, collection {} stores {}",
                encoder.model_id(),
                encoder.dimension(),
                collection,
                schema.vector_dim
            )));
        }

        Ok(Self::new(store, encoder, schema))
    }

    pub fn with_options(mut self, options: RetrieverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    /// Top `top_k` documents for a query, best first.
    ///
    /// Returns fewer results when fewer documents match, and none for a
    /// collection that does not exist yet or holds no points.
    pub async fn search_with_query(&self, query_text: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        match self.options.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.search(query_text, top_k))
                .await
                .map_err(|_| Error::Timeout(deadline))?,
            None => self.search(query_text, top_k).await,
        }
    }

    async fn search(&self, query_text: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let query = self.encode_query(query_text).await?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let pool = self.candidates(&query).await?;
        let results = self.rescore(&query, &pool, top_k).await?;

        info!(
            collection = %self.schema.name,
            query_tokens = query.len(),
            candidates = pool.len(),
            results = results.len(),
            "Search complete"
        );
        Ok(results)
    }

    /// Encode query text, checking it against the collection.
    pub async fn encode_query(&self, query_text: &str) -> Result<MultiVector> {
        let query = self
            .encoder
            .encode_query(query_text)
            .await
            .map_err(|e| Error::Query(e.to_string()))?;

        query.check_dim(self.schema.vector_dim).map_err(|e| {
            Error::Query(format!("query does not match collection {}: {}", self.schema.name, e))
        })?;
        Ok(query)
    }

    /// Stage one: union of per-token nearest neighbors.
    pub async fn candidates(&self, query: &MultiVector) -> Result<CandidatePool> {
        let mut pool = CandidatePool::new(query.len());

        let info = self.store.collection_info(&self.schema.name).await?;
        if !info.exists || info.points_count == 0 {
            debug!(collection = %self.schema.name, "Collection empty or missing");
            return Ok(pool);
        }

        let limit = self.options.candidates_per_token.max(1);
        let searches = query
            .rows()
            .map(|token| self.store.search(&self.schema.name, token, limit));

        let per_token = match try_join_all(searches).await {
            Ok(hits) => hits,
            // Dropped between the info call and the search.
            Err(lateness_store::Error::CollectionNotFound(_)) => return Ok(pool),
            Err(e) => return Err(e.into()),
        };

        for (token, hits) in per_token.into_iter().enumerate() {
            for hit in hits {
                pool.add(token, &hit.doc_id, &hit.point_id, hit.score);
            }
        }

        let (leader, estimate) = pool.best_partial().unwrap_or(("", 0.0));
        debug!(
            collection = %self.schema.name,
            query_tokens = query.len(),
            candidates = pool.len(),
            leader,
            estimate,
            "Candidate pool built"
        );
        Ok(pool)
    }

    /// Stage two: exact MaxSim over the candidates' stored token vectors.
    pub async fn rescore(
        &self,
        query: &MultiVector,
        pool: &CandidatePool,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        if pool.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let stored = match self.store.retrieve(&self.schema.name, &pool.point_ids()).await {
            Ok(points) => points,
            Err(lateness_store::Error::CollectionNotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        self.scorer.rank(
            query,
            stored
                .iter()
                .map(|point| (point.payload.doc_id.as_str(), &point.vectors)),
            top_k,
        )
    }
}
