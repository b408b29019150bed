//! Configuration management for Lateness.
//!
//! Loads configuration from environment variables (and a `.env` file when
//! present) for:
//! - The vector store backend and its connection limits
//! - The collection schema
//! - Indexing and search tuning
//! - The token encoder

use std::env;
use std::sync::OnceLock;
use std::time::Duration;

use lateness_models::{CollectionSchema, DistanceMetric};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::indexer::IndexOptions;
use crate::retriever::RetrieverOptions;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Initialize configuration (call once at startup)
pub fn init() -> &'static Config {
    config()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub collection: CollectionConfig,
    pub indexing: IndexingConfig,
    pub search: SearchConfig,
    pub encoder: EncoderConfig,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub qdrant_url: String,
    pub api_key: Option<String>,
    /// Maximum concurrent store calls.
    pub concurrency: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Qdrant,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qdrant" => Ok(Self::Qdrant),
            "memory" | "mem" => Ok(Self::Memory),
            _ => Err(format!("Unknown store backend: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectionConfig {
    pub name: String,
    pub vector_dim: usize,
    pub distance: DistanceMetric,
    pub on_disk: bool,
    /// Drop and recreate the collection on startup.
    pub recreate: bool,
    /// Fail instead of reusing an existing collection.
    pub strict: bool,
}

#[derive(Debug, Clone)]
pub struct IndexingConfig {
    pub batch_size: usize,
    pub concurrency: usize,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub top_k: usize,
    pub candidates_per_token: usize,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Remote encoder service; the hashing encoder is used when unset.
    pub url: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    /// Queue calls so the model serves one at a time.
    pub serialize: bool,
    pub max_doc_tokens: usize,
    pub max_query_tokens: usize,
}

impl Config {
    /// Build from the process environment. Callers load `.env` beforehand.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let opt = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(default)
        };

        Self {
            store: StoreConfig {
                backend: get("STORE_BACKEND", "qdrant").parse().unwrap_or_else(|e| {
                    warn!("{}, falling back to qdrant", e);
                    StoreBackend::Qdrant
                }),
                qdrant_url: get("QDRANT_URL", "http://localhost:6334"),
                api_key: opt("QDRANT_API_KEY"),
                concurrency: get("STORE_CONCURRENCY", "8").parse().unwrap_or(8),
                timeout_secs: get("STORE_TIMEOUT_SECS", "30").parse().unwrap_or(30),
            },
            collection: CollectionConfig {
                name: get("COLLECTION_NAME", "lateness_docs"),
                vector_dim: get("VECTOR_DIM", "128").parse().unwrap_or(128),
                distance: get("DISTANCE_METRIC", "cosine").parse().unwrap_or_else(|e| {
                    warn!("{}, falling back to cosine", e);
                    DistanceMetric::Cosine
                }),
                on_disk: flag("ON_DISK", false),
                recreate: flag("RECREATE_COLLECTION", false),
                strict: flag("STRICT_COLLECTION", false),
            },
            indexing: IndexingConfig {
                // Keep 0 as-is so validate() can reject it.
                batch_size: get("INDEX_BATCH_SIZE", "32").parse().unwrap_or(32),
                concurrency: get("INDEXING_CONCURRENCY", "4").parse().unwrap_or(4),
                timeout_secs: opt("INDEX_TIMEOUT_SECS").and_then(|v| v.parse().ok()),
            },
            search: SearchConfig {
                top_k: get("TOP_K", "3").parse().unwrap_or(3),
                candidates_per_token: get("CANDIDATES_PER_TOKEN", "100").parse().unwrap_or(100),
                timeout_secs: opt("SEARCH_TIMEOUT_SECS").and_then(|v| v.parse().ok()),
            },
            encoder: EncoderConfig {
                url: opt("ENCODER_URL"),
                model: get("ENCODER_MODEL", "colbert-ir/colbertv2.0"),
                api_key: opt("ENCODER_API_KEY"),
                serialize: flag("ENCODER_SERIALIZE", false),
                max_doc_tokens: get("MAX_DOC_TOKENS", "300").parse().unwrap_or(300),
                max_query_tokens: get("MAX_QUERY_TOKENS", "32").parse().unwrap_or(32),
            },
        }
    }

    /// Reject settings no component can run with.
    pub fn validate(&self) -> Result<()> {
        if self.collection.name.trim().is_empty() {
            return Err(Error::Config("COLLECTION_NAME must not be empty".into()));
        }
        if self.collection.vector_dim == 0 {
            return Err(Error::Config("VECTOR_DIM must be greater than 0".into()));
        }
        if self.indexing.batch_size == 0 {
            return Err(Error::Config("INDEX_BATCH_SIZE must be greater than 0".into()));
        }
        if self.search.candidates_per_token == 0 {
            return Err(Error::Config("CANDIDATES_PER_TOKEN must be greater than 0".into()));
        }
        Ok(())
    }

    pub fn schema(&self) -> CollectionSchema {
        CollectionSchema::new(&self.collection.name, self.collection.vector_dim)
            .with_distance(self.collection.distance)
            .with_on_disk(self.collection.on_disk)
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            batch_size: self.indexing.batch_size,
            concurrency: self.indexing.concurrency.max(1),
            deadline: self.indexing.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn retriever_options(&self) -> RetrieverOptions {
        RetrieverOptions {
            candidates_per_token: self.search.candidates_per_token,
            deadline: self.search.timeout_secs.map(Duration::from_secs),
        }
    }
}
