//! Lateness - index a corpus and run late-interaction queries against it.
//!
//! Usage: `lateness <corpus.json> [query ...]`
//!
//! The corpus file maps document ids to `{"title": ..., "text": ...}`.

use anyhow::{bail, Context};
use lateness_core::config::{self, Config, StoreBackend};
use lateness_core::{Indexer, Retriever, SchemaManager};
use lateness_embeddings::{Encoder, HashingEncoder, HttpEncoder, HttpEncoderConfig, SerializedEncoder};
use lateness_models::Corpus;
use lateness_store::{LimitedStore, MemoryStore, QdrantConfig, QdrantStore, VectorStore};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Characters of document text shown per result
const PREVIEW_CHARS: usize = 80;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must be loaded before the log filter and config read the environment.
    dotenvy::dotenv().ok();
    init_tracing();

    let config = config::init();
    config.validate()?;

    let mut args = std::env::args().skip(1);
    let Some(corpus_path) = args.next() else {
        bail!("usage: lateness <corpus.json> [query ...]");
    };
    let queries: Vec<String> = args.collect();

    let corpus = load_corpus(&corpus_path)?;
    info!(path = %corpus_path, documents = corpus.len(), "Loaded corpus");

    let encoder = build_encoder(config)?;
    let store = build_store(config).await?;
    let schema = config.schema();

    let outcome = SchemaManager::new(store.as_ref())
        .strict(config.collection.strict)
        .create_collection(&schema, config.collection.recreate)
        .await?;
    info!(collection = %schema.name, ?outcome, "Collection ready");

    let report = Indexer::new(store.as_ref(), encoder.as_ref(), schema.clone())
        .with_options(config.index_options())
        .index_documents(&corpus)
        .await?;
    for (doc_id, reason) in &report.failed {
        warn!(doc_id = %doc_id, reason = %reason, "Document not indexed");
    }

    let retriever = Retriever::new(store.as_ref(), encoder.as_ref(), schema)
        .with_options(config.retriever_options());

    for query in &queries {
        let results = retriever.search_with_query(query, config.search.top_k).await?;

        println!("\nQuery: {}", query);
        if results.is_empty() {
            println!("  (no results)");
        }
        for result in results {
            let preview: String = corpus
                .get(&result.doc_id)
                .map(|doc| doc.text.chars().take(PREVIEW_CHARS).collect())
                .unwrap_or_default();
            println!(
                "  {}. {} (score {:.4}) {}",
                result.rank, result.doc_id, result.score, preview
            );
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lateness=debug".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn load_corpus(path: &str) -> anyhow::Result<Corpus> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid corpus file {}", path))
}

fn build_encoder(config: &Config) -> anyhow::Result<Box<dyn Encoder>> {
    let dim = config.collection.vector_dim;

    let Some(url) = &config.encoder.url else {
        warn!(dimension = dim, "ENCODER_URL not set, using hashing encoder (not a trained model)");
        return Ok(Box::new(
            HashingEncoder::new(dim)
                .with_token_limits(config.encoder.max_doc_tokens, config.encoder.max_query_tokens),
        ));
    };

    let http = HttpEncoder::new(HttpEncoderConfig {
        base_url: url.clone(),
        model: config.encoder.model.clone(),
        api_key: config.encoder.api_key.clone(),
        dimension: dim,
        timeout_secs: 60,
    })?;
    info!(url = %url, model = %config.encoder.model, "Using remote encoder");

    if config.encoder.serialize {
        Ok(Box::new(SerializedEncoder::new(http)))
    } else {
        Ok(Box::new(http))
    }
}

async fn build_store(config: &Config) -> anyhow::Result<Box<dyn VectorStore>> {
    let limit = config.store.concurrency;
    match config.store.backend {
        StoreBackend::Qdrant => {
            let qdrant = QdrantStore::new(&QdrantConfig {
                url: config.store.qdrant_url.clone(),
                api_key: config.store.api_key.clone(),
                timeout_secs: config.store.timeout_secs,
            })
            .await
            .context("Failed to connect to Qdrant")?;
            Ok(Box::new(LimitedStore::new(qdrant, limit)))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; nothing is persisted");
            Ok(Box::new(LimitedStore::new(MemoryStore::new(), limit)))
        }
    }
}
