//! Lateness - late-interaction multi-vector retrieval
//!
//! Documents and queries are encoded into per-token embeddings; documents
//! are stored as multi-vector points and ranked against a query by MaxSim.
//!
//! Components borrow the store and encoder handles owned by the caller:
//!
//! - [`SchemaManager`] creates the collection once.
//! - [`Indexer`] encodes a corpus and upserts it in batches.
//! - [`Retriever`] gathers candidates per query token and rescores them.
//! - [`Scorer`] computes exact MaxSim scores and rankings.

pub mod config;
pub mod error;
pub mod indexer;
pub mod retriever;
pub mod schema;
pub mod scorer;

pub use config::config;
pub use error::{Error, Result};
pub use indexer::{IndexOptions, IndexReport, Indexer};
pub use retriever::{Candidate, CandidatePool, Retriever, RetrieverOptions};
pub use schema::{CreateOutcome, SchemaManager};
pub use scorer::Scorer;
