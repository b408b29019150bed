//! Data models for Lateness.
//!
//! Defines the types shared by the encoder, the vector store and the
//! retrieval core: token matrices, the ragged arena that packs many of
//! them, corpora, collection schemas, index records and ranked results.

mod arena;
mod collection;
mod corpus;
mod record;
mod vector;

pub use arena::*;
pub use collection::*;
pub use corpus::*;
pub use record::*;
pub use vector::*;

use uuid::Uuid;

/// Namespace for point ids derived from document ids.
const POINT_NAMESPACE: Uuid = Uuid::from_u128(0x6c61_7465_6e65_7373_9d3b_41f2_a7c0_5e18);

/// Derive the store point id for a document id.
///
/// Stable across runs and processes, so re-indexing a document overwrites
/// its previous point instead of adding a second one.
pub fn point_id(doc_id: &str) -> String {
    Uuid::new_v5(&POINT_NAMESPACE, doc_id.as_bytes()).to_string()
}
