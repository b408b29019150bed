//! Token-level encoders for late-interaction retrieval.
//!
//! An [`Encoder`] maps text to an ordered sequence of fixed-dimension token
//! embeddings ([`MultiVector`]). Three implementations ship here:
//!
//! - [`HttpEncoder`] calls a remote ColBERT-style encoder service.
//! - [`HashingEncoder`] is a deterministic, model-free fallback built from
//!   hashed character trigrams. It is NOT a trained model.
//! - [`SerializedEncoder`] wraps any encoder so only one call runs at a time.
//!
//! # Example
//!
//! ```no_run
//! use lateness_embeddings::{Encoder, HashingEncoder};
//!
//! # async fn example() -> Result<(), lateness_embeddings::Error> {
//! let encoder = HashingEncoder::new(128);
//! let tokens = encoder.encode("Kubernetes schedules containers").await?;
//! assert_eq!(tokens.dim(), 128);
//! # Ok(())
//! # }
//! ```

mod hashing;
mod http;
mod serialized;

pub use hashing::HashingEncoder;
pub use http::{HttpEncoder, HttpEncoderConfig};
pub use serialized::SerializedEncoder;

pub use lateness_models::MultiVector;

/// Token cap for documents (ColBERT `doc_maxlen`).
pub const DEFAULT_MAX_DOC_TOKENS: usize = 300;

/// Token cap for queries (ColBERT `query_maxlen`).
pub const DEFAULT_MAX_QUERY_TOKENS: usize = 32;

// ============================================================================
// Error types
// ============================================================================

/// Errors that can occur while encoding.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Input produced no tokens (empty, whitespace, stopwords only)
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Encoder returned vectors of the wrong shape
    #[error("Malformed encoder output: {0}")]
    Malformed(String),

    /// Remote provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Internal error (HTTP client, parsing, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for encoding operations.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Encoder trait
// ============================================================================

/// Capability to turn text into token embeddings.
///
/// Implementations must be deterministic for a fixed `model_id`, and
/// `encode_batch` must return exactly what sequential `encode` calls would.
#[async_trait::async_trait]
pub trait Encoder: Send + Sync {
    /// Identity of the underlying model.
    fn model_id(&self) -> &str;

    /// Dimension of every token vector.
    fn dimension(&self) -> usize;

    /// Encode document text.
    async fn encode(&self, text: &str) -> Result<MultiVector>;

    /// Encode query text. Defaults to [`Encoder::encode`].
    async fn encode_query(&self, text: &str) -> Result<MultiVector> {
        self.encode(text).await
    }

    /// Encode many documents; one result per input, in input order.
    async fn encode_batch(&self, texts: &[String]) -> Vec<Result<MultiVector>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.encode(text).await);
        }
        results
    }
}

#[async_trait::async_trait]
impl<E: Encoder + ?Sized> Encoder for std::sync::Arc<E> {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    async fn encode(&self, text: &str) -> Result<MultiVector> {
        (**self).encode(text).await
    }

    async fn encode_query(&self, text: &str) -> Result<MultiVector> {
        (**self).encode_query(text).await
    }

    async fn encode_batch(&self, texts: &[String]) -> Vec<Result<MultiVector>> {
        (**self).encode_batch(texts).await
    }
}

/// Check an encoder's output against the expected dimension.
pub fn validate_output(tokens: MultiVector, dimension: usize) -> Result<MultiVector> {
    tokens
        .check_dim(dimension)
        .map_err(|e| Error::Malformed(e.to_string()))?;
    Ok(tokens)
}

// ============================================================================
// Tests
// ============================================================================
