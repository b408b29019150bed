//! Deterministic token encoder built from hashed character trigrams.
//!
//! Each token is embedded as the normalized sum of pseudo-random vectors,
//! one per boundary-marked trigram (`<de`, `dep`, ... `oy>`), seeded from
//! the trigram's SHA-256. Tokens that share subwords ("deploy" and
//! "deployment") get correspondingly similar vectors. This is NOT semantic;
//! it exists for development and tests when no encoder service is available.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::{Encoder, Error, MultiVector, Result, DEFAULT_MAX_DOC_TOKENS, DEFAULT_MAX_QUERY_TOKENS};

/// Words that carry no retrieval signal and are dropped before embedding.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "do", "does", "for",
    "from", "has", "have", "how", "i", "if", "in", "into", "is", "it", "its", "of", "on", "or",
    "so", "such", "than", "that", "the", "their", "then", "there", "these", "they", "this", "to",
    "was", "we", "were", "what", "when", "where", "which", "who", "why", "will", "with", "you",
];

/// Model-free encoder producing one vector per non-stopword token.
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    model_id: String,
    dimension: usize,
    max_doc_tokens: usize,
    max_query_tokens: usize,
}

impl HashingEncoder {
    pub fn new(dimension: usize) -> Self {
        Self {
            model_id: format!("hashing-trigram-{}", dimension),
            dimension,
            max_doc_tokens: DEFAULT_MAX_DOC_TOKENS,
            max_query_tokens: DEFAULT_MAX_QUERY_TOKENS,
        }
    }

    pub fn with_token_limits(mut self, max_doc_tokens: usize, max_query_tokens: usize) -> Self {
        self.max_doc_tokens = max_doc_tokens;
        self.max_query_tokens = max_query_tokens;
        self
    }

    /// Lowercased alphanumeric words with stopwords removed.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .filter(|w| !STOPWORDS.contains(&w.as_str()))
            .collect()
    }

    /// Unit-length embedding of a single token.
    pub fn embed_token(&self, token: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];

        let marked: Vec<char> = std::iter::once('<')
            .chain(token.chars())
            .chain(std::iter::once('>'))
            .collect();

        for trigram in marked.windows(3) {
            let trigram: String = trigram.iter().collect();
            let digest = Sha256::digest(trigram.as_bytes());
            let mut seed = [0u8; 8];
            seed.copy_from_slice(&digest[..8]);

            let mut rng = StdRng::seed_from_u64(u64::from_le_bytes(seed));
            for value in embedding.iter_mut() {
                *value += rng.gen_range(-1.0f32..1.0);
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        embedding
    }

    fn encode_limited(&self, text: &str, limit: usize) -> Result<MultiVector> {
        let tokens = self.tokenize(text);
        if tokens.is_empty() {
            return Err(Error::EmptyInput(format!(
                "no tokens in {:?}",
                text.chars().take(40).collect::<String>()
            )));
        }

        let rows: Vec<Vec<f32>> = tokens
            .iter()
            .take(limit.max(1))
            .map(|t| self.embed_token(t))
            .collect();
        trace!(tokens = rows.len(), "Hash-encoded text");

        MultiVector::from_rows(rows).map_err(|e| Error::Internal(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Encoder for HashingEncoder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, text: &str) -> Result<MultiVector> {
        self.encode_limited(text, self.max_doc_tokens)
    }

    async fn encode_query(&self, text: &str) -> Result<MultiVector> {
        self.encode_limited(text, self.max_query_tokens)
    }
}
