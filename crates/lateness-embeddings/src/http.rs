//! Client for a remote ColBERT-style encoder service.
//!
//! Protocol: `POST {base_url}/encode` with
//! `{"model": "...", "texts": ["..."], "kind": "document" | "query"}`,
//! answered by `{"embeddings": [[[f32; D]; tokens]; texts]}` or
//! `{"error": "..."}`.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{validate_output, Encoder, Error, MultiVector, Result};

/// Maximum retries per request before giving up
const MAX_RETRIES: u32 = 2;

/// Delay between retries (doubles each time)
const RETRY_DELAY_MS: u64 = 500;

/// Maximum texts per request
const MAX_BATCH_SIZE: usize = 64;

/// Configuration for the HTTP encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpEncoderConfig {
    /// Base URL of the encoder service.
    pub base_url: String,
    /// Model name to request.
    pub model: String,
    /// Bearer token, if the service requires one.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Expected token vector dimension.
    pub dimension: usize,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum EncodeKind {
    Document,
    Query,
}

#[derive(Debug, Serialize)]
struct EncodeRequest<'a> {
    model: &'a str,
    texts: &'a [String],
    kind: EncodeKind,
}

#[derive(Debug, Deserialize)]
struct EncodeResponse {
    embeddings: Option<Vec<Vec<Vec<f32>>>>,
    error: Option<String>,
}

/// Encoder backed by an HTTP service.
#[derive(Debug, Clone)]
pub struct HttpEncoder {
    config: HttpEncoderConfig,
    client: Client,
}

impl HttpEncoder {
    pub fn new(config: HttpEncoderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            dimension = config.dimension,
            "HTTP encoder initialized"
        );

        Ok(Self { config, client })
    }

    async fn encode_many(&self, texts: &[String], kind: EncodeKind) -> Vec<Result<MultiVector>> {
        let mut results: Vec<Option<Result<MultiVector>>> = vec![None; texts.len()];

        // Degenerate inputs never reach the service.
        let mut pending: Vec<usize> = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            if text.trim().is_empty() {
                results[i] = Some(Err(Error::EmptyInput("text is empty".to_string())));
            } else {
                pending.push(i);
            }
        }

        for chunk in pending.chunks(MAX_BATCH_SIZE) {
            let chunk_texts: Vec<String> = chunk.iter().map(|&i| texts[i].clone()).collect();
            match self.call_with_retry(&chunk_texts, kind).await {
                Ok(outputs) => {
                    for (&i, rows) in chunk.iter().zip(outputs) {
                        results[i] = Some(self.to_multi_vector(rows));
                    }
                }
                Err(e) => {
                    warn!(error = %e, count = chunk.len(), "Encoder request failed");
                    for &i in chunk {
                        results[i] = Some(Err(e.clone()));
                    }
                }
            }
        }

        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| Err(Error::Internal("missing encoder output".to_string()))))
            .collect()
    }

    fn to_multi_vector(&self, rows: Vec<Vec<f32>>) -> Result<MultiVector> {
        if rows.is_empty() {
            return Err(Error::EmptyInput("encoder produced no tokens".to_string()));
        }
        let tokens = MultiVector::from_rows(rows).map_err(|e| Error::Malformed(e.to_string()))?;
        validate_output(tokens, self.config.dimension)
    }

    async fn call_with_retry(
        &self,
        texts: &[String],
        kind: EncodeKind,
    ) -> Result<Vec<Vec<Vec<f32>>>> {
        let mut delay = RETRY_DELAY_MS;
        let mut attempt = 0;

        loop {
            match self.call(texts, kind).await {
                Ok(outputs) => return Ok(outputs),
                Err(e) if attempt < MAX_RETRIES && Self::is_retryable(&e) => {
                    attempt += 1;
                    debug!(attempt, delay_ms = delay, error = %e, "Retrying encoder request");
                    sleep(Duration::from_millis(delay)).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call(&self, texts: &[String], kind: EncodeKind) -> Result<Vec<Vec<Vec<f32>>>> {
        let url = format!("{}/encode", self.config.base_url.trim_end_matches('/'));

        let mut request = self.client.post(&url).json(&EncodeRequest {
            model: &self.config.model,
            texts,
            kind,
        });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Provider(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let resp: EncodeResponse = response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("Failed to parse encoder response: {}", e)))?;

        if let Some(error) = resp.error {
            return Err(Error::Provider(error));
        }

        let embeddings = resp
            .embeddings
            .ok_or_else(|| Error::Malformed("No embeddings in encoder response".to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(Error::Malformed(format!(
                "Expected {} outputs, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }

    /// Check if an error is retryable (rate limit, temporary failure).
    fn is_retryable(error: &Error) -> bool {
        let msg = error.to_string().to_lowercase();
        msg.contains("rate")
            || msg.contains("limit")
            || msg.contains("429")
            || msg.contains("503")
            || msg.contains("timeout")
            || msg.contains("temporarily")
    }
}

#[async_trait::async_trait]
impl Encoder for HttpEncoder {
    fn model_id(&self) -> &str {
        &self.config.model
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn encode(&self, text: &str) -> Result<MultiVector> {
        let texts = [text.to_string()];
        self.encode_many(&texts, EncodeKind::Document)
            .await
            .pop()
            .unwrap_or_else(|| Err(Error::Internal("missing encoder output".to_string())))
    }

    async fn encode_query(&self, text: &str) -> Result<MultiVector> {
        let texts = [text.to_string()];
        self.encode_many(&texts, EncodeKind::Query)
            .await
            .pop()
            .unwrap_or_else(|| Err(Error::Internal("missing encoder output".to_string())))
    }

    async fn encode_batch(&self, texts: &[String]) -> Vec<Result<MultiVector>> {
        self.encode_many(texts, EncodeKind::Document).await
    }
}
