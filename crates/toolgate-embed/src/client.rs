//! Embedding client contract and the default OpenAI-compatible HTTP
//! implementation.
//!
//! `EmbeddingClient::embed` over a reqwest/bearer-auth construction, with a
//! stateless bounded retry-with-backoff loop rather than a full circuit
//! breaker — the calling pattern here is request-scoped, not a long-lived
//! connection that needs to trip open.

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    fn dimension(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
    async fn health(&self) -> bool;
}

pub struct HttpEmbeddingClient {
    http: reqwest::Client,
    config: EmbeddingConfig,
}

impl HttpEmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbeddingError::Connection(e.to_string()))?;
        Ok(Self { http, config })
    }

    async fn post_embeddings(&self, input: EmbeddingInput<'_>) -> Result<Vec<u8>, EmbeddingError> {
        let body = json!({ "input": input, "model": self.config.model });
        let mut request = self.http.post(&self.config.endpoint_url).json(&body);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EmbeddingError::Timeout
            } else {
                EmbeddingError::Connection(e.to_string())
            }
        })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| EmbeddingError::Connection(e.to_string()))?;

        if !status.is_success() {
            let body_str = String::from_utf8_lossy(&bytes).to_string();
            return Err(EmbeddingError::Http {
                status: status.as_u16(),
                body: body_str,
            });
        }

        Ok(bytes.to_vec())
    }

    async fn embed_batch_raw(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let input = if texts.len() == 1 {
            EmbeddingInput::Single(&texts[0])
        } else {
            EmbeddingInput::Many(texts)
        };

        let bytes = self.post_embeddings(input).await?;
        let parsed: RawResponse = serde_json::from_slice(&bytes)?;
        let vectors = parsed.into_vectors()?;

        if vectors.len() != texts.len() {
            // Some backends reject batch payloads with a textual error
            // inside a 200 body rather than a non-2xx status; detect that
            // case via the count mismatch and fall back to sequential calls
            // rather than treating it as success.
            if texts.len() > 1 {
                return Err(EmbeddingError::CountMismatch {
                    sent: texts.len(),
                    received: vectors.len(),
                });
            }
        }

        for v in &vectors {
            if v.len() != self.config.dimension {
                return Err(EmbeddingError::ShapeMismatch {
                    expected: self.config.dimension,
                    got: v.len(),
                });
            }
        }

        Ok(vectors)
    }

    async fn with_retry<T, F, Fut>(&self, mut f: F) -> Result<T, EmbeddingError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, EmbeddingError>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let base_ms = 200u64 * 2u64.pow(attempt);
                    let jitter_ms = rand::thread_rng().gen_range(0..=base_ms / 2 + 1);
                    let delay = std::time::Duration::from_millis(base_ms + jitter_ms)
                        .min(std::time::Duration::from_secs(10));
                    warn!(attempt, error = %e, "retrying embedding request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let texts = vec![text.to_string()];
        let vectors = self
            .with_retry(|| self.embed_batch_raw(&texts))
            .await?;
        vectors
            .into_iter()
            .next()
            .ok_or(EmbeddingError::UnrecognizedShape)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        match self.with_retry(|| self.embed_batch_raw(texts)).await {
            Ok(vectors) if vectors.len() == texts.len() => Ok(vectors),
            Ok(_) | Err(EmbeddingError::CountMismatch { .. }) => {
                // Backend refused the batch shape; fall back to sequential
                // per-text calls, preserving order.
                let mut out = Vec::with_capacity(texts.len());
                for text in texts {
                    out.push(self.embed(text).await?);
                }
                Ok(out)
            }
            Err(EmbeddingError::Http { body, .. }) if batch_rejected(&body) => {
                let mut out = Vec::with_capacity(texts.len());
                for text in texts {
                    out.push(self.embed(text).await?);
                }
                Ok(out)
            }
            Err(e) => Err(e),
        }
    }

    async fn health(&self) -> bool {
        self.embed("healthcheck").await.is_ok()
    }
}

/// Some backends reject a batch payload outright with a non-2xx status
/// whose body mentions "batch" or "array" rather than returning a
/// mismatched count inside a 200. Either signal triggers the same
/// sequential fallback.
fn batch_rejected(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("batch") || lower.contains("array")
}

#[derive(Debug, serde::Serialize)]
#[serde(untagged)]
enum EmbeddingInput<'a> {
    Single(&'a str),
    Many(&'a [String]),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawResponse {
    Data { data: Vec<DataItem> },
    Embeddings { embeddings: Vec<Vec<f32>> },
    Bare(Vec<Vec<f32>>),
}

#[derive(Debug, Deserialize)]
struct DataItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl RawResponse {
    fn into_vectors(self) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        match self {
            RawResponse::Data { mut data } => {
                if data.iter().all(|d| d.index.is_some()) {
                    data.sort_by_key(|d| d.index.unwrap());
                }
                Ok(data.into_iter().map(|d| d.embedding).collect())
            }
            RawResponse::Embeddings { embeddings } => Ok(embeddings),
            RawResponse::Bare(vectors) => Ok(vectors),
        }
    }
}
