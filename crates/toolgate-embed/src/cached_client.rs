//! Wraps any [`EmbeddingClient`] with the process-local [`EmbeddingCache`].
//! Disabling this wrapper (using the inner client directly) must not change
//! correctness, only cache-hit behavior.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::{CacheStats, EmbeddingCache};
use crate::client::EmbeddingClient;
use crate::error::EmbeddingError;

pub struct CachedEmbeddingClient {
    inner: Arc<dyn EmbeddingClient>,
    cache: EmbeddingCache,
}

impl CachedEmbeddingClient {
    pub fn new(inner: Arc<dyn EmbeddingClient>, capacity: usize) -> Self {
        Self {
            inner,
            cache: EmbeddingCache::new(capacity),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[async_trait]
impl EmbeddingClient for CachedEmbeddingClient {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if let Some(vector) = self.cache.get(text) {
            return Ok(vector);
        }
        let vector = self.inner.embed(text).await?;
        self.cache.put(text.to_string(), vector.clone());
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut results = vec![None; texts.len()];
        let mut misses = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            if let Some(vector) = self.cache.get(text) {
                results[i] = Some(vector);
            } else {
                misses.push((i, text.clone()));
            }
        }

        if !misses.is_empty() {
            let miss_texts: Vec<String> = misses.iter().map(|(_, t)| t.clone()).collect();
            let fetched = self.inner.embed_batch(&miss_texts).await?;
            for ((i, text), vector) in misses.into_iter().zip(fetched.into_iter()) {
                self.cache.put(text, vector.clone());
                results[i] = Some(vector);
            }
        }

        results
            .into_iter()
            .map(|v| v.ok_or(EmbeddingError::UnrecognizedShape))
            .collect()
    }

    async fn health(&self) -> bool {
        self.inner.health().await
    }
}
