//! The retrieval engine: turns a free-text query into a ranked tool list,
//! blending semantic and lexical search and degrading gracefully when the
//! embedding backend or the catalog's embeddings aren't available.

use std::sync::Arc;

use tracing::warn;

use toolgate_embed::EmbeddingClient;
use toolgate_persist::{ScoredTool, VectorStore};

use crate::config::RetrievalConfig;
use crate::error::RetrievalError;

/// Trims and collapses interior whitespace runs to a single space, per the
/// retrieval engine's query normalization step.
pub fn normalize_query(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub struct RetrievalEngine {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    config: RetrievalConfig,
}

#[derive(Debug, Clone)]
pub struct FindToolQuery<'a> {
    pub text: &'a str,
    pub limit: Option<i64>,
    /// Minimum semantic similarity a result must clear.
    /// `None` falls back to `RetrievalConfig::min_similarity`.
    pub threshold: Option<f32>,
    pub category: Option<&'a str>,
    pub active_only: bool,
    /// `true` blends semantic + lexical via `hybrid_search`; `false` uses
    /// `semantic_search` alone. Ignored once a degraded (lexical-only) path
    /// is taken.
    pub use_hybrid: bool,
}

impl<'a> FindToolQuery<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            limit: None,
            threshold: None,
            category: None,
            active_only: true,
            use_hybrid: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub tools: Vec<ScoredTool>,
    /// True when the result is lexical-only because the embedding backend
    /// was unreachable or the catalog has no embedded tools yet.
    pub degraded: bool,
}

impl RetrievalEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    pub async fn find_tool(&self, query: FindToolQuery<'_>) -> Result<RetrievalResult, RetrievalError> {
        let normalized = normalize_query(query.text);
        let text = normalized.as_str();
        if text.is_empty() {
            return Err(RetrievalError::InvalidQuery("query text is empty".into()));
        }

        let limit = self.config.clamp_limit(query.limit);
        let min_similarity = query.threshold.unwrap_or(self.config.min_similarity);

        if !self.store.has_any_embeddings().await? {
            let tools = self
                .store
                .lexical_search(text, limit, query.category, query.active_only)
                .await?;
            return Ok(RetrievalResult {
                tools,
                degraded: true,
            });
        }

        let query_vec = match self.embedder.embed(text).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "embedding backend unavailable, falling back to lexical search");
                let tools = self
                    .store
                    .lexical_search(text, limit, query.category, query.active_only)
                    .await?;
                return Ok(RetrievalResult {
                    tools,
                    degraded: true,
                });
            }
        };

        let tools = if query.use_hybrid {
            self.store
                .hybrid_search(
                    text,
                    &query_vec,
                    limit,
                    self.config.alpha,
                    min_similarity,
                    query.category,
                    query.active_only,
                )
                .await?
        } else {
            self.store
                .semantic_search(
                    &query_vec,
                    limit,
                    min_similarity,
                    query.category,
                    query.active_only,
                )
                .await?
        };

        Ok(RetrievalResult {
            tools,
            degraded: false,
        })
    }

    pub async fn similar_to(
        &self,
        tool_id: i64,
        limit: Option<i64>,
        exclude_self: bool,
    ) -> Result<RetrievalResult, RetrievalError> {
        let limit = self.config.clamp_limit(limit);
        let tools = self.store.find_similar(tool_id, limit, exclude_self).await?;
        Ok(RetrievalResult {
            tools,
            degraded: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use toolgate_embed::EmbeddingError;
    use toolgate_persist::ListFilter;

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingClient for FailingEmbedder {
        fn dimension(&self) -> usize {
            3
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Timeout)
        }
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Timeout)
        }
        async fn health(&self) -> bool {
            false
        }
    }

    struct StubStore {
        lexical_calls: AtomicUsize,
    }

    #[async_trait]
    impl VectorStore for StubStore {
        fn dimension(&self) -> usize {
            3
        }
        async fn set_embedding(
            &self,
            _tool_id: i64,
            _vector: &[f32],
        ) -> Result<(), toolgate_persist::StoreError> {
            Ok(())
        }
        async fn semantic_search(
            &self,
            _query_vec: &[f32],
            _limit: i64,
            _min_similarity: f32,
            _category: Option<&str>,
            _active_only: bool,
        ) -> Result<Vec<ScoredTool>, toolgate_persist::StoreError> {
            Ok(vec![])
        }
        async fn lexical_search(
            &self,
            _query_text: &str,
            _limit: i64,
            _category: Option<&str>,
            _active_only: bool,
        ) -> Result<Vec<ScoredTool>, toolgate_persist::StoreError> {
            self.lexical_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
        async fn hybrid_search(
            &self,
            _query_text: &str,
            _query_vec: &[f32],
            _limit: i64,
            _alpha: f32,
            _min_similarity: f32,
            _category: Option<&str>,
            _active_only: bool,
        ) -> Result<Vec<ScoredTool>, toolgate_persist::StoreError> {
            panic!("hybrid_search should not be called when embedding fails");
        }
        async fn find_similar(
            &self,
            _tool_id: i64,
            _limit: i64,
            _exclude_self: bool,
        ) -> Result<Vec<ScoredTool>, toolgate_persist::StoreError> {
            Ok(vec![])
        }
        async fn count_indexed(&self, _active_only: bool) -> Result<i64, toolgate_persist::StoreError> {
            Ok(0)
        }
        async fn list_categories(&self) -> Result<Vec<String>, toolgate_persist::StoreError> {
            Ok(vec![])
        }
        async fn has_any_embeddings(&self) -> Result<bool, toolgate_persist::StoreError> {
            Ok(true)
        }
    }

    #[allow(dead_code)]
    fn _unused(_f: ListFilter) {}

    #[tokio::test]
    async fn falls_back_to_lexical_when_embedding_fails() {
        let store = Arc::new(StubStore {
            lexical_calls: AtomicUsize::new(0),
        });
        let engine = RetrievalEngine::new(Arc::new(FailingEmbedder), store.clone(), RetrievalConfig::default());

        let result = engine
            .find_tool(FindToolQuery::new("convert currency"))
            .await
            .unwrap();

        assert!(result.degraded);
        assert_eq!(store.lexical_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejects_blank_query() {
        let store = Arc::new(StubStore {
            lexical_calls: AtomicUsize::new(0),
        });
        let engine = RetrievalEngine::new(Arc::new(FailingEmbedder), store, RetrievalConfig::default());
        let err = engine.find_tool(FindToolQuery::new("   ")).await.unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidQuery(_)));
    }

    #[test]
    fn normalize_query_collapses_internal_whitespace() {
        assert_eq!(
            normalize_query("  convert   currency\n\n now  "),
            "convert currency now"
        );
    }
}
