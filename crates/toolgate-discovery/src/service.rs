//! The discovery service: runs reconciliation across every configured
//! source, one source at a time, aggregating per-source summaries into a
//! single report.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use toolgate_embed::EmbeddingClient;
use toolgate_persist::{ToolRegistry, VectorStore};

use crate::config::DiscoveryConfig;
use crate::fetch;
use crate::reconcile::{reconcile_source, SyncSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub summaries: Vec<SyncSummary>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct DiscoveryService {
    registry: Arc<dyn ToolRegistry>,
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingClient>,
    http: reqwest::Client,
    config: DiscoveryConfig,
}

impl DiscoveryService {
    pub fn new(
        registry: Arc<dyn ToolRegistry>,
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingClient>,
        http: reqwest::Client,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            registry,
            vector_store,
            embedder,
            http,
            config,
        }
    }

    /// Runs reconciliation against every configured source, one at a time.
    /// A source that fails to fetch contributes an all-errors summary and
    /// does not stop the remaining sources from running.
    pub async fn sync_all(&self) -> SyncReport {
        let started_at = Utc::now();
        let mut summaries = Vec::with_capacity(self.config.sources.len());

        for source in &self.config.sources {
            let summary = self.sync_one(source).await;
            summaries.push(summary);
        }

        SyncReport {
            summaries,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Runs reconciliation for a single named source (`POST /admin/mcp/sync
    /// {source}`). Returns `None` when no source with that name is
    /// configured.
    pub async fn sync_source(&self, name: &str) -> Option<SyncReport> {
        let source = self.config.sources.iter().find(|s| s.name == name)?;
        let started_at = Utc::now();
        let summary = self.sync_one(source).await;
        Some(SyncReport {
            summaries: vec![summary],
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn sync_one(&self, source: &crate::config::SourceConfig) -> SyncSummary {
        match fetch::fetch_tools(
            &self.http,
            &source.name,
            &source.url,
            self.config.fetch_timeout_ms,
            self.config.max_retries,
        )
        .await
        {
            Ok(remote_tools) => {
                reconcile_source(
                    source,
                    remote_tools,
                    &self.registry,
                    &self.vector_store,
                    &self.embedder,
                )
                .await
            }
            Err(e) => {
                error!(source = %source.name, error = %e, "failed to fetch tools from discovery source");
                SyncSummary {
                    source: source.name.clone(),
                    errors: vec![e.to_string()],
                    ..Default::default()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use toolgate_embed::EmbeddingError;
    use toolgate_persist::{connect, PoolConfig, SqliteStore};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingClient for StubEmbedder {
        fn dimension(&self) -> usize {
            2
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![0.1, 0.2])
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![0.1, 0.2]).collect())
        }
        async fn health(&self) -> bool {
            true
        }
    }

    async fn mock_tools_server(tools: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"tools": tools},
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn sync_all_aggregates_one_summary_per_source_and_is_nonfatal_on_failure() {
        let good = mock_tools_server(serde_json::json!([
            {"name": "t1", "description": "does a thing", "inputSchema": {"type": "object"}}
        ]))
        .await;

        let pool = connect(&PoolConfig::memory(2)).await.unwrap();
        let store = std::sync::Arc::new(SqliteStore::new(pool, 2));
        let embedder: Arc<dyn EmbeddingClient> = Arc::new(StubEmbedder);

        let config = DiscoveryConfig {
            sources: vec![
                crate::config::SourceConfig {
                    name: "good".to_string(),
                    url: format!("{}/mcp", good.uri()),
                    default_category: None,
                    default_tags: vec![],
                    kind: crate::config::SourceKind::McpServer,
                },
                crate::config::SourceConfig {
                    name: "unreachable".to_string(),
                    url: "http://127.0.0.1:1/mcp".to_string(),
                    default_category: None,
                    default_tags: vec![],
                    kind: crate::config::SourceKind::McpServer,
                },
            ],
            fetch_timeout_ms: 2_000,
            max_retries: 0,
        };

        let service = DiscoveryService::new(
            store.clone() as Arc<dyn ToolRegistry>,
            store.clone() as Arc<dyn VectorStore>,
            embedder,
            reqwest::Client::new(),
            config,
        );

        let report = service.sync_all().await;
        assert_eq!(report.summaries.len(), 2);

        let good_summary = report.summaries.iter().find(|s| s.source == "good").unwrap();
        assert_eq!(good_summary.created, 1);
        assert!(good_summary.errors.is_empty());

        let bad_summary = report
            .summaries
            .iter()
            .find(|s| s.source == "unreachable")
            .unwrap();
        assert_eq!(bad_summary.created, 0);
        assert!(!bad_summary.errors.is_empty());
    }

    #[tokio::test]
    async fn sync_source_returns_none_for_unknown_name() {
        let pool = connect(&PoolConfig::memory(2)).await.unwrap();
        let store = std::sync::Arc::new(SqliteStore::new(pool, 2));
        let embedder: Arc<dyn EmbeddingClient> = Arc::new(StubEmbedder);
        let service = DiscoveryService::new(
            store.clone() as Arc<dyn ToolRegistry>,
            store.clone() as Arc<dyn VectorStore>,
            embedder,
            reqwest::Client::new(),
            DiscoveryConfig::default(),
        );
        assert!(service.sync_source("nope").await.is_none());
    }
}
