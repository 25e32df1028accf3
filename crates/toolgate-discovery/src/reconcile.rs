//! Per-source reconciliation: normalize fetched
//! tools into the registry's shape, diff against what's already stored by
//! content hash, and deactivate anything the source stopped advertising.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use toolgate_core::{ImplementationType, NewTool, ToolPatch};
use toolgate_embed::EmbeddingClient;
use toolgate_persist::{content_hash, ListFilter, ToolRegistry, VectorStore};

use crate::config::SourceConfig;
use crate::error::DiscoveryError;
use crate::fetch::RemoteTool;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncSummary {
    pub source: String,
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub deactivated: usize,
    pub errors: Vec<String>,
}

pub async fn reconcile_source(
    source: &SourceConfig,
    remote_tools: Vec<RemoteTool>,
    registry: &Arc<dyn ToolRegistry>,
    vector_store: &Arc<dyn VectorStore>,
    embedder: &Arc<dyn EmbeddingClient>,
) -> SyncSummary {
    let mut summary = SyncSummary {
        source: source.name.clone(),
        fetched: remote_tools.len(),
        ..Default::default()
    };

    let mut fetched_names = std::collections::HashSet::new();

    for remote in &remote_tools {
        let qualified_name = format!("{}:{}", source.name, remote.name);
        fetched_names.insert(qualified_name.clone());

        let implementation_code = serde_json::json!({
            "url": source.url,
            "tool_name": remote.name,
        })
        .to_string();

        match reconcile_one(
            registry,
            vector_store,
            embedder,
            &qualified_name,
            remote,
            source,
            implementation_code,
        )
        .await
        {
            Ok(Outcome::Created) => summary.created += 1,
            Ok(Outcome::Updated) => summary.updated += 1,
            Ok(Outcome::Unchanged) => {}
            Err(e) => {
                error!(source = %source.name, tool = %qualified_name, error = %e, "reconcile failed for tool");
                summary.errors.push(format!("{qualified_name}: {e}"));
            }
        }
    }

    match deactivate_stale(registry, &source.name, &fetched_names).await {
        Ok(count) => summary.deactivated = count,
        Err(e) => summary.errors.push(format!("deactivate pass: {e}")),
    }

    info!(
        source = %source.name,
        fetched = summary.fetched,
        created = summary.created,
        updated = summary.updated,
        deactivated = summary.deactivated,
        errors = summary.errors.len(),
        "discovery sync complete for source"
    );

    summary
}

enum Outcome {
    Created,
    Updated,
    Unchanged,
}

async fn reconcile_one(
    registry: &Arc<dyn ToolRegistry>,
    vector_store: &Arc<dyn VectorStore>,
    embedder: &Arc<dyn EmbeddingClient>,
    qualified_name: &str,
    remote: &RemoteTool,
    source: &SourceConfig,
    implementation_code: String,
) -> Result<Outcome, DiscoveryError> {
    let category = source
        .default_category
        .clone()
        .unwrap_or_else(|| "discovered".to_string());
    let tags = source.default_tags.clone();
    let implementation_type = source.kind.implementation_type();

    let new_hash = content_hash(&remote.description, &remote.input_schema, &category, &tags);

    match registry.get_by_name(qualified_name).await? {
        None => {
            let tool = registry
                .register(NewTool {
                    name: qualified_name.to_string(),
                    description: remote.description.clone(),
                    category,
                    tags,
                    input_schema: remote.input_schema.clone(),
                    output_schema: None,
                    implementation_type,
                    implementation_code,
                    version: "1.0.0".to_string(),
                    metadata: serde_json::json!({}),
                    auto_embed: true,
                })
                .await?;

            embed_tool(vector_store, embedder, tool.id, &tool.name, &tool.description, &tool.category, &tool.tags)
                .await;
            Ok(Outcome::Created)
        }
        Some(existing) => {
            let existing_hash = content_hash(
                &existing.description,
                &existing.input_schema,
                &existing.category,
                &existing.tags,
            );

            if existing_hash == new_hash && existing.is_active {
                return Ok(Outcome::Unchanged);
            }

            let patch = ToolPatch {
                name: None,
                description: Some(remote.description.clone()),
                category: Some(category),
                tags: Some(tags),
                input_schema: Some(remote.input_schema.clone()),
                output_schema: None,
                implementation_type: Some(implementation_type),
                implementation_code: Some(implementation_code),
                version: None,
                metadata: None,
            };

            let tool = registry.update(existing.id, patch).await?;

            if !existing.is_active {
                registry.activate(tool.id).await?;
            }

            embed_tool(vector_store, embedder, tool.id, &tool.name, &tool.description, &tool.category, &tool.tags)
                .await;
            Ok(Outcome::Updated)
        }
    }
}

async fn embed_tool(
    vector_store: &Arc<dyn VectorStore>,
    embedder: &Arc<dyn EmbeddingClient>,
    tool_id: i64,
    name: &str,
    description: &str,
    category: &str,
    tags: &[String],
) {
    let text = toolgate_core::Tool::embedding_text(name, description, category, tags);
    match embedder.embed(&text).await {
        Ok(vector) => {
            if let Err(e) = vector_store.set_embedding(tool_id, &vector).await {
                error!(tool_id, error = %e, "failed to persist embedding after discovery");
            }
        }
        Err(e) => {
            error!(tool_id, error = %e, "embedding backend unavailable during discovery, leaving tool unembedded");
        }
    }
}

async fn deactivate_stale(
    registry: &Arc<dyn ToolRegistry>,
    source_name: &str,
    fetched_names: &std::collections::HashSet<String>,
) -> Result<usize, DiscoveryError> {
    let prefix = format!("{source_name}:");
    let (tools, _total) = registry
        .list(ListFilter {
            category: None,
            active_only: true,
            limit: 10_000,
            offset: 0,
        })
        .await?;

    let mut deactivated = 0;
    for tool in tools {
        if tool.name.starts_with(&prefix) && !fetched_names.contains(&tool.name) {
            registry.deactivate(tool.id).await?;
            deactivated += 1;
        }
    }

    Ok(deactivated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use toolgate_embed::EmbeddingError;
    use toolgate_persist::{connect, PoolConfig, SqliteStore};

    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingClient for StubEmbedder {
        fn dimension(&self) -> usize {
            4
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let seed = text.len() as f32;
            Ok(vec![seed, seed, seed, seed])
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            let mut out = Vec::with_capacity(texts.len());
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }
        async fn health(&self) -> bool {
            true
        }
    }

    async fn harness() -> (Arc<SqliteStore>, Arc<dyn EmbeddingClient>) {
        let pool = connect(&PoolConfig::memory(4)).await.unwrap();
        let store = Arc::new(SqliteStore::new(pool, 4));
        (store, Arc::new(StubEmbedder) as Arc<dyn EmbeddingClient>)
    }

    fn source(name: &str, url: &str) -> SourceConfig {
        SourceConfig {
            name: name.to_string(),
            url: url.to_string(),
            default_category: Some("math".to_string()),
            default_tags: vec!["discovered".to_string()],
            kind: crate::config::SourceKind::McpServer,
        }
    }

    fn remote(name: &str, description: &str) -> RemoteTool {
        RemoteTool {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: serde_json::json!({"type": "object"}),
        }
    }

    #[tokio::test]
    async fn reconcile_creates_then_is_idempotent() {
        let (store, embedder) = harness().await;
        let registry: Arc<dyn ToolRegistry> = store.clone();
        let vector_store: Arc<dyn VectorStore> = store.clone();
        let src = source("alpha", "http://alpha.example/mcp");
        let remote_tools = vec![remote("t1", "does a thing"), remote("t2", "does another thing")];

        let first = reconcile_source(&src, remote_tools.clone(), &registry, &vector_store, &embedder).await;
        assert_eq!(first.created, 2);
        assert_eq!(first.updated, 0);
        assert_eq!(first.deactivated, 0);
        assert!(first.errors.is_empty());

        let t1 = registry.get_by_name("alpha:t1").await.unwrap().unwrap();
        assert!(t1.is_active);
        assert_eq!(t1.category, "math");

        let second = reconcile_source(&src, remote_tools, &registry, &vector_store, &embedder).await;
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.deactivated, 0);
        assert!(second.errors.is_empty());
    }

    #[tokio::test]
    async fn reconcile_updates_changed_tool_and_deactivates_missing() {
        let (store, embedder) = harness().await;
        let registry: Arc<dyn ToolRegistry> = store.clone();
        let vector_store: Arc<dyn VectorStore> = store.clone();
        let src = source("beta", "http://beta.example/mcp");

        reconcile_source(
            &src,
            vec![remote("t1", "v1 description"), remote("t2", "stays the same")],
            &registry,
            &vector_store,
            &embedder,
        )
        .await;

        // t1's description changes, t2 disappears from the upstream fetch.
        let changed = reconcile_source(
            &src,
            vec![remote("t1", "v2 description, reworded")],
            &registry,
            &vector_store,
            &embedder,
        )
        .await;

        assert_eq!(changed.created, 0);
        assert_eq!(changed.updated, 1);
        assert_eq!(changed.deactivated, 1);

        let t1 = registry.get_by_name("beta:t1").await.unwrap().unwrap();
        assert_eq!(t1.description, "v2 description, reworded");
        let t2 = registry.get_by_name("beta:t2").await.unwrap().unwrap();
        assert!(!t2.is_active);
    }

    #[tokio::test]
    async fn reconcile_reactivates_tool_that_reappears() {
        let (store, embedder) = harness().await;
        let registry: Arc<dyn ToolRegistry> = store.clone();
        let vector_store: Arc<dyn VectorStore> = store.clone();
        let src = source("gamma", "http://gamma.example/mcp");

        reconcile_source(&src, vec![remote("t1", "desc")], &registry, &vector_store, &embedder).await;
        reconcile_source(&src, vec![], &registry, &vector_store, &embedder).await;
        let deactivated = registry.get_by_name("gamma:t1").await.unwrap().unwrap();
        assert!(!deactivated.is_active);

        let revived = reconcile_source(&src, vec![remote("t1", "desc")], &registry, &vector_store, &embedder).await;
        assert_eq!(revived.updated, 1);
        let t1 = registry.get_by_name("gamma:t1").await.unwrap().unwrap();
        assert!(t1.is_active);
    }
}
