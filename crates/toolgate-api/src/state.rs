//! Application state shared across handlers: every component is built once
//! in `toolgate-server::main` and handed down as an `Arc`, cloned cheaply
//! into each handler.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use toolgate_core::Recorder;
use toolgate_discovery::DiscoveryService;
use toolgate_embed::EmbeddingClient;
use toolgate_exec::ExecutionRouter;
use toolgate_persist::{ToolRegistry, VectorStore};
use toolgate_retrieval::RetrievalEngine;

use crate::auth::AdminAuth;

#[derive(Clone)]
pub struct AppState {
    registry: Arc<dyn ToolRegistry>,
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingClient>,
    retrieval: Arc<RetrievalEngine>,
    executor: Arc<ExecutionRouter>,
    discovery: Option<Arc<DiscoveryService>>,
    admin_auth: Option<Arc<AdminAuth>>,
    recorder: Arc<dyn Recorder>,
    metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<dyn ToolRegistry>,
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingClient>,
        retrieval: Arc<RetrievalEngine>,
        executor: Arc<ExecutionRouter>,
        discovery: Option<Arc<DiscoveryService>>,
        admin_auth: Option<Arc<AdminAuth>>,
        recorder: Arc<dyn Recorder>,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            registry,
            vector_store,
            embedder,
            retrieval,
            executor,
            discovery,
            admin_auth,
            recorder,
            metrics_handle,
        }
    }

    pub fn metrics_handle(&self) -> Option<&PrometheusHandle> {
        self.metrics_handle.as_ref()
    }

    pub fn registry(&self) -> &Arc<dyn ToolRegistry> {
        &self.registry
    }

    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingClient> {
        &self.embedder
    }

    pub fn retrieval(&self) -> &RetrievalEngine {
        &self.retrieval
    }

    pub fn executor(&self) -> &ExecutionRouter {
        &self.executor
    }

    pub fn discovery(&self) -> Option<&Arc<DiscoveryService>> {
        self.discovery.as_ref()
    }

    pub fn admin_auth(&self) -> Option<&Arc<AdminAuth>> {
        self.admin_auth.as_ref()
    }

    pub fn recorder(&self) -> &Arc<dyn Recorder> {
        &self.recorder
    }

    /// Embeds a tool's current text and writes the vector, used after
    /// register/update/reindex so the row never sits long without a fresh
    /// embedding. Mirrors `toolgate-discovery`'s `reconcile::embed_tool`.
    pub async fn embed_and_store(&self, tool: &toolgate_core::Tool) -> Result<(), crate::error::ApiError> {
        let text = toolgate_core::Tool::embedding_text(
            &tool.name,
            &tool.description,
            &tool.category,
            &tool.tags,
        );
        let vector = self.embedder.embed(&text).await?;
        self.vector_store.set_embedding(tool.id, &vector).await?;
        Ok(())
    }
}
