use async_trait::async_trait;
use toolgate_core::{NewTool, NewToolExecution, RegistryStats, Tool, ToolPatch};

use crate::error::StoreError;

/// A scored search hit. `score` is always clamped to `[0, 1]`.
#[derive(Debug, Clone)]
pub struct ScoredTool {
    pub tool: Tool,
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub category: Option<String>,
    pub active_only: bool,
    pub limit: i64,
    pub offset: i64,
}

/// CRUD and lifecycle operations over the tool catalog.
/// Every mutating method commits its own transaction; it never relies on
/// connection-pool auto-commit.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    async fn register(&self, new_tool: NewTool) -> Result<Tool, StoreError>;
    async fn update(&self, id: i64, patch: ToolPatch) -> Result<Tool, StoreError>;
    async fn deactivate(&self, id: i64) -> Result<Tool, StoreError>;
    async fn activate(&self, id: i64) -> Result<Tool, StoreError>;
    async fn delete(&self, id: i64) -> Result<(), StoreError>;
    async fn get(&self, id: i64) -> Result<Option<Tool>, StoreError>;
    async fn get_by_name(&self, name: &str) -> Result<Option<Tool>, StoreError>;
    async fn list(&self, filter: ListFilter) -> Result<(Vec<Tool>, i64), StoreError>;
    async fn reindex(&self, id: i64) -> Result<(), StoreError>;
    async fn record_execution(&self, execution: NewToolExecution) -> Result<(), StoreError>;
    async fn stats(&self) -> Result<RegistryStats, StoreError>;
    async fn active_names(&self) -> Result<Vec<String>, StoreError>;
    async fn is_healthy(&self) -> bool;
}

/// Vector/lexical query surface over the catalog.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn dimension(&self) -> usize;

    /// Writes the embedding column for a tool; validates length against
    /// `dimension()`.
    async fn set_embedding(&self, tool_id: i64, vector: &[f32]) -> Result<(), StoreError>;

    async fn semantic_search(
        &self,
        query_vec: &[f32],
        limit: i64,
        min_similarity: f32,
        category: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<ScoredTool>, StoreError>;

    async fn lexical_search(
        &self,
        query_text: &str,
        limit: i64,
        category: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<ScoredTool>, StoreError>;

    async fn hybrid_search(
        &self,
        query_text: &str,
        query_vec: &[f32],
        limit: i64,
        alpha: f32,
        min_similarity: f32,
        category: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<ScoredTool>, StoreError>;

    async fn find_similar(
        &self,
        tool_id: i64,
        limit: i64,
        exclude_self: bool,
    ) -> Result<Vec<ScoredTool>, StoreError>;

    async fn count_indexed(&self, active_only: bool) -> Result<i64, StoreError>;
    async fn list_categories(&self) -> Result<Vec<String>, StoreError>;
    async fn has_any_embeddings(&self) -> Result<bool, StoreError>;
}
