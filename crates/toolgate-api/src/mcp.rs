//! MCP protocol facade operations: `list_tools`, `find_tool`, `call_tool`,
//! `call_tool_summarized`, `get_tool_schema`, plus read-only resources and
//! static prompt templates. Plain async functions over `AppState` so both
//! the HTTP surface (`routes.rs`) and the JSON-RPC dispatch used by the
//! stdio transport (`rpc.rs`) share one implementation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use toolgate_core::Tool;
use toolgate_persist::ListFilter;
use toolgate_retrieval::{normalize_query, FindToolQuery};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSummary {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub implementation_type: String,
    pub version: String,
    pub is_active: bool,
}

impl From<&Tool> for ToolSummary {
    fn from(t: &Tool) -> Self {
        Self {
            id: t.id,
            name: t.name.clone(),
            description: t.description.clone(),
            category: t.category.clone(),
            tags: t.tags.clone(),
            implementation_type: t.implementation_type.as_str().to_string(),
            version: t.version.clone(),
            is_active: t.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListToolsParams {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_active_only")]
    pub active_only: bool,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_active_only() -> bool {
    true
}

fn default_list_limit() -> i64 {
    50
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolSummary>,
    pub total: i64,
}

/// `list_tools(filters) -> pages of active tools`.
pub async fn list_tools(state: &AppState, params: ListToolsParams) -> ApiResult<ListToolsResult> {
    let (tools, total) = state
        .registry()
        .list(ListFilter {
            category: params.category,
            active_only: params.active_only,
            limit: params.limit.clamp(1, 200),
            offset: params.offset.max(0),
        })
        .await?;

    Ok(ListToolsResult {
        tools: tools.iter().map(ToolSummary::from).collect(),
        total,
    })
}

#[derive(Debug, Deserialize)]
pub struct FindToolParams {
    pub query: String,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub threshold: Option<f32>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_true")]
    pub use_hybrid: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ScoredToolDto {
    pub tool: ToolSummary,
    pub score: f32,
}

#[derive(Debug, Serialize)]
pub struct FindToolResult {
    pub results: Vec<ScoredToolDto>,
    pub count: usize,
    pub degraded: bool,
}

/// `find_tool(...) -> retrieval results`.
pub async fn find_tool(state: &AppState, params: FindToolParams) -> ApiResult<FindToolResult> {
    let normalized = normalize_query(&params.query);
    let trimmed = normalized.as_str();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".into()));
    }
    if trimmed.chars().count() > 2_000 {
        return Err(ApiError::BadRequest(
            "query exceeds the 2000 character limit".into(),
        ));
    }

    let query = FindToolQuery {
        text: trimmed,
        limit: params.limit,
        threshold: params.threshold,
        category: params.category.as_deref(),
        active_only: true,
        use_hybrid: params.use_hybrid,
    };

    let result = state.retrieval().find_tool(query).await?;
    let results: Vec<ScoredToolDto> = result
        .tools
        .iter()
        .map(|hit| ScoredToolDto {
            tool: ToolSummary::from(&hit.tool),
            score: hit.score,
        })
        .collect();

    Ok(FindToolResult {
        count: results.len(),
        results,
        degraded: result.degraded,
    })
}

#[derive(Debug, Deserialize)]
pub struct CallToolParams {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Serialize)]
pub struct CallToolResult {
    pub output: Value,
    pub duration_ms: i64,
}

/// `call_tool(name, args) -> executor result`.
pub async fn call_tool(state: &AppState, params: CallToolParams) -> ApiResult<CallToolResult> {
    let outcome = state
        .executor()
        .call_tool(&params.tool_name, params.arguments)
        .await?;
    Ok(CallToolResult {
        output: outcome.output,
        duration_ms: outcome.duration_ms,
    })
}

#[derive(Debug, Deserialize)]
pub struct CallToolSummarizedParams {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default)]
    pub hint: Option<String>,
}

fn default_max_tokens() -> usize {
    2_000
}

#[derive(Debug, Serialize)]
pub struct CallToolSummarizedResult {
    pub output: String,
    pub was_summarized: bool,
}

/// `call_tool_summarized(...) -> same but post-processed via the output
/// summarizer`. Always reports `was_summarized`.
pub async fn call_tool_summarized(
    state: &AppState,
    params: CallToolSummarizedParams,
) -> ApiResult<CallToolSummarizedResult> {
    let (output, was_summarized) = state
        .executor()
        .call_tool_summarized(
            &params.tool_name,
            params.arguments,
            params.max_tokens,
            params.hint.as_deref(),
        )
        .await?;
    Ok(CallToolSummarizedResult {
        output,
        was_summarized,
    })
}

#[derive(Debug, Serialize)]
pub struct ToolSchemaResult {
    pub name: String,
    pub input_schema: Value,
    pub output_schema: Option<Value>,
}

/// `get_tool_schema(name) -> tool's input/output schema`.
pub async fn get_tool_schema(state: &AppState, name: &str) -> ApiResult<ToolSchemaResult> {
    let tool = state
        .registry()
        .get_by_name(name)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("tool `{name}` not found")))?;

    Ok(ToolSchemaResult {
        name: tool.name,
        input_schema: tool.input_schema,
        output_schema: tool.output_schema,
    })
}

// ---- Resources (read-only views, ) ----

pub async fn resource_categories(state: &AppState) -> ApiResult<Value> {
    let categories = state.vector_store().list_categories().await?;
    Ok(serde_json::json!({ "categories": categories }))
}

pub async fn resource_stats(state: &AppState) -> ApiResult<Value> {
    let stats = state.registry().stats().await?;
    Ok(serde_json::to_value(stats)?)
}

pub async fn resource_tools_by_category(state: &AppState, category: &str) -> ApiResult<Value> {
    let (tools, total) = state
        .registry()
        .list(ListFilter {
            category: Some(category.to_string()),
            active_only: true,
            limit: 200,
            offset: 0,
        })
        .await?;

    Ok(serde_json::json!({
        "category": category,
        "total": total,
        "tools": tools.iter().map(ToolSummary::from).collect::<Vec<_>>(),
    }))
}

// ---- Prompts: server-side template strings, purely informational ----

pub const PROMPT_DISCOVER_TOOL: &str = "You are selecting a tool to accomplish a task. \
Describe the task in plain language and call `find_tool` with that description as \
`query`. Prefer the highest-scoring result unless its category looks wrong for the task.";

pub const PROMPT_EXECUTE_TOOL: &str = "Before calling a tool, fetch its schema with \
`get_tool_schema` and build an `arguments` object that satisfies it exactly. Call \
`call_tool`, or `call_tool_summarized` when the output may be large.";

pub const PROMPT_PLAN_WORKFLOW: &str = "Break the task into an ordered list of tool calls. \
For each step, resolve the tool with `find_tool`, then execute it before moving to the \
next step. Re-plan if an execution fails or returns an error status.";

pub fn prompt(name: &str) -> Option<&'static str> {
    match name {
        "discover_tool" => Some(PROMPT_DISCOVER_TOOL),
        "execute_tool" => Some(PROMPT_EXECUTE_TOOL),
        "plan_workflow" => Some(PROMPT_PLAN_WORKFLOW),
        _ => None,
    }
}

pub fn prompt_names() -> Vec<&'static str> {
    vec!["discover_tool", "execute_tool", "plan_workflow"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_summary_carries_implementation_type_as_screaming_snake_case() {
        let tool = Tool {
            id: 1,
            name: "calc".into(),
            description: "adds".into(),
            category: "math".into(),
            tags: vec![],
            input_schema: serde_json::json!({}),
            output_schema: None,
            implementation_type: toolgate_core::ImplementationType::PythonCallable,
            implementation_code: "m.f".into(),
            version: "1.0.0".into(),
            embedding: None,
            is_active: true,
            metadata: serde_json::json!({}),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let summary = ToolSummary::from(&tool);
        assert_eq!(summary.implementation_type, "PYTHON_CALLABLE");
    }

    #[test]
    fn unknown_prompt_name_returns_none() {
        assert!(prompt("does_not_exist").is_none());
        assert_eq!(prompt_names().len(), 3);
    }
}
