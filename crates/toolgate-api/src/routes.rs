//! HTTP surface for the tool registry and discovery gateway: the `/mcp/*`
//! facade agents call to discover and invoke tools, the `/admin/*` CRUD
//! surface for catalog maintenance, and health/metrics probes. One
//! `Router<AppState>` assembled from small per-concern handlers, admin
//! routes gated by a `route_layer`.

use axum::{
    extract::{Path, Query, State},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::OpenApi;

use toolgate_core::{NewTool, ToolPatch};
use toolgate_persist::ListFilter;

use crate::error::{ApiError, ApiResult};
use crate::mcp;
use crate::middleware::admin_auth_middleware;
use crate::rpc::{self, RpcRequest};
use crate::state::AppState;

pub fn api_router(state: AppState) -> Router {
    let mcp_routes = Router::new()
        .route("/mcp/list_tools", post(list_tools_handler))
        .route("/mcp/find_tool", post(find_tool_handler))
        .route("/mcp/call_tool", post(call_tool_handler))
        .route(
            "/mcp/call_tool_summarized",
            post(call_tool_summarized_handler),
        )
        .route("/mcp/tool_schema/{name}", get(tool_schema_handler))
        .route("/mcp/rpc", post(rpc_handler))
        .route("/mcp/resources/categories", get(resource_categories_handler))
        .route("/mcp/resources/stats", get(resource_stats_handler))
        .route(
            "/mcp/resources/tools/{category}",
            get(resource_tools_by_category_handler),
        )
        .route("/mcp/prompts/{name}", get(prompt_handler));

    let admin_routes = Router::new()
        .route("/admin/tools", post(register_tool).get(list_tools_admin))
        .route(
            "/admin/tools/{id}",
            get(get_tool).put(update_tool).delete(delete_tool),
        )
        .route("/admin/tools/{id}/activate", post(activate_tool))
        .route("/admin/tools/{id}/deactivate", post(deactivate_tool))
        .route("/admin/tools/{id}/reindex", post(reindex_tool))
        .route("/admin/mcp/sync", post(sync_discovery))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ));

    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/live", get(live))
        .route("/metrics", get(metrics))
        .route("/admin/openapi.json", get(openapi_json));

    Router::new()
        .merge(mcp_routes)
        .merge(admin_routes)
        .merge(public_routes)
        .with_state(state)
}

// ---- /mcp/* handlers ----

async fn list_tools_handler(
    State(state): State<AppState>,
    Json(params): Json<mcp::ListToolsParams>,
) -> ApiResult<Json<mcp::ListToolsResult>> {
    Ok(Json(mcp::list_tools(&state, params).await?))
}

async fn find_tool_handler(
    State(state): State<AppState>,
    Json(params): Json<mcp::FindToolParams>,
) -> ApiResult<Json<mcp::FindToolResult>> {
    Ok(Json(mcp::find_tool(&state, params).await?))
}

async fn call_tool_handler(
    State(state): State<AppState>,
    Json(params): Json<mcp::CallToolParams>,
) -> ApiResult<Json<mcp::CallToolResult>> {
    Ok(Json(mcp::call_tool(&state, params).await?))
}

async fn call_tool_summarized_handler(
    State(state): State<AppState>,
    Json(params): Json<mcp::CallToolSummarizedParams>,
) -> ApiResult<Json<mcp::CallToolSummarizedResult>> {
    Ok(Json(mcp::call_tool_summarized(&state, params).await?))
}

async fn tool_schema_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<mcp::ToolSchemaResult>> {
    Ok(Json(mcp::get_tool_schema(&state, &name).await?))
}

async fn resource_categories_handler(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    Ok(Json(mcp::resource_categories(&state).await?))
}

async fn resource_stats_handler(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    Ok(Json(mcp::resource_stats(&state).await?))
}

async fn resource_tools_by_category_handler(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    Ok(Json(mcp::resource_tools_by_category(&state, &category).await?))
}

async fn prompt_handler(Path(name): Path<String>) -> ApiResult<Json<serde_json::Value>> {
    let text = mcp::prompt(&name).ok_or_else(|| ApiError::NotFound(format!("no such prompt `{name}`")))?;
    Ok(Json(json!({ "name": name, "template": text })))
}

/// JSON-RPC 2.0 entry point mirroring the stdio transport run by the
/// server binary, so an agent that prefers HTTP can speak the same
/// `tools/list`, `tools/call`, `resources/read`, `prompts/get` envelope.
async fn rpc_handler(State(state): State<AppState>, body: axum::body::Bytes) -> Response {
    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return Json(rpc::parse_error_response(e)).into_response(),
    };
    Json(rpc::dispatch(&state, request).await).into_response()
}

// ---- /admin/tools/* handlers ----

async fn register_tool(
    State(state): State<AppState>,
    Json(new_tool): Json<NewTool>,
) -> ApiResult<Json<toolgate_core::Tool>> {
    toolgate_core::Tool::validate_name(&new_tool.name).map_err(ApiError::from)?;
    toolgate_core::Tool::validate_tags(&new_tool.tags).map_err(ApiError::from)?;
    toolgate_core::Tool::validate_schema(&new_tool.input_schema).map_err(ApiError::from)?;

    let auto_embed = new_tool.auto_embed;
    let tool = state.registry().register(new_tool).await?;

    if auto_embed {
        if let Err(e) = state.embed_and_store(&tool).await {
            // No partial commits: a failed embed on an auto_embed registration
            // rolls the row back rather than leaving an unsearchable tool.
            let _ = state.registry().delete(tool.id).await;
            return Err(e);
        }
    }

    Ok(Json(tool))
}

#[derive(Debug, Deserialize)]
struct ListToolsQuery {
    category: Option<String>,
    #[serde(default)]
    active_only: Option<bool>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

async fn list_tools_admin(
    State(state): State<AppState>,
    Query(q): Query<ListToolsQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let (tools, total) = state
        .registry()
        .list(ListFilter {
            category: q.category,
            active_only: q.active_only.unwrap_or(false),
            limit: q.limit.unwrap_or(50).clamp(1, 500),
            offset: q.offset.unwrap_or(0).max(0),
        })
        .await?;
    Ok(Json(json!({ "tools": tools, "total": total })))
}

async fn get_tool(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<toolgate_core::Tool>> {
    let tool = state
        .registry()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("tool {id} not found")))?;
    Ok(Json(tool))
}

async fn update_tool(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<ToolPatch>,
) -> ApiResult<Json<toolgate_core::Tool>> {
    if let Some(name) = &patch.name {
        toolgate_core::Tool::validate_name(name).map_err(ApiError::from)?;
    }
    if let Some(tags) = &patch.tags {
        toolgate_core::Tool::validate_tags(tags).map_err(ApiError::from)?;
    }
    if let Some(schema) = &patch.input_schema {
        toolgate_core::Tool::validate_schema(schema).map_err(ApiError::from)?;
    }

    let needs_reembed = patch.touches_embedding_text();
    let tool = state.registry().update(id, patch).await?;

    if needs_reembed {
        if let Err(e) = state.embed_and_store(&tool).await {
            tracing::warn!(tool_id = id, error = %e, "re-embed after update failed, stale vector retained until /reindex");
        }
    }

    Ok(Json(tool))
}

async fn delete_tool(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<serde_json::Value>> {
    state.registry().delete(id).await?;
    Ok(Json(json!({ "deleted": id })))
}

async fn activate_tool(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<toolgate_core::Tool>> {
    Ok(Json(state.registry().activate(id).await?))
}

async fn deactivate_tool(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<toolgate_core::Tool>> {
    Ok(Json(state.registry().deactivate(id).await?))
}

/// Regenerates a tool's embedding. Unlike a patch-triggered re-embed, a
/// failure here is reported to the caller — the whole point of calling this
/// endpoint is to fix a stale or missing vector.
async fn reindex_tool(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let tool = state
        .registry()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("tool {id} not found")))?;
    state.registry().reindex(id).await?;
    state.embed_and_store(&tool).await?;
    Ok(Json(json!({ "reindexed": id })))
}

#[derive(Debug, Deserialize, Default)]
struct SyncRequest {
    source: Option<String>,
}

async fn sync_discovery(
    State(state): State<AppState>,
    body: Option<Json<SyncRequest>>,
) -> ApiResult<Json<serde_json::Value>> {
    let discovery = state
        .discovery()
        .ok_or_else(|| ApiError::ServiceUnavailable("no discovery sources configured".into()))?;

    let req = body.map(|Json(b)| b).unwrap_or_default();
    let report = match req.source {
        Some(name) => discovery
            .sync_source(&name)
            .await
            .ok_or_else(|| ApiError::NotFound(format!("no discovery source named `{name}`")))?,
        None => discovery.sync_all().await,
    };

    Ok(Json(serde_json::to_value(report)?))
}

// ---- health/metrics/docs ----

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn ready(State(state): State<AppState>) -> Response {
    if state.registry().is_healthy().await {
        Json(json!({ "status": "ready" })).into_response()
    } else {
        (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready" })),
        )
            .into_response()
    }
}

async fn live() -> Json<serde_json::Value> {
    Json(json!({ "status": "alive" }))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics_handle() {
        Some(handle) => handle.render().into_response(),
        None => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "metrics are disabled",
        )
            .into_response(),
    }
}

#[derive(utoipa::OpenApi)]
#[openapi(info(
    title = "Toolgate API",
    description = "Tool registry and discovery gateway for LLM agents",
    version = env!("CARGO_PKG_VERSION")
))]
struct ApiDoc;

async fn openapi_json() -> Json<serde_json::Value> {
    Json(serde_json::to_value(ApiDoc::openapi()).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_doc_serializes() {
        let value = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert_eq!(value["info"]["title"], "Toolgate API");
    }
}
