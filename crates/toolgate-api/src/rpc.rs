//! JSON-RPC 2.0 envelope and method dispatch for the MCP protocol facade.
//! Shared verbatim between the HTTP transport (`POST /mcp/rpc` in
//! `routes.rs`) and the stdio transport run by `toolgate-server` — both
//! just hand a deserialized `RpcRequest` to [`dispatch`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::mcp;
use crate::state::AppState;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id,
        }
    }

    fn err(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }
}

/// Builds a `parse error` response for a request body that isn't valid JSON
/// at all (so no `id` could be recovered).
pub fn parse_error_response(detail: impl std::fmt::Display) -> RpcResponse {
    RpcResponse::err(Value::Null, PARSE_ERROR, format!("parse error: {detail}"))
}

/// Dispatches one already-parsed JSON-RPC request against `state`. Never
/// returns `Err` — protocol and handler failures alike are encoded into the
/// response body per the JSON-RPC spec.
pub async fn dispatch(state: &AppState, req: RpcRequest) -> RpcResponse {
    let id = req.id.clone();
    match handle(state, &req).await {
        Ok(result) => RpcResponse::ok(id, result),
        Err(DispatchError::MethodNotFound) => RpcResponse::err(
            id,
            METHOD_NOT_FOUND,
            format!("method not found: {}", req.method),
        ),
        Err(DispatchError::InvalidParams(msg)) => RpcResponse::err(id, INVALID_PARAMS, msg),
        Err(DispatchError::Api(e)) => to_rpc_error(id, e),
    }
}

enum DispatchError {
    MethodNotFound,
    InvalidParams(String),
    Api(ApiError),
}

impl From<ApiError> for DispatchError {
    fn from(e: ApiError) -> Self {
        DispatchError::Api(e)
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: &Value) -> Result<T, DispatchError> {
    serde_json::from_value(params.clone())
        .map_err(|e| DispatchError::InvalidParams(format!("invalid params: {e}")))
}

async fn handle(state: &AppState, req: &RpcRequest) -> Result<Value, DispatchError> {
    match req.method.as_str() {
        "initialize" => Ok(serde_json::json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": { "name": "toolgate", "version": env!("CARGO_PKG_VERSION") },
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "listChanged": false },
                "prompts": { "listChanged": false },
            },
        })),

        "tools/list" => {
            let params: mcp::ListToolsParams = if req.params.is_null() {
                mcp::ListToolsParams {
                    category: None,
                    active_only: true,
                    limit: 50,
                    offset: 0,
                }
            } else {
                parse_params(&req.params)?
            };
            let result = mcp::list_tools(state, params).await?;
            Ok(serde_json::to_value(result).expect("ListToolsResult always serializes"))
        }

        "tools/find" => {
            let params: mcp::FindToolParams = parse_params(&req.params)?;
            let result = mcp::find_tool(state, params).await?;
            Ok(serde_json::to_value(result).expect("FindToolResult always serializes"))
        }

        "tools/call" => {
            let params: mcp::CallToolParams = parse_params(&req.params)?;
            let result = mcp::call_tool(state, params).await?;
            Ok(serde_json::to_value(result).expect("CallToolResult always serializes"))
        }

        "tools/call_summarized" => {
            let params: mcp::CallToolSummarizedParams = parse_params(&req.params)?;
            let result = mcp::call_tool_summarized(state, params).await?;
            Ok(serde_json::to_value(result).expect("CallToolSummarizedResult always serializes"))
        }

        "tools/schema" => {
            #[derive(Deserialize)]
            struct SchemaParams {
                name: String,
            }
            let params: SchemaParams = parse_params(&req.params)?;
            let result = mcp::get_tool_schema(state, &params.name).await?;
            Ok(serde_json::to_value(result).expect("ToolSchemaResult always serializes"))
        }

        "resources/list" => Ok(serde_json::json!({
            "resources": [
                { "uri": "tools://categories", "name": "categories", "mimeType": "application/json" },
                { "uri": "tools://stats", "name": "stats", "mimeType": "application/json" },
                { "uri": "tools://tools/{category}", "name": "tools-by-category", "mimeType": "application/json" },
            ]
        })),

        "resources/read" => {
            #[derive(Deserialize)]
            struct ReadParams {
                uri: String,
            }
            let params: ReadParams = parse_params(&req.params)?;
            let contents = read_resource(state, &params.uri).await?;
            Ok(serde_json::json!({
                "contents": [{ "uri": params.uri, "mimeType": "application/json", "text": contents.to_string() }]
            }))
        }

        "prompts/list" => Ok(serde_json::json!({
            "prompts": mcp::prompt_names()
                .into_iter()
                .map(|name| serde_json::json!({ "name": name }))
                .collect::<Vec<_>>()
        })),

        "prompts/get" => {
            #[derive(Deserialize)]
            struct PromptParams {
                name: String,
            }
            let params: PromptParams = parse_params(&req.params)?;
            let text = mcp::prompt(&params.name).ok_or(DispatchError::MethodNotFound)?;
            Ok(serde_json::json!({
                "messages": [{ "role": "system", "content": { "type": "text", "text": text } }]
            }))
        }

        _ => Err(DispatchError::MethodNotFound),
    }
}

async fn read_resource(state: &AppState, uri: &str) -> Result<Value, DispatchError> {
    if uri == "tools://categories" {
        return Ok(mcp::resource_categories(state).await?);
    }
    if uri == "tools://stats" {
        return Ok(mcp::resource_stats(state).await?);
    }
    if let Some(category) = uri.strip_prefix("tools://tools/") {
        return Ok(mcp::resource_tools_by_category(state, category).await?);
    }
    Err(DispatchError::InvalidParams(format!(
        "unknown resource uri: {uri}"
    )))
}

fn to_rpc_error(id: Value, e: ApiError) -> RpcResponse {
    let (code, message, data) = match &e {
        ApiError::NotFound(_) | ApiError::ToolNotFound { .. } => {
            let data = if let ApiError::ToolNotFound { suggestions, .. } = &e {
                Some(serde_json::json!({ "suggestions": suggestions }))
            } else {
                None
            };
            (INVALID_PARAMS, e.to_string(), data)
        }
        ApiError::BadRequest(_) | ApiError::Validation(_) => (INVALID_PARAMS, e.to_string(), None),
        _ => (INTERNAL_ERROR, e.to_string(), None),
    };
    RpcResponse {
        jsonrpc: "2.0",
        result: None,
        error: Some(RpcError { code, message, data }),
        id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_response_has_null_id() {
        let resp = parse_error_response("unexpected end of input");
        assert_eq!(resp.id, Value::Null);
        assert_eq!(resp.error.unwrap().code, PARSE_ERROR);
    }
}
