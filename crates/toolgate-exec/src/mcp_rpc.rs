//! Minimal JSON-RPC 2.0 client over HTTP for calling tools on an upstream
//! MCP server (the `MCP_SERVER` backend). `JsonRpcRequest`/`JsonRpcResponse`
//! transported over a plain `reqwest::Client` POST rather than a persistent
//! WebSocket connection, since the execution-time call here is a single
//! request/response, not a long-lived session.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: String,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum McpRpcError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("remote error: {0}")]
    Remote(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

pub async fn call_tool(
    http: &reqwest::Client,
    url: &str,
    tool_name: &str,
    args: Value,
    timeout: std::time::Duration,
) -> Result<Value, McpRpcError> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0",
        method: "tools/call".to_string(),
        params: serde_json::json!({ "name": tool_name, "arguments": args }),
        id: 1,
    };

    let response = http
        .post(url)
        .timeout(timeout)
        .json(&request)
        .send()
        .await
        .map_err(|e| McpRpcError::Connection(e.to_string()))?;

    if !response.status().is_success() {
        return Err(McpRpcError::Connection(format!(
            "HTTP {}",
            response.status()
        )));
    }

    let body: JsonRpcResponse = response
        .json()
        .await
        .map_err(|e| McpRpcError::Malformed(e.to_string()))?;

    if let Some(error) = body.error {
        return Err(McpRpcError::Remote(error.message));
    }

    body.result
        .ok_or_else(|| McpRpcError::Malformed("missing result field".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn call_tool_returns_the_result_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"sum": 4},
            })))
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let result = call_tool(
            &http,
            &format!("{}/mcp", server.uri()),
            "add",
            serde_json::json!({"a": 2, "b": 2}),
            std::time::Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(result, serde_json::json!({"sum": 4}));
    }

    #[tokio::test]
    async fn call_tool_surfaces_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32000, "message": "tool crashed"},
            })))
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let err = call_tool(
            &http,
            &format!("{}/mcp", server.uri()),
            "add",
            serde_json::json!({}),
            std::time::Duration::from_secs(5),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, McpRpcError::Remote(msg) if msg == "tool crashed"));
    }
}
