//! Fetches a source's tool list via MCP JSON-RPC (`tools/list`) with bounded
//! exponential backoff. Same JSON-RPC envelope and backoff-with-jitter shape
//! as `toolgate-embed/src/client.rs`'s `HttpEmbeddingClient`, duplicated
//! rather than shared as a library function, since the two call sites
//! differ in response shape and neither crate depends on the other.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::DiscoveryError;

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: &'static str,
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

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", alias = "input_schema", default = "default_schema")]
    pub input_schema: Value,
}

fn default_schema() -> Value {
    serde_json::json!({"type": "object"})
}

fn is_retryable(err: &str) -> bool {
    err.contains("connection") || err.contains("timed out") || err.contains("HTTP 5")
}

pub async fn fetch_tools(
    http: &reqwest::Client,
    source_name: &str,
    url: &str,
    timeout_ms: u64,
    max_retries: u32,
) -> Result<Vec<RemoteTool>, DiscoveryError> {
    let timeout = std::time::Duration::from_millis(timeout_ms);
    let mut attempt = 0;

    loop {
        match fetch_once(http, url, timeout).await {
            Ok(tools) => return Ok(tools),
            Err(e) if is_retryable(&e) && attempt < max_retries => {
                let base_ms = 200u64 * 2u64.pow(attempt);
                let jitter_ms = rand::thread_rng().gen_range(0..=base_ms / 2 + 1);
                let delay = std::time::Duration::from_millis(base_ms + jitter_ms)
                    .min(std::time::Duration::from_secs(10));
                warn!(url, attempt, error = %e, "retrying discovery fetch");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(detail) => {
                return Err(DiscoveryError::Fetch {
                    source: source_name.to_string(),
                    detail,
                })
            }
        }
    }
}

async fn fetch_once(
    http: &reqwest::Client,
    url: &str,
    timeout: std::time::Duration,
) -> Result<Vec<RemoteTool>, String> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0",
        method: "tools/list",
        params: Value::Null,
        id: 1,
    };

    let response = http
        .post(url)
        .timeout(timeout)
        .json(&request)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                "timed out".to_string()
            } else {
                format!("connection error: {e}")
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {status}"));
    }

    let body: JsonRpcResponse = response.json().await.map_err(|e| e.to_string())?;
    if let Some(error) = body.error {
        return Err(error.message);
    }

    let result = body.result.ok_or_else(|| "missing result field".to_string())?;
    let tools = result
        .get("tools")
        .cloned()
        .unwrap_or(Value::Array(Vec::new()));

    serde_json::from_value(tools).map_err(|e| format!("malformed tool list: {e}"))
}
