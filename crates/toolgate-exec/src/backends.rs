//! The five execution backends dispatched by the router.
//! Each function owns one row of the dispatch table; `router.rs` picks the
//! right one by `ImplementationType` and wraps the call in a deadline.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

use toolgate_core::Tool;

use crate::config::ExecutorConfig;
use crate::error::ExecError;
use crate::mcp_rpc;
use crate::python_registry::PythonCallableRegistry;

pub async fn python_callable(
    config: &ExecutorConfig,
    registry: &PythonCallableRegistry,
    tool: &Tool,
    args: Value,
) -> Result<Value, ExecError> {
    if !config.python_enabled {
        return Err(ExecError::ExecutorDisabled {
            kind: "python".into(),
        });
    }

    let module_path = &tool.implementation_code;
    if !config.python_module_allowed(module_path) {
        return Err(ExecError::BackendUnavailable {
            tool: tool.name.clone(),
            reason: format!("module '{module_path}' is not allow-listed"),
        });
    }

    let callable = registry.get(module_path).ok_or_else(|| ExecError::BackendUnavailable {
        tool: tool.name.clone(),
        reason: format!("no callable registered for '{module_path}'"),
    })?;

    callable.call(args).await
}

#[derive(Debug, Deserialize)]
struct HttpEndpointConfig {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: std::collections::BTreeMap<String, String>,
}

fn default_method() -> String {
    "POST".to_string()
}

pub async fn http_endpoint(
    http: &reqwest::Client,
    tool: &Tool,
    args: Value,
    timeout: Duration,
) -> Result<Value, ExecError> {
    let cfg: HttpEndpointConfig = serde_json::from_str(&tool.implementation_code)?;
    let method = cfg.method.to_uppercase();

    let mut request = match method.as_str() {
        "GET" => http.get(&cfg.url).query(&flatten_query(&args)),
        "POST" => http.post(&cfg.url).json(&args),
        "PUT" => http.put(&cfg.url).json(&args),
        "PATCH" => http.patch(&cfg.url).json(&args),
        _ => {
            return Err(ExecError::BackendError {
                tool: tool.name.clone(),
                detail: format!("unsupported HTTP method '{method}'"),
            })
        }
    };

    for (key, value) in &cfg.headers {
        request = request.header(key, value);
    }

    let response = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| ExecError::BackendError {
            tool: tool.name.clone(),
            detail: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(ExecError::BackendError {
            tool: tool.name.clone(),
            detail: format!("HTTP {}", response.status()),
        });
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| ExecError::BackendError {
            tool: tool.name.clone(),
            detail: e.to_string(),
        })
}

fn flatten_query(args: &Value) -> Vec<(String, String)> {
    match args.as_object() {
        Some(map) => map
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect(),
        None => Vec::new(),
    }
}

#[derive(Debug, Deserialize)]
struct McpServerConfig {
    url: String,
    tool_name: String,
}

pub async fn mcp_server(
    http: &reqwest::Client,
    tool: &Tool,
    args: Value,
    timeout: Duration,
) -> Result<Value, ExecError> {
    let cfg: McpServerConfig = serde_json::from_str(&tool.implementation_code)?;
    mcp_rpc::call_tool(http, &cfg.url, &cfg.tool_name, args, timeout)
        .await
        .map_err(|e| ExecError::BackendError {
            tool: tool.name.clone(),
            detail: e.to_string(),
        })
}

#[derive(Debug, Deserialize)]
struct LlmGatewayConfig {
    model: String,
    #[serde(default)]
    system_prompt: Option<String>,
}

pub async fn llm_gateway(
    http: &reqwest::Client,
    config: &ExecutorConfig,
    tool: &Tool,
    args: Value,
    timeout: Duration,
) -> Result<Value, ExecError> {
    let cfg: LlmGatewayConfig = serde_json::from_str(&tool.implementation_code)?;
    let gateway_url = config
        .llm_gateway_url
        .as_ref()
        .ok_or_else(|| ExecError::BackendUnavailable {
            tool: tool.name.clone(),
            reason: "no LLM gateway configured".into(),
        })?;

    let mut messages = Vec::new();
    if let Some(system_prompt) = &cfg.system_prompt {
        messages.push(serde_json::json!({"role": "system", "content": system_prompt}));
    }
    messages.push(serde_json::json!({"role": "user", "content": args.to_string()}));

    let body = serde_json::json!({ "model": cfg.model, "messages": messages });
    let mut request = http.post(gateway_url).timeout(timeout).json(&body);
    if !config.llm_gateway_api_key.is_empty() {
        request = request.bearer_auth(&config.llm_gateway_api_key);
    }

    let response = request.send().await.map_err(|e| ExecError::BackendError {
        tool: tool.name.clone(),
        detail: e.to_string(),
    })?;

    if !response.status().is_success() {
        return Err(ExecError::BackendError {
            tool: tool.name.clone(),
            detail: format!("HTTP {}", response.status()),
        });
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| ExecError::BackendError {
            tool: tool.name.clone(),
            detail: e.to_string(),
        })
}

#[derive(Debug, Deserialize)]
struct CommandLineConfig {
    command: String,
    #[serde(default)]
    working_dir: Option<String>,
    #[serde(default)]
    env: std::collections::BTreeMap<String, String>,
}

const SHELL_METACHARACTERS: &[char] = &['|', '&', ';', '$', '>', '<', '`', '\\', '\n'];

pub async fn command_line(
    config: &ExecutorConfig,
    tool: &Tool,
    args: Value,
    timeout: Duration,
) -> Result<Value, ExecError> {
    let cfg: CommandLineConfig = serde_json::from_str(&tool.implementation_code)?;
    let template = substitute_template(&cfg.command, &args);

    let tokens = tokenize(&template).map_err(|e| ExecError::ValidationFailed {
        tool: tool.name.clone(),
        reason: e,
    })?;

    let executable = tokens.first().ok_or_else(|| ExecError::ValidationFailed {
        tool: tool.name.clone(),
        reason: "empty command template".into(),
    })?;

    if !config.command_allowed(executable) {
        return Err(ExecError::BackendUnavailable {
            tool: tool.name.clone(),
            reason: format!("executable '{executable}' is not allow-listed"),
        });
    }

    let mut command = Command::new(executable);
    command.args(&tokens[1..]);
    if let Some(dir) = &cfg.working_dir {
        command.current_dir(dir);
    }
    for (key, value) in &cfg.env {
        command.env(key, value);
    }
    command.kill_on_drop(true);

    let mut child = command
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| ExecError::BackendError {
            tool: tool.name.clone(),
            detail: e.to_string(),
        })?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| ExecError::Timeout {
            tool: tool.name.clone(),
            timeout_ms: timeout.as_millis() as u64,
        })?
        .map_err(|e| ExecError::BackendError {
            tool: tool.name.clone(),
            detail: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(ExecError::BackendError {
            tool: tool.name.clone(),
            detail: format!(
                "exit {}: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }

    Ok(Value::String(
        String::from_utf8_lossy(&output.stdout).trim().to_string(),
    ))
}

/// Substitutes `{key}` placeholders in the command template with the
/// matching value from `args`. No shell is involved; substitution is plain
/// string replacement before tokenization.
fn substitute_template(template: &str, args: &Value) -> String {
    let mut result = template.to_string();
    if let Some(map) = args.as_object() {
        for (key, value) in map {
            let placeholder = format!("{{{key}}}");
            let value_str = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            result = result.replace(&placeholder, &value_str);
        }
    }
    result
}

/// Whitespace tokenizer with double-quote support, no shell metacharacter
/// interpretation (`shell-words`-style splitting, without the dependency).
fn tokenize(input: &str) -> Result<Vec<String>, String> {
    if input.chars().any(|c| SHELL_METACHARACTERS.contains(&c)) {
        return Err("command contains disallowed shell metacharacters".into());
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    if in_quotes {
        return Err("unterminated quote in command template".into());
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_rejects_shell_metacharacters() {
        assert!(tokenize("echo $(whoami)").is_err());
    }

    #[test]
    fn tokenize_splits_on_whitespace_and_quotes() {
        let tokens = tokenize(r#"curl -X GET "http://example.com/x y""#).unwrap();
        assert_eq!(tokens, vec!["curl", "-X", "GET", "http://example.com/x y"]);
    }

    #[test]
    fn substitute_template_replaces_placeholders() {
        let template = "echo {message}";
        let out = substitute_template(template, &serde_json::json!({"message": "hi"}));
        assert_eq!(out, "echo hi");
    }

    fn sample_tool(implementation_type: toolgate_core::ImplementationType, implementation_code: &str) -> Tool {
        Tool {
            id: 1,
            name: "sample".into(),
            description: "a sample tool".into(),
            category: "test".into(),
            tags: vec![],
            input_schema: serde_json::json!({"type": "object"}),
            output_schema: None,
            implementation_type,
            implementation_code: implementation_code.to_string(),
            version: "1.0.0".into(),
            embedding: None,
            is_active: true,
            metadata: serde_json::json!({}),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn http_endpoint_get_maps_arguments_to_query_params() {
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("city", "lisbon"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"temp_c": 21})))
            .mount(&server)
            .await;

        let tool = sample_tool(
            toolgate_core::ImplementationType::HttpEndpoint,
            &serde_json::json!({"url": format!("{}/weather", server.uri()), "method": "GET"}).to_string(),
        );

        let http = reqwest::Client::new();
        let out = http_endpoint(&http, &tool, serde_json::json!({"city": "lisbon"}), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out, serde_json::json!({"temp_c": 21}));
    }

    #[tokio::test]
    async fn http_endpoint_post_sends_arguments_as_json_body() {
        use wiremock::matchers::{body_json, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/echo"))
            .and(body_json(serde_json::json!({"message": "hi"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let tool = sample_tool(
            toolgate_core::ImplementationType::HttpEndpoint,
            &serde_json::json!({"url": format!("{}/echo", server.uri()), "method": "POST"}).to_string(),
        );

        let http = reqwest::Client::new();
        let out = http_endpoint(&http, &tool, serde_json::json!({"message": "hi"}), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn mcp_server_backend_calls_through_to_the_upstream_tool() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"sum": 7},
            })))
            .mount(&server)
            .await;

        let tool = sample_tool(
            toolgate_core::ImplementationType::McpServer,
            &serde_json::json!({"url": format!("{}/mcp", server.uri()), "tool_name": "add"}).to_string(),
        );

        let http = reqwest::Client::new();
        let out = mcp_server(&http, &tool, serde_json::json!({"a": 3, "b": 4}), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out, serde_json::json!({"sum": 7}));
    }

    #[tokio::test]
    async fn command_line_rejects_executable_not_on_allow_list() {
        let config = ExecutorConfig {
            command_allowed_executables: vec!["echo".to_string()],
            ..ExecutorConfig::from_env()
        };
        let tool = sample_tool(
            toolgate_core::ImplementationType::CommandLine,
            &serde_json::json!({"command": "rm -rf /tmp/x"}).to_string(),
        );

        let err = command_line(&config, &tool, serde_json::json!({}), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::BackendUnavailable { .. }));
    }

    #[tokio::test]
    async fn command_line_runs_allow_listed_executable_and_captures_stdout() {
        let config = ExecutorConfig {
            command_allowed_executables: vec!["echo".to_string()],
            ..ExecutorConfig::from_env()
        };
        let tool = sample_tool(
            toolgate_core::ImplementationType::CommandLine,
            &serde_json::json!({"command": "echo {message}"}).to_string(),
        );

        let out = command_line(
            &config,
            &tool,
            serde_json::json!({"message": "hello-toolgate"}),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(out, serde_json::json!("hello-toolgate"));
    }
}
