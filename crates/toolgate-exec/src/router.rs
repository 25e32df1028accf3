//! The execution router: resolves a tool by name, validates arguments,
//! dispatches to the right backend under a deadline, and records a
//! `ToolExecution` audit row. Deadline/cancellation wrapping
//! (`tokio::time::timeout` around each dispatch) wraps the whole call,
//! including the audit write.

use std::sync::Arc;
use std::time::Instant;

use jsonschema::JSONSchema;
use serde_json::Value;
use tracing::{info, warn};

use toolgate_core::{ExecutionStatus, ImplementationType, NewToolExecution, Tool};
use toolgate_persist::ToolRegistry;

use crate::backends;
use crate::config::ExecutorConfig;
use crate::error::ExecError;
use crate::fuzzy;
use crate::python_registry::PythonCallableRegistry;
use crate::summarizer::OutputSummarizer;

pub struct ExecutionRouter {
    registry: Arc<dyn ToolRegistry>,
    http: reqwest::Client,
    config: ExecutorConfig,
    python_registry: PythonCallableRegistry,
    summarizer_enabled: bool,
}

pub struct CallOutcome {
    pub output: Value,
    pub duration_ms: i64,
}

impl ExecutionRouter {
    pub fn new(
        registry: Arc<dyn ToolRegistry>,
        http: reqwest::Client,
        config: ExecutorConfig,
        python_registry: PythonCallableRegistry,
        summarizer_enabled: bool,
    ) -> Self {
        Self {
            registry,
            http,
            config,
            python_registry,
            summarizer_enabled,
        }
    }

    pub async fn call_tool(&self, name: &str, args: Value) -> Result<CallOutcome, ExecError> {
        let tool = self.resolve(name).await?;
        self.dispatch(&tool, args).await
    }

    pub async fn call_tool_summarized(
        &self,
        name: &str,
        args: Value,
        max_tokens: usize,
        hint: Option<&str>,
    ) -> Result<(String, bool), ExecError> {
        let tool = self.resolve(name).await?;
        let outcome = self.dispatch(&tool, args).await?;

        let summarizer = OutputSummarizer::new(&self.http, &self.config, self.summarizer_enabled);
        let (text, was_summarized) = summarizer
            .summarize_if_needed(&outcome.output, max_tokens, hint, Some(&tool.name))
            .await;
        Ok((text, was_summarized))
    }

    async fn resolve(&self, name: &str) -> Result<Tool, ExecError> {
        match self.registry.get_by_name(name).await? {
            Some(tool) if tool.is_active => Ok(tool),
            Some(_) => Err(ExecError::ToolInactive { name: name.into() }),
            None => {
                let candidates = self.registry.active_names().await.unwrap_or_default();
                let suggestions = fuzzy::suggest(name, &candidates, 3);
                Err(ExecError::not_found(name, suggestions))
            }
        }
    }

    async fn dispatch(&self, tool: &Tool, args: Value) -> Result<CallOutcome, ExecError> {
        validate_args(tool, &args)?;

        let timeout_ms = tool
            .metadata
            .get("timeout_ms")
            .and_then(Value::as_u64);
        let timeout = self.config.resolve_timeout(timeout_ms);

        let started = Instant::now();
        let result = tokio::time::timeout(timeout, self.run_backend(tool, args.clone())).await;

        let (status, output, error_message) = match result {
            Ok(Ok(output)) => (ExecutionStatus::Success, Some(output.clone()), None),
            Ok(Err(e)) => (ExecutionStatus::Error, None, Some(e.to_string())),
            Err(_) => (
                ExecutionStatus::Timeout,
                None,
                Some(format!("timed out after {}ms", timeout.as_millis())),
            ),
        };

        let duration_ms = started.elapsed().as_millis() as i64;

        if let Err(e) = self
            .registry
            .record_execution(NewToolExecution {
                tool_id: tool.id,
                tool_name: tool.name.clone(),
                arguments: args,
                output: output.clone(),
                status,
                error_message: error_message.clone(),
                duration_ms,
            })
            .await
        {
            warn!(error = %e, tool = %tool.name, "failed to record tool execution");
        }

        match (status, output) {
            (ExecutionStatus::Success, Some(output)) => {
                info!(tool = %tool.name, duration_ms, "tool call succeeded");
                Ok(CallOutcome { output, duration_ms })
            }
            (ExecutionStatus::Timeout, _) => Err(ExecError::Timeout {
                tool: tool.name.clone(),
                timeout_ms: timeout.as_millis() as u64,
            }),
            _ => Err(ExecError::BackendError {
                tool: tool.name.clone(),
                detail: error_message.unwrap_or_else(|| "unknown error".into()),
            }),
        }
    }

    async fn run_backend(&self, tool: &Tool, args: Value) -> Result<Value, ExecError> {
        let timeout_ms = tool.metadata.get("timeout_ms").and_then(Value::as_u64);
        let timeout = self.config.resolve_timeout(timeout_ms);

        match tool.implementation_type {
            ImplementationType::PythonCallable => {
                backends::python_callable(&self.config, &self.python_registry, tool, args).await
            }
            ImplementationType::HttpEndpoint => {
                backends::http_endpoint(&self.http, tool, args, timeout).await
            }
            ImplementationType::McpServer => {
                backends::mcp_server(&self.http, tool, args, timeout).await
            }
            ImplementationType::LlmGateway => {
                backends::llm_gateway(&self.http, &self.config, tool, args, timeout).await
            }
            ImplementationType::CommandLine => {
                backends::command_line(&self.config, tool, args, timeout).await
            }
        }
    }
}

fn validate_args(tool: &Tool, args: &Value) -> Result<(), ExecError> {
    let schema = JSONSchema::compile(&tool.input_schema).map_err(|e| ExecError::ValidationFailed {
        tool: tool.name.clone(),
        reason: format!("tool has an invalid input_schema: {e}"),
    })?;

    if let Err(errors) = schema.validate(args) {
        let reason = errors
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ExecError::ValidationFailed {
            tool: tool.name.clone(),
            reason,
        });
    }

    Ok(())
}
