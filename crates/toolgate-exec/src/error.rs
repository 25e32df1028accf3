//! Execution error taxonomy: precise named variants, a sanitized message on
//! each (no raw arguments), and an `is_retryable()` helper for callers that
//! want to distinguish transient from permanent failure.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("tool '{name}' not found")]
    ToolNotFound {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("tool '{name}' is inactive")]
    ToolInactive { name: String },

    #[error("validation failed for '{tool}': {reason}")]
    ValidationFailed { tool: String, reason: String },

    #[error("tool '{tool}' timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },

    #[error("backend for '{tool}' is unavailable: {reason}")]
    BackendUnavailable { tool: String, reason: String },

    #[error("backend error executing '{tool}': {detail}")]
    BackendError { tool: String, detail: String },

    #[error("the {kind} executor is disabled")]
    ExecutorDisabled { kind: String },

    #[error("registry error: {0}")]
    Store(#[from] toolgate_persist::StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ExecError {
    pub fn not_found(name: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self::ToolNotFound {
            name: name.into(),
            suggestions,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::BackendUnavailable { .. }
        )
    }
}
