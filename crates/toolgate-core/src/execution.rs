use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only audit row. References a tool by id but carries its own
/// `tool_name` copy so history survives tool deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecution {
    pub id: i64,
    pub tool_id: i64,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub status: ExecutionStatus,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Success,
    Error,
    Timeout,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Error => "ERROR",
            ExecutionStatus::Timeout => "TIMEOUT",
        }
    }
}

/// Fields needed to record a `ToolExecution`; `id` and `started_at` are
/// assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewToolExecution {
    pub tool_id: i64,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub status: ExecutionStatus,
    pub error_message: Option<String>,
    pub duration_ms: i64,
}
