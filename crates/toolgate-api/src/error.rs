//! API error taxonomy with HTTP mapping.
//!
//! One enum implementing axum's `IntoResponse`, with `From` conversions from
//! every inner crate's error type: status+code+message, internal detail
//! logged at the conversion site before the sanitized body is built.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("tool '{name}' is inactive")]
    ToolInactive { name: String },

    #[error("tool '{name}' not found")]
    ToolNotFound {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("request timed out")]
    Timeout,

    #[error("internal error")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut suggestions = None;
        let (status, code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            ApiError::ToolInactive { name } => (
                StatusCode::BAD_REQUEST,
                "TOOL_INACTIVE",
                format!("tool '{name}' is inactive"),
            ),
            ApiError::ToolNotFound { name, suggestions: s } => {
                suggestions = Some(s.clone());
                (
                    StatusCode::NOT_FOUND,
                    "TOOL_NOT_FOUND",
                    format!("tool '{name}' not found"),
                )
            }
            ApiError::Validation(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", msg.clone())
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                msg.clone(),
            ),
            ApiError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "TIMEOUT",
                "request timed out".to_string(),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "an internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                suggestions,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<toolgate_core::CoreError> for ApiError {
    fn from(e: toolgate_core::CoreError) -> Self {
        use toolgate_core::CoreError;
        match e {
            CoreError::NameConflict(n) => ApiError::Conflict(format!("`{n}` already registered")),
            CoreError::NotFound(n) => ApiError::NotFound(n),
            CoreError::SchemaInvalid(msg) => ApiError::Validation(msg),
            CoreError::Inactive(n) => ApiError::ToolInactive { name: n },
            CoreError::Serialization(e) => ApiError::BadRequest(e.to_string()),
        }
    }
}

impl From<toolgate_persist::StoreError> for ApiError {
    fn from(e: toolgate_persist::StoreError) -> Self {
        use toolgate_persist::StoreError;
        match e {
            StoreError::NameConflict(n) => ApiError::Conflict(format!("`{n}` already registered")),
            StoreError::NotFound(n) => ApiError::NotFound(n),
            StoreError::SchemaInvalid(msg) => ApiError::Validation(msg),
            StoreError::DimensionMismatch { expected, got } => ApiError::Internal(format!(
                "embedding dimension mismatch: expected {expected}, got {got}"
            )),
            StoreError::Database(e) => ApiError::Internal(e.to_string()),
            StoreError::Migration(e) => ApiError::Internal(e.to_string()),
            StoreError::Serialization(e) => ApiError::BadRequest(e.to_string()),
            StoreError::Config(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<toolgate_embed::EmbeddingError> for ApiError {
    fn from(e: toolgate_embed::EmbeddingError) -> Self {
        ApiError::ServiceUnavailable(format!("embedding backend: {e}"))
    }
}

impl From<toolgate_retrieval::RetrievalError> for ApiError {
    fn from(e: toolgate_retrieval::RetrievalError) -> Self {
        use toolgate_retrieval::RetrievalError;
        match e {
            RetrievalError::Embedding(e) => ApiError::ServiceUnavailable(format!("embedding backend: {e}")),
            RetrievalError::Store(e) => e.into(),
            RetrievalError::InvalidQuery(msg) => ApiError::BadRequest(msg),
        }
    }
}

impl From<toolgate_exec::ExecError> for ApiError {
    fn from(e: toolgate_exec::ExecError) -> Self {
        use toolgate_exec::ExecError;
        match e {
            ExecError::ToolNotFound { name, suggestions } => {
                ApiError::ToolNotFound { name, suggestions }
            }
            ExecError::ToolInactive { name } => ApiError::ToolInactive { name },
            ExecError::ValidationFailed { tool, reason } => {
                ApiError::Validation(format!("{tool}: {reason}"))
            }
            ExecError::Timeout { .. } => ApiError::Timeout,
            ExecError::BackendUnavailable { tool, reason } => {
                ApiError::ServiceUnavailable(format!("{tool}: {reason}"))
            }
            ExecError::BackendError { tool, detail } => {
                ApiError::Internal(format!("{tool}: {detail}"))
            }
            ExecError::ExecutorDisabled { kind } => {
                ApiError::BadRequest(format!("the {kind} executor is disabled"))
            }
            ExecError::Store(e) => e.into(),
            ExecError::Serialization(e) => ApiError::BadRequest(e.to_string()),
        }
    }
}

impl From<toolgate_discovery::DiscoveryError> for ApiError {
    fn from(e: toolgate_discovery::DiscoveryError) -> Self {
        use toolgate_discovery::DiscoveryError;
        match e {
            DiscoveryError::Fetch { source, detail } => {
                ApiError::ServiceUnavailable(format!("discovery source '{source}': {detail}"))
            }
            DiscoveryError::Store(e) => e.into(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("JSON error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn not_found_maps_to_404() {
        let response = ApiError::NotFound("tool missing".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[test]
    fn tool_not_found_carries_suggestions() {
        let err = ApiError::ToolNotFound {
            name: "weathr".into(),
            suggestions: vec!["weather".into()],
        };
        assert!(matches!(err, ApiError::ToolNotFound { .. }));
    }
}
