use thiserror::Error;

/// Error kinds shared by components that operate directly on the data model,
/// before any storage- or network-specific error is layered on top.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("name conflict: `{0}` already registered")]
    NameConflict(String),

    #[error("schema invalid: {0}")]
    SchemaInvalid(String),

    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("tool `{0}` is inactive")]
    Inactive(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
