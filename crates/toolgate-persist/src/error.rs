use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("name conflict: `{0}` already registered")]
    NameConflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("schema invalid: {0}")]
    SchemaInvalid(String),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl From<toolgate_core::CoreError> for StoreError {
    fn from(e: toolgate_core::CoreError) -> Self {
        match e {
            toolgate_core::CoreError::NameConflict(n) => StoreError::NameConflict(n),
            toolgate_core::CoreError::NotFound(n) => StoreError::NotFound(n),
            toolgate_core::CoreError::SchemaInvalid(s) => StoreError::SchemaInvalid(s),
            toolgate_core::CoreError::Inactive(n) => {
                StoreError::SchemaInvalid(format!("tool `{n}` is inactive"))
            }
            toolgate_core::CoreError::Serialization(e) => StoreError::Serialization(e),
        }
    }
}
