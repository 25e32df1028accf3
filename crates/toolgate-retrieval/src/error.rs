use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding request failed: {0}")]
    Embedding(#[from] toolgate_embed::EmbeddingError),
    #[error("storage error: {0}")]
    Store(#[from] toolgate_persist::StoreError),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}
