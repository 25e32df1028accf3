use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("embedding backend returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("embedding shape mismatch: expected dimension {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("embedding count mismatch: sent {sent} inputs, received {received}")]
    CountMismatch { sent: usize, received: usize },

    #[error("embedding request timed out")]
    Timeout,

    #[error("unrecognized embedding response shape")]
    UnrecognizedShape,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl EmbeddingError {
    /// Transient errors are worth retrying; parse/shape errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EmbeddingError::Connection(_) | EmbeddingError::Timeout
        ) || matches!(self, EmbeddingError::Http { status, .. } if *status >= 500)
    }
}
