use std::time::Duration;

use crate::error::EmbeddingError;

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub endpoint_url: String,
    pub api_key: String,
    pub model: String,
    /// The registry-wide configured dimension, the single source of truth.
    /// Every vector produced by this client is validated against it.
    pub dimension: usize,
    pub timeout: Duration,
    pub max_retries: u32,
    pub cache_capacity: usize,
}

impl EmbeddingConfig {
    pub fn from_env() -> Result<Self, EmbeddingError> {
        let endpoint_url = require_env("TOOLGATE_EMBEDDING_URL")?;
        let api_key = std::env::var("TOOLGATE_EMBEDDING_API_KEY").unwrap_or_default();
        let model = std::env::var("TOOLGATE_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());
        let dimension = parse_env("TOOLGATE_EMBEDDING_DIMENSION", 1536)?;
        let timeout_secs = parse_env("TOOLGATE_EMBEDDING_TIMEOUT_SECS", 10)?;
        let max_retries = parse_env("TOOLGATE_EMBEDDING_MAX_RETRIES", 3)?;
        let cache_capacity = parse_env("TOOLGATE_EMBEDDING_CACHE_CAPACITY", 1024)?;

        if dimension == 0 {
            return Err(EmbeddingError::Config(
                "TOOLGATE_EMBEDDING_DIMENSION must be > 0".into(),
            ));
        }
        if endpoint_url.parse::<reqwest::Url>().is_err() {
            return Err(EmbeddingError::Config(
                "TOOLGATE_EMBEDDING_URL must be a valid URL".into(),
            ));
        }

        Ok(Self {
            endpoint_url,
            api_key,
            model,
            dimension,
            timeout: Duration::from_secs(timeout_secs),
            max_retries,
            cache_capacity,
        })
    }
}

fn require_env(key: &str) -> Result<String, EmbeddingError> {
    std::env::var(key).map_err(|_| EmbeddingError::Config(format!("{key} must be set")))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, EmbeddingError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| EmbeddingError::Config(format!("{key} is not a valid value"))),
        Err(_) => Ok(default),
    }
}
