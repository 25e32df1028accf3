//! Retrieval engine tuning knobs.

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Weight given to the semantic score in hybrid blending (0.0-1.0).
    pub alpha: f32,
    /// Minimum semantic similarity a result must clear to be returned.
    pub min_similarity: f32,
    /// Default result count when the caller doesn't specify a limit.
    pub default_limit: i64,
    /// Hard ceiling on the result count regardless of caller request.
    pub max_limit: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            alpha: 0.7,
            min_similarity: 0.5,
            default_limit: 10,
            max_limit: 100,
        }
    }
}

impl RetrievalConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            alpha: parse_env("TOOLGATE_RETRIEVAL_ALPHA", defaults.alpha),
            min_similarity: parse_env("TOOLGATE_RETRIEVAL_MIN_SIMILARITY", defaults.min_similarity),
            default_limit: parse_env("TOOLGATE_RETRIEVAL_DEFAULT_LIMIT", defaults.default_limit),
            max_limit: parse_env("TOOLGATE_RETRIEVAL_MAX_LIMIT", defaults.max_limit),
        }
    }

    pub fn clamp_limit(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
