//! Discovery source configuration, loaded the way the rest
//! of the workspace loads config: a `from_env` constructor plus validation
//! at boot, following `toolgate-embed/src/config.rs`'s style.

use serde::Deserialize;
use toolgate_core::ImplementationType;

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub default_category: Option<String>,
    #[serde(default)]
    pub default_tags: Vec<String>,
    #[serde(default = "default_kind")]
    pub kind: SourceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    McpServer,
    LlmGateway,
}

fn default_kind() -> SourceKind {
    SourceKind::McpServer
}

impl SourceKind {
    pub fn implementation_type(self) -> ImplementationType {
        match self {
            SourceKind::McpServer => ImplementationType::McpServer,
            SourceKind::LlmGateway => ImplementationType::LlmGateway,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryConfig {
    pub sources: Vec<SourceConfig>,
    pub fetch_timeout_ms: u64,
    pub max_retries: u32,
}

impl DiscoveryConfig {
    /// Reads `TOOLGATE_MCP_SOURCES` as a JSON array of [`SourceConfig`].
    /// Absent or unparseable returns an empty source list rather than
    /// failing boot — discovery is optional infrastructure.
    pub fn from_env() -> Self {
        let sources = std::env::var("TOOLGATE_MCP_SOURCES")
            .ok()
            .and_then(|raw| serde_json::from_str::<Vec<SourceConfig>>(&raw).ok())
            .unwrap_or_default();

        Self {
            sources,
            fetch_timeout_ms: parse_env("TOOLGATE_DISCOVERY_FETCH_TIMEOUT_MS", 30_000),
            max_retries: parse_env("TOOLGATE_DISCOVERY_MAX_RETRIES", 3),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
