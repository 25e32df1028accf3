//! Execution router tuning knobs, loaded from the environment.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Default per-call deadline when the tool has no override.
    pub default_timeout: Duration,
    /// Hard ceiling no per-tool override may exceed.
    pub max_timeout: Duration,
    /// Module path prefixes allowed for PYTHON_CALLABLE dispatch.
    pub python_allowed_prefixes: Vec<String>,
    /// Executable names allowed for COMMAND_LINE dispatch.
    pub command_allowed_executables: Vec<String>,
    /// Base URL for the LLM gateway used by LLM_GATEWAY tools and the
    /// output summarizer.
    pub llm_gateway_url: Option<String>,
    pub llm_gateway_api_key: String,
    /// Whether the PYTHON_CALLABLE backend is enabled at all.
    pub python_enabled: bool,
    /// Model name the output summarizer asks the LLM gateway for.
    pub summarizer_model: String,
    /// Maximum characters of tool output forwarded to the summarizer prompt.
    pub summarizer_max_input_chars: usize,
    /// Per-call deadline for the summarizer's gateway request.
    pub summarizer_timeout: Duration,
}

const DENY_LIST: &[&str] = &["os", "sys", "subprocess", "pickle", "importlib", "builtins"];

impl ExecutorConfig {
    pub fn from_env() -> Self {
        Self {
            default_timeout: Duration::from_millis(parse_env(
                "TOOLGATE_CALL_TIMEOUT_MS",
                30_000,
            )),
            max_timeout: Duration::from_millis(parse_env(
                "TOOLGATE_MAX_CALL_TIMEOUT_MS",
                120_000,
            )),
            python_allowed_prefixes: split_env("TOOLGATE_PYTHON_ALLOWED_PREFIXES"),
            command_allowed_executables: split_env("TOOLGATE_COMMAND_ALLOWED_EXECUTABLES"),
            llm_gateway_url: std::env::var("TOOLGATE_LLM_GATEWAY_URL").ok(),
            llm_gateway_api_key: std::env::var("TOOLGATE_LLM_GATEWAY_API_KEY").unwrap_or_default(),
            python_enabled: parse_env("TOOLGATE_PYTHON_ENABLED", true),
            summarizer_model: std::env::var("TOOLGATE_SUMMARIZER_MODEL")
                .unwrap_or_else(|_| "summarizer".to_string()),
            summarizer_max_input_chars: parse_env("TOOLGATE_SUMMARIZER_MAX_INPUT_CHARS", 20_000),
            summarizer_timeout: Duration::from_millis(parse_env(
                "TOOLGATE_SUMMARIZER_TIMEOUT_MS",
                10_000,
            )),
        }
    }

    /// Resolves the effective deadline for a tool, honoring a per-tool
    /// `metadata["timeout_ms"]` override capped at `max_timeout`.
    pub fn resolve_timeout(&self, tool_timeout_ms: Option<u64>) -> Duration {
        match tool_timeout_ms {
            Some(ms) => Duration::from_millis(ms).min(self.max_timeout),
            None => self.default_timeout,
        }
    }

    pub fn python_module_allowed(&self, module_path: &str) -> bool {
        let top_level = module_path.split('.').next().unwrap_or("");
        if DENY_LIST.contains(&top_level) {
            return false;
        }
        self.python_allowed_prefixes
            .iter()
            .any(|prefix| module_path.starts_with(prefix.as_str()))
    }

    pub fn command_allowed(&self, executable: &str) -> bool {
        self.command_allowed_executables
            .iter()
            .any(|allowed| allowed == executable)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn split_env(key: &str) -> Vec<String> {
    std::env::var(key)
        .ok()
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_list_always_wins_over_allow_list() {
        let config = ExecutorConfig {
            python_allowed_prefixes: vec!["os".to_string()],
            ..ExecutorConfig::from_env()
        };
        assert!(!config.python_module_allowed("os.path"));
    }

    #[test]
    fn allow_list_permits_matching_prefix() {
        let config = ExecutorConfig {
            python_allowed_prefixes: vec!["toolgate_tools".to_string()],
            ..ExecutorConfig::from_env()
        };
        assert!(config.python_module_allowed("toolgate_tools.weather.fetch"));
        assert!(!config.python_module_allowed("unrelated.module"));
    }
}
