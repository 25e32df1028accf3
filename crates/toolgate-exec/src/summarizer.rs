//! Output summarizer: compresses a tool's output to fit a token budget,
//! falling back to truncation when the LLM gateway is unavailable or fails.

use serde_json::Value;
use tracing::warn;

use crate::config::ExecutorConfig;

const SYSTEM_PROMPT: &str = "Summarize the following tool output. Preserve key \
data, error messages, and identifiers. Never fabricate information not \
present in the input.";

pub struct OutputSummarizer<'a> {
    http: &'a reqwest::Client,
    config: &'a ExecutorConfig,
    enabled: bool,
}

impl<'a> OutputSummarizer<'a> {
    pub fn new(http: &'a reqwest::Client, config: &'a ExecutorConfig, enabled: bool) -> Self {
        Self {
            http,
            config,
            enabled,
        }
    }

    /// Returns `(text, was_summarized)`.
    pub async fn summarize_if_needed(
        &self,
        output: &Value,
        max_tokens: usize,
        hint: Option<&str>,
        tool_name: Option<&str>,
    ) -> (String, bool) {
        let serialized = serialize(output);
        let estimated_tokens = serialized.len() / 4;

        if !self.enabled || estimated_tokens <= max_tokens {
            return (serialized, false);
        }

        match self.call_gateway(&serialized, max_tokens, hint, tool_name).await {
            Ok(summary) => (summary, true),
            Err(e) => {
                warn!(error = %e, "summarizer gateway call failed, falling back to truncation");
                (truncate(&serialized, max_tokens), true)
            }
        }
    }

    async fn call_gateway(
        &self,
        content: &str,
        max_tokens: usize,
        hint: Option<&str>,
        tool_name: Option<&str>,
    ) -> Result<String, String> {
        let gateway_url = self
            .config
            .llm_gateway_url
            .as_ref()
            .ok_or_else(|| "no LLM gateway configured".to_string())?;

        let summary_max_tokens = (max_tokens / 2).max(500);
        let truncated_content: String = content
            .chars()
            .take(self.config.summarizer_max_input_chars)
            .collect();

        let mut user_prompt = String::new();
        if let Some(tool_name) = tool_name {
            user_prompt.push_str(&format!("Tool: {tool_name}\n"));
        }
        if let Some(hint) = hint {
            user_prompt.push_str(&format!("Hint: {hint}\n"));
        }
        user_prompt.push_str("Content:\n");
        user_prompt.push_str(&truncated_content);

        let body = serde_json::json!({
            "model": self.config.summarizer_model,
            "temperature": 0.1,
            "max_tokens": summary_max_tokens,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt},
            ],
        });

        let mut request = self
            .http
            .post(gateway_url)
            .timeout(self.config.summarizer_timeout)
            .json(&body);
        if !self.config.llm_gateway_api_key.is_empty() {
            request = request.bearer_auth(&self.config.llm_gateway_api_key);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        let body: Value = response.json().await.map_err(|e| e.to_string())?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| "unexpected gateway response shape".to_string())
    }
}

fn serialize(output: &Value) -> String {
    if output.is_string() {
        output.as_str().unwrap_or_default().to_string()
    } else {
        serde_json::to_string(output).unwrap_or_default()
    }
}

fn truncate(content: &str, max_tokens: usize) -> String {
    let max_chars = max_tokens * 4;
    if content.len() <= max_chars {
        return content.to_string();
    }
    let mut truncated: String = content.chars().take(max_chars).collect();
    truncated.push_str("\n[Output truncated due to length]");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_without_gateway() -> ExecutorConfig {
        ExecutorConfig {
            llm_gateway_url: None,
            ..ExecutorConfig::from_env()
        }
    }

    #[tokio::test]
    async fn short_output_is_not_summarized() {
        let http = reqwest::Client::new();
        let config = config_without_gateway();
        let summarizer = OutputSummarizer::new(&http, &config, true);

        let (text, was_summarized) = summarizer
            .summarize_if_needed(&serde_json::json!({"ok": true}), 1000, None, None)
            .await;

        assert!(!was_summarized);
        assert!(text.contains("ok"));
    }

    #[tokio::test]
    async fn falls_back_to_truncation_without_gateway() {
        let http = reqwest::Client::new();
        let config = config_without_gateway();
        let summarizer = OutputSummarizer::new(&http, &config, true);

        let long_output = Value::String("x".repeat(10_000));
        let (text, was_summarized) = summarizer
            .summarize_if_needed(&long_output, 10, None, None)
            .await;

        assert!(was_summarized);
        assert!(text.ends_with("[Output truncated due to length]"));
    }

    #[tokio::test]
    async fn disabled_flag_skips_summarization_entirely() {
        let http = reqwest::Client::new();
        let config = config_without_gateway();
        let summarizer = OutputSummarizer::new(&http, &config, false);

        let long_output = Value::String("x".repeat(10_000));
        let (_, was_summarized) = summarizer
            .summarize_if_needed(&long_output, 10, None, None)
            .await;

        assert!(!was_summarized);
    }
}
