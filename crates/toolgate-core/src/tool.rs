use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// How a tool's `implementation_code` is dispatched by the execution router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImplementationType {
    PythonCallable,
    HttpEndpoint,
    McpServer,
    LlmGateway,
    CommandLine,
}

impl ImplementationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImplementationType::PythonCallable => "PYTHON_CALLABLE",
            ImplementationType::HttpEndpoint => "HTTP_ENDPOINT",
            ImplementationType::McpServer => "MCP_SERVER",
            ImplementationType::LlmGateway => "LLM_GATEWAY",
            ImplementationType::CommandLine => "COMMAND_LINE",
        }
    }
}

impl std::str::FromStr for ImplementationType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PYTHON_CALLABLE" => Ok(Self::PythonCallable),
            "HTTP_ENDPOINT" => Ok(Self::HttpEndpoint),
            "MCP_SERVER" => Ok(Self::McpServer),
            "LLM_GATEWAY" => Ok(Self::LlmGateway),
            "COMMAND_LINE" => Ok(Self::CommandLine),
            other => Err(CoreError::SchemaInvalid(format!(
                "unknown implementation_type `{other}`"
            ))),
        }
    }
}

/// The registry's primary entity: a callable capability with JSON-Schema-described
/// arguments, routing info for the execution router, and an optional embedding
/// vector used for semantic retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub input_schema: serde_json::Value,
    pub output_schema: Option<serde_json::Value>,
    pub implementation_type: ImplementationType,
    pub implementation_code: String,
    pub version: String,
    pub embedding: Option<Vec<f32>>,
    pub is_active: bool,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted on registration, before the registry assigns `id` and
/// timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTool {
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub input_schema: serde_json::Value,
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
    pub implementation_type: ImplementationType,
    pub implementation_code: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default = "default_true")]
    pub auto_embed: bool,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_true() -> bool {
    true
}

/// A sparse patch applied by `update`. `None` leaves the field untouched;
/// fields that participate in the embedding text (name, description,
/// category, tags) trigger a re-embed when present and different.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub input_schema: Option<serde_json::Value>,
    pub output_schema: Option<serde_json::Value>,
    pub implementation_type: Option<ImplementationType>,
    pub implementation_code: Option<String>,
    pub version: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl ToolPatch {
    /// True when applying this patch would change the text fed into the
    /// embedding model, so the registry must schedule a re-embed.
    pub fn touches_embedding_text(&self) -> bool {
        self.name.is_some()
            || self.description.is_some()
            || self.category.is_some()
            || self.tags.is_some()
    }
}

impl Tool {
    /// Canonical text fed to the embedding client. Must stay in sync between
    /// registration and re-embed so identical tools produce identical vectors.
    pub fn embedding_text(
        name: &str,
        description: &str,
        category: &str,
        tags: &[String],
    ) -> String {
        format!(
            "{name}\n{description}\nCategory: {category}\nTags: {}",
            tags.join(", ")
        )
    }

    pub fn validate_name(name: &str) -> Result<(), CoreError> {
        if name.is_empty() || name.chars().count() > 255 {
            return Err(CoreError::SchemaInvalid(
                "name must be 1-255 characters".into(),
            ));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '-'))
        {
            return Err(CoreError::SchemaInvalid(
                "name must contain only ASCII letters, digits, ':', '_', '-'".into(),
            ));
        }
        Ok(())
    }

    pub fn validate_tags(tags: &[String]) -> Result<(), CoreError> {
        for tag in tags {
            if tag.chars().count() > 64 {
                return Err(CoreError::SchemaInvalid(format!(
                    "tag `{tag}` exceeds 64 characters"
                )));
            }
        }
        Ok(())
    }

    pub fn validate_schema(schema: &serde_json::Value) -> Result<(), CoreError> {
        if !schema.is_object() {
            return Err(CoreError::SchemaInvalid(
                "schema must be a JSON object".into(),
            ));
        }
        jsonschema::JSONSchema::compile(schema)
            .map(|_| ())
            .map_err(|e| CoreError::SchemaInvalid(e.to_string()))
    }
}

/// Coarse counts used by admin/diagnostic endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total: i64,
    pub active: i64,
    pub by_category: BTreeMap<String, i64>,
    pub by_implementation_type: BTreeMap<String, i64>,
}
