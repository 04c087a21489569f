//! Tool definitions and normalised tool-call results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition from a server's `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (function name).
    pub name: String,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for input parameters.
    #[serde(
        default,
        rename = "inputSchema",
        alias = "input_schema",
        skip_serializing_if = "Option::is_none"
    )]
    pub input_schema: Option<Value>,
}

impl ToolDefinition {
    /// Create a new tool definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Normalised result of a `tools/call`.
///
/// Content blocks are kept verbatim. Text blocks that carry JSON are
/// additionally parsed into `structured_content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// False when the server flagged the call as an error.
    pub success: bool,

    /// Raw `result` object as returned by the server.
    pub result: Value,

    /// Content blocks in server order.
    pub content: Vec<Value>,

    /// JSON parsed out of text blocks, plus any server-supplied structured content.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structured_content: Vec<Value>,

    pub is_error: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ToolCallResult {
    /// First text block, if any.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .and_then(|block| block.get("text"))
            .and_then(Value::as_str)
    }
}
