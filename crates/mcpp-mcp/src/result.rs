//! Normalisation of `tools/call` results.

use mcpp_core::ToolCallResult;
use serde_json::Value;

/// Turn a raw `tools/call` result into a [`ToolCallResult`].
///
/// Content blocks are kept as-is. Text blocks holding a JSON object or array
/// are also parsed into `structured_content`, after any `structuredContent`
/// the server supplied itself.
pub fn normalise_tool_result(result: Value) -> ToolCallResult {
    let content = result
        .get("content")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut structured_content = Vec::new();
    if let Some(structured) = result.get("structuredContent").filter(|v| !v.is_null()) {
        structured_content.push(structured.clone());
    }
    structured_content.extend(content.iter().filter_map(parse_text_json));

    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let error_message = if is_error {
        Some(first_text(&content).unwrap_or("Tool reported an error").to_string())
    } else {
        None
    };

    ToolCallResult {
        success: !is_error,
        result,
        content,
        structured_content,
        is_error,
        error_message,
    }
}

fn block_text(block: &Value) -> Option<&str> {
    if block.get("type").and_then(Value::as_str) != Some("text") {
        return None;
    }
    block.get("text").and_then(Value::as_str)
}

fn first_text(content: &[Value]) -> Option<&str> {
    content.iter().find_map(block_text)
}

fn parse_text_json(block: &Value) -> Option<Value> {
    let text = block_text(block)?.trim();
    if !(text.starts_with('{') || text.starts_with('[')) {
        return None;
    }
    serde_json::from_str(text).ok()
}
