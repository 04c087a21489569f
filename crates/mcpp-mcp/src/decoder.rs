//! Response matching shared by every transport.
//!
//! Servers print banners, progress output and unrelated messages on the
//! same stream as protocol responses. A line counts as the answer only when
//! it parses as a response envelope *and* carries the outstanding id;
//! everything else is discarded.

use serde_json::Value;
use tracing::{debug, trace};

use crate::protocol::JsonRpcResponse;

/// Outcome of feeding one line to the matcher.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// The response to the outstanding request.
    Matched(JsonRpcResponse),
    /// Not the answer; keep reading.
    Discarded,
}

/// Try one line against the outstanding request id.
pub fn decode_line(line: &str, expected_id: u64) -> LineOutcome {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineOutcome::Discarded;
    }

    let response = match serde_json::from_str::<JsonRpcResponse>(trimmed) {
        Ok(response) => response,
        Err(_) => {
            debug!(line = trimmed, "Discarding non-protocol output");
            return LineOutcome::Discarded;
        }
    };

    if response.result.is_none() && response.error.is_none() {
        trace!(line = trimmed, "Discarding message that is not a response");
        return LineOutcome::Discarded;
    }

    if id_matches(response.id.as_ref(), expected_id) {
        LineOutcome::Matched(response)
    } else {
        debug!(expected_id, line = trimmed, "Discarding response with foreign id");
        LineOutcome::Discarded
    }
}

/// Find the matching response in a complete body.
///
/// Accepts a single JSON document (possibly spread over several lines), a
/// batch array, or an event stream whose `data:` lines carry the payloads.
pub fn decode_body(body: &str, expected_id: u64) -> Option<JsonRpcResponse> {
    let trimmed = body.trim();

    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) {
        return items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<JsonRpcResponse>(item).ok())
            .find(|r| id_matches(r.id.as_ref(), expected_id));
    }

    if let LineOutcome::Matched(response) = decode_line(trimmed, expected_id) {
        return Some(response);
    }

    trimmed.lines().find_map(|line| {
        let payload = line.strip_prefix("data:").unwrap_or(line);
        match decode_line(payload, expected_id) {
            LineOutcome::Matched(response) => Some(response),
            LineOutcome::Discarded => None,
        }
    })
}

fn id_matches(id: Option<&Value>, expected: u64) -> bool {
    match id {
        Some(Value::Number(n)) => n.as_u64() == Some(expected),
        Some(Value::String(s)) => s.parse::<u64>().ok() == Some(expected),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_lines_are_discarded() {
        assert_eq!(decode_line("Server starting", 1), LineOutcome::Discarded);
        assert_eq!(decode_line("Listening...", 1), LineOutcome::Discarded);
        assert_eq!(decode_line("", 1), LineOutcome::Discarded);
        assert_eq!(decode_line("{not json", 1), LineOutcome::Discarded);
    }

    #[test]
    fn test_foreign_id_is_discarded() {
        let line = r#"{"jsonrpc":"2.0","id":7,"result":{}}"#;
        assert_eq!(decode_line(line, 1), LineOutcome::Discarded);
    }

    #[test]
    fn test_notifications_are_discarded() {
        let line = r#"{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info"}}"#;
        assert_eq!(decode_line(line, 1), LineOutcome::Discarded);
    }

    #[test]
    fn test_matching_response() {
        let line = r#"{"jsonrpc":"2.0","id":3,"result":{"tools":[]}}"#;
        let LineOutcome::Matched(response) = decode_line(line, 3) else {
            panic!("expected a match");
        };
        assert!(response.result.is_some());
    }

    #[test]
    fn test_matching_error_response() {
        let line = r#"{"jsonrpc":"2.0","id":"2","error":{"code":-32601,"message":"no such method"}}"#;
        let LineOutcome::Matched(response) = decode_line(line, 2) else {
            panic!("expected a match");
        };
        assert_eq!(response.error.unwrap().message, "no such method");
    }

    #[test]
    fn test_body_forms() {
        let pretty = "{\n  \"jsonrpc\": \"2.0\",\n  \"id\": 1,\n  \"result\": {}\n}";
        assert!(decode_body(pretty, 1).is_some());

        let batch = r#"[{"jsonrpc":"2.0","id":4,"result":{}},{"jsonrpc":"2.0","id":5,"result":{"ok":true}}]"#;
        assert_eq!(
            decode_body(batch, 5).unwrap().result,
            Some(serde_json::json!({"ok": true}))
        );

        let sse = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{}}\n\n";
        assert!(decode_body(sse, 2).is_some());
        assert!(decode_body(sse, 3).is_none());
    }
}
