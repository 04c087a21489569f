//! Fake tool servers shared by the integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use mcpp_core::{LaunchCommand, PlatformSettings};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Line-oriented fake server.
///
/// Prints banners and unrelated protocol traffic around every answer, and
/// dispatches on the request method. Tool `fail` reports `isError`, tool
/// `missing` answers with a JSON-RPC error, any other tool returns a JSON
/// array as text plus the value of `$GREETING`.
pub const FAKE_SERVER: &str = r#"
echo "Server starting"
echo "Listening..."
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      echo 'log: handshake received'
      echo '{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info"}}'
      echo '{"jsonrpc":"2.0","id":999,"result":{}}'
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2025-03-26","serverInfo":{"name":"fake","version":"0.1.0"},"capabilities":{"tools":{}}}}\n' "$id"
      ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"echo","description":"Echo input","inputSchema":{"type":"object"}}]}}\n' "$id"
      ;;
    *'"name":"fail"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"boom"}],"isError":true}}\n' "$id"
      ;;
    *'"name":"missing"'*)
      printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32602,"message":"Unknown tool: missing"}}\n' "$id"
      ;;
    *'"method":"tools/call"'*)
      echo 'progress 50%'
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"[1, 2, 3]"},{"type":"text","text":"%s"}]}}\n' "$id" "$GREETING"
      ;;
  esac
done
"#;

/// Answers nothing after reading the first request.
pub const SILENT_SERVER: &str = "read -r line; exec sleep 30";

/// Forks a long-running child, records its pid in `$PID_FILE`, then goes
/// silent.
pub const FORKING_SERVER: &str = r#"sleep 30 & echo $! > "$PID_FILE"; read -r line; wait"#;

/// Prints a Latin-1 banner before behaving like [`FAKE_SERVER`].
pub fn latin1_banner_server() -> String {
    format!("printf 'caf\\351 starting\\n'\n{FAKE_SERVER}")
}

/// Exits before answering the first request.
pub const CRASHING_SERVER: &str = "read -r line; echo 'fatal: bad config' >&2; exit 1";

pub fn sh(script: &str) -> LaunchCommand {
    LaunchCommand::new("sh", vec!["-c".to_string(), script.to_string()])
}

pub fn fast_settings() -> PlatformSettings {
    let mut settings = PlatformSettings::with_defaults();
    settings.handshake_timeout_secs = 2;
    settings.call_timeout_secs = 2;
    settings
}

/// Requests seen by the fake HTTP server: method and session header.
#[derive(Debug, Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<(String, Option<String>)>>>);

impl RequestLog {
    pub fn entries(&self) -> Vec<(String, Option<String>)> {
        self.0.lock().unwrap().clone()
    }
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Fake HTTP tool server mounted at `/mcp`.
///
/// Tool `stream` answers as an event stream, tool `missing` with a JSON-RPC
/// error, anything else with a JSON text block.
pub fn mcp_router(log: RequestLog) -> Router {
    Router::new().route("/mcp", post(handle_mcp)).with_state(log)
}

async fn handle_mcp(
    State(log): State<RequestLog>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let method = body["method"].as_str().unwrap_or_default().to_string();
    let session = headers
        .get("mcp-session-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    log.0.lock().unwrap().push((method.clone(), session));

    let id = body["id"].clone();
    match method.as_str() {
        "initialize" => (
            [("mcp-session-id", "session-1")],
            Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": "2025-03-26",
                    "serverInfo": {"name": "fake-http", "version": "1.0.0"},
                    "capabilities": {"tools": {}}
                }
            })),
        )
            .into_response(),
        "notifications/initialized" => StatusCode::ACCEPTED.into_response(),
        "tools/list" => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {"tools": [{"name": "search", "description": "Search documents"}]}
        }))
        .into_response(),
        "tools/call" => match body["params"]["name"].as_str() {
            Some("stream") => {
                let payload = json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {"content": [{"type": "text", "text": "streamed"}]}
                });
                (
                    [(header::CONTENT_TYPE, "text/event-stream")],
                    format!("event: message\ndata: {payload}\n\n"),
                )
                    .into_response()
            }
            Some("missing") => Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32602, "message": "Unknown tool: missing"}
            }))
            .into_response(),
            _ => Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {"content": [{"type": "text", "text": "{\"hits\": 2}"}]}
            }))
            .into_response(),
        },
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}
