//! Protocol client over HTTP against an in-process axum server.

mod common;

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::post;
use mcpp_core::ErrorKind;
use mcpp_mcp::protocol::{JsonRpcRequest, METHOD_TOOLS_LIST};
use mcpp_mcp::transport::HttpTransport;
use mcpp_mcp::{ClientError, ProtocolClient};
use serde_json::json;

use common::{RequestLog, fast_settings, mcp_router, serve};

#[tokio::test]
async fn test_full_exchange_over_http() {
    let log = RequestLog::default();
    let base = serve(mcp_router(log.clone())).await;
    let client = ProtocolClient::new(&fast_settings());

    let id = client.connect_http(&base).await.unwrap();
    let info = client.connection_info(id).await.unwrap();
    assert_eq!(info.server_info.unwrap().name, "fake-http");
    assert!(info.pid.is_none());

    let tools = client.list_tools(id).await.unwrap();
    assert_eq!(tools[0].name, "search");

    let result = client.call_tool(id, "search", &json!({"q": "rust"})).await.unwrap();
    assert_eq!(result.structured_content, vec![json!({"hits": 2})]);

    let streamed = client.call_tool(id, "stream", &json!({})).await.unwrap();
    assert_eq!(streamed.first_text(), Some("streamed"));

    client.disconnect(id).await.unwrap();

    let entries = log.entries();
    let methods: Vec<_> = entries.iter().map(|(m, _)| m.as_str()).collect();
    assert_eq!(
        methods,
        [
            "initialize",
            "notifications/initialized",
            "tools/list",
            "tools/call",
            "tools/call"
        ]
    );
    assert_eq!(entries[0].1, None);
    assert!(
        entries[1..]
            .iter()
            .all(|(_, session)| session.as_deref() == Some("session-1"))
    );
}

#[tokio::test]
async fn test_jsonrpc_error_is_a_server_error() {
    let base = serve(mcp_router(RequestLog::default())).await;
    let client = ProtocolClient::new(&fast_settings());
    let id = client.connect_http(&base).await.unwrap();

    let err = client.call_tool(id, "missing", &json!({})).await.unwrap_err();
    match err {
        ClientError::Server { code, message } => {
            assert_eq!(code, -32602);
            assert_eq!(message, "Unknown tool: missing");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_non_success_status_carries_the_body() {
    let router = Router::new().route(
        "/mcp",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
    );
    let base = serve(router).await;

    let mut transport = HttpTransport::new(&base, "/mcp").unwrap();
    let request = JsonRpcRequest::new(1, METHOD_TOOLS_LIST, None);
    let err = transport
        .request(&request, Duration::from_secs(2))
        .await
        .unwrap_err();
    match err {
        ClientError::Http { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "overloaded");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let client = ProtocolClient::new(&fast_settings());
    let err = client.connect_http(&base).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HandshakeFailed);
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let router = Router::new().route(
        "/mcp",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::OK
        }),
    );
    let base = serve(router).await;

    let mut transport = HttpTransport::new(&base, "/mcp").unwrap();
    let request = JsonRpcRequest::new(1, METHOD_TOOLS_LIST, None);
    let err = transport
        .request(&request, Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_unreachable_endpoint() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ProtocolClient::new(&fast_settings());
    let err = client.connect_http(&format!("http://{addr}")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HandshakeFailed);
    assert!(client.connections().await.is_empty());
}
