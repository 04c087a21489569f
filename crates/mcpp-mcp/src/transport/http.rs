//! JSON-RPC over HTTP POST.
//!
//! Each message is one POST to `<endpoint><path>`. Responses may come back
//! as a plain JSON body or as an event stream; both go through the same
//! id matcher as stdio output.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use tracing::debug;

use crate::decoder::decode_body;
use crate::error::ClientError;
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

const SESSION_HEADER: &str = "mcp-session-id";

#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    url: String,
    session_id: Option<String>,
}

impl HttpTransport {
    pub fn new(endpoint: &str, path: &str) -> Result<Self, ClientError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ClientError::Connect {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            url: join_url(endpoint, path),
            session_id: None,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `request` and return the matching response.
    pub async fn request(
        &mut self,
        request: &JsonRpcRequest,
        limit: Duration,
    ) -> Result<JsonRpcResponse, ClientError> {
        let body = self.post(request, &request.method, limit).await?;
        decode_body(&body, request.id).ok_or_else(|| {
            ClientError::Protocol(format!(
                "no response with id {} in reply to {}",
                request.id, request.method
            ))
        })
    }

    /// POST a notification. Any success status is accepted.
    pub async fn notify(
        &mut self,
        notification: &JsonRpcNotification,
        limit: Duration,
    ) -> Result<(), ClientError> {
        self.post(notification, &notification.method, limit).await?;
        Ok(())
    }

    async fn post<T: Serialize + Sync>(
        &mut self,
        message: &T,
        method: &str,
        limit: Duration,
    ) -> Result<String, ClientError> {
        let mut builder = self
            .client
            .post(&self.url)
            .timeout(limit)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(message);
        if let Some(session) = &self.session_id {
            builder = builder.header(SESSION_HEADER, session);
        }

        let response = builder.send().await.map_err(|e| self.map_error(&e, method, limit))?;

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.session_id = Some(session.to_string());
        }

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_error(&e, method, limit))?;

        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }

        debug!(method, %content_type, bytes = body.len(), "HTTP response received");
        Ok(body)
    }

    fn map_error(&self, err: &reqwest::Error, method: &str, limit: Duration) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout {
                method: method.to_string(),
                millis: limit.as_millis(),
            }
        } else if err.is_connect() {
            ClientError::Connect {
                endpoint: self.url.clone(),
                message: err.to_string(),
            }
        } else {
            ClientError::Protocol(err.to_string())
        }
    }
}

fn join_url(endpoint: &str, path: &str) -> String {
    let base = endpoint.trim_end_matches('/');
    if path.is_empty() || base.ends_with(path) {
        return base.to_string();
    }
    format!("{base}/{}", path.trim_start_matches('/'))
}
