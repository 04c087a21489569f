//! Message transports for a single connection.

mod http;
mod stdio;

use std::time::Duration;

use mcpp_core::TransportKind;
use tokio::time::timeout;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

use crate::error::ClientError;
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// The wire a connection talks over.
#[derive(Debug)]
pub enum Transport {
    Stdio(StdioTransport),
    Http(HttpTransport),
}

impl Transport {
    pub const fn kind(&self) -> TransportKind {
        match self {
            Self::Stdio(_) => TransportKind::Stdio,
            Self::Http(_) => TransportKind::Http,
        }
    }

    pub async fn request(
        &mut self,
        request: &JsonRpcRequest,
        limit: Duration,
    ) -> Result<JsonRpcResponse, ClientError> {
        match self {
            Self::Stdio(t) => t.request(request, limit).await,
            Self::Http(t) => t.request(request, limit).await,
        }
    }

    pub async fn notify(
        &mut self,
        notification: &JsonRpcNotification,
        limit: Duration,
    ) -> Result<(), ClientError> {
        match self {
            Self::Stdio(t) => timeout(limit, t.notify(notification))
                .await
                .map_err(|_| ClientError::Timeout {
                    method: notification.method.clone(),
                    millis: limit.as_millis(),
                })?,
            Self::Http(t) => t.notify(notification, limit).await,
        }
    }

    /// Release the transport. Stdio servers are terminated and reaped.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        match self {
            Self::Stdio(t) => t.close().await,
            Self::Http(_) => Ok(()),
        }
    }
}
