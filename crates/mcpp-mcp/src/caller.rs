//! Template-level tool invocation.
//!
//! Picks a transport for a template, opens a session, runs one operation and
//! tears everything down again:
//!
//! 1. HTTP, when the template supports it and a running deployment with an
//!    endpoint already exists.
//! 2. Otherwise an ephemeral stdio instance prepared by the first configured
//!    backend. The process is always terminated afterwards and any container
//!    created for it is removed.
//! 3. Otherwise `transport_unsupported`.
//!
//! Dropping a caller future part-way still kills the process (through the
//! transport's child guard) and schedules container removal.

use std::sync::Arc;
use std::time::Duration;

use mcpp_core::{
    ConfigSources, DeploymentBackend, PlatformSettings, Template, ToolCallResult, ToolDefinition,
    TransportKind,
};
use mcpp_runtime::MultiBackendManager;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::connection::{Connection, Timeouts};
use crate::error::ClientError;
use crate::process::DEFAULT_GRACE;
use crate::protocol::ClientInfo;
use crate::transport::{HttpTransport, StdioTransport, Transport};

/// Classification of a failed tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallErrorKind {
    ConnectionFailed,
    HandshakeFailed,
    Timeout,
    ToolError,
    TransportUnsupported,
}

impl ToolCallErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionFailed => "connection_failed",
            Self::HandshakeFailed => "handshake_failed",
            Self::Timeout => "timeout",
            Self::ToolError => "tool_error",
            Self::TransportUnsupported => "transport_unsupported",
        }
    }
}

impl std::fmt::Display for ToolCallErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed tool invocation. The message carries the underlying error verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind}: {message}")]
pub struct ToolCallError {
    pub kind: ToolCallErrorKind,
    pub message: String,
}

impl ToolCallError {
    pub fn new(kind: ToolCallErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<ClientError> for ToolCallError {
    fn from(err: ClientError) -> Self {
        let kind = match &err {
            ClientError::Timeout { .. } => ToolCallErrorKind::Timeout,
            ClientError::Handshake(_) => ToolCallErrorKind::HandshakeFailed,
            ClientError::Server { .. } | ClientError::Protocol(_) | ClientError::Json(_) => {
                ToolCallErrorKind::ToolError
            }
            ClientError::Spawn(_)
            | ClientError::Io(_)
            | ClientError::ProcessExited { .. }
            | ClientError::Http { .. }
            | ClientError::Connect { .. }
            | ClientError::InvalidState { .. }
            | ClientError::UnknownConnection(_) => ToolCallErrorKind::ConnectionFailed,
        };
        Self::new(kind, err.to_string())
    }
}

/// Removes an ephemeral container unless cleanup already ran.
struct EphemeralGuard {
    backend: Arc<dyn DeploymentBackend>,
    name: Option<String>,
}

impl EphemeralGuard {
    fn new(backend: Arc<dyn DeploymentBackend>, name: String) -> Self {
        Self {
            backend,
            name: Some(name),
        }
    }

    async fn cleanup(mut self) {
        if let Some(name) = self.name.take() {
            remove_ephemeral(self.backend.as_ref(), &name).await;
        }
    }
}

impl Drop for EphemeralGuard {
    fn drop(&mut self) {
        let Some(name) = self.name.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let backend = Arc::clone(&self.backend);
                handle.spawn(async move {
                    remove_ephemeral(backend.as_ref(), &name).await;
                });
            }
            Err(_) => warn!(container = %name, "No runtime to remove ephemeral container"),
        }
    }
}

async fn remove_ephemeral(backend: &dyn DeploymentBackend, name: &str) {
    match backend.cleanup_ephemeral(name).await {
        Ok(()) => debug!(container = name, "Removed ephemeral container"),
        Err(e) => warn!(container = name, error = %e, "Failed to remove ephemeral container"),
    }
}

/// An open session plus whatever must be torn down with it.
struct Session {
    connection: Connection,
    ephemeral: Option<EphemeralGuard>,
}

impl Session {
    async fn finish(mut self) {
        if let Err(e) = self.connection.close().await {
            warn!(connection_id = %self.connection.id(), error = %e, "Failed to close session");
        }
        if let Some(guard) = self.ephemeral.take() {
            guard.cleanup().await;
        }
    }
}

/// Discovers and invokes the tools of a template's server.
#[derive(Debug)]
pub struct ToolCaller {
    backends: Arc<MultiBackendManager>,
    client_info: ClientInfo,
    timeouts: Timeouts,
    http_path: String,
    grace: Duration,
}

impl ToolCaller {
    pub fn new(backends: Arc<MultiBackendManager>, settings: &PlatformSettings) -> Self {
        Self {
            backends,
            client_info: ClientInfo::default(),
            timeouts: Timeouts {
                handshake: settings.handshake_timeout(),
                call: settings.call_timeout(),
            },
            http_path: settings.http_path.clone(),
            grace: DEFAULT_GRACE,
        }
    }

    /// Override the SIGTERM grace period for ephemeral servers.
    #[must_use]
    pub const fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// List the tools a template's server exposes.
    pub async fn list_tools(
        &self,
        template: &Template,
        sources: &ConfigSources,
    ) -> Result<Vec<ToolDefinition>, ToolCallError> {
        let mut session = self.open(template, sources).await?;
        let outcome = session.connection.list_tools().await;
        session.finish().await;
        let tools = outcome?;
        info!(template = %template.id, count = tools.len(), "Listed tools");
        Ok(tools)
    }

    /// Invoke `tool` with `arguments`.
    ///
    /// A result the server flags with `isError` is returned as a normal
    /// result with `is_error` set.
    pub async fn call_tool(
        &self,
        template: &Template,
        tool: &str,
        arguments: &Value,
        sources: &ConfigSources,
    ) -> Result<ToolCallResult, ToolCallError> {
        let mut session = self.open(template, sources).await?;
        let outcome = session.connection.call_tool(tool, arguments).await;
        session.finish().await;
        let result = outcome?;
        info!(template = %template.id, tool, is_error = result.is_error, "Called tool");
        Ok(result)
    }

    async fn open(
        &self,
        template: &Template,
        sources: &ConfigSources,
    ) -> Result<Session, ToolCallError> {
        if template.transport.supports(TransportKind::Http) {
            if let Some(endpoint) = self.running_endpoint(&template.id).await {
                debug!(template = %template.id, %endpoint, "Reusing running deployment");
                let transport = HttpTransport::new(&endpoint, &self.http_path)?;
                let connection =
                    Connection::open(Transport::Http(transport), self.timeouts, &self.client_info)
                        .await?;
                return Ok(Session {
                    connection,
                    ephemeral: None,
                });
            }
        }

        if !template.transport.supports(TransportKind::Stdio) {
            return Err(ToolCallError::new(
                ToolCallErrorKind::TransportUnsupported,
                format!(
                    "template '{}' has no running HTTP deployment and does not support stdio",
                    template.id
                ),
            ));
        }

        let manager = self.backends.primary().ok_or_else(|| {
            ToolCallError::new(ToolCallErrorKind::ConnectionFailed, "no backend available")
        })?;
        let launch = manager
            .prepare_stdio_launch(template, sources)
            .map_err(|e| ToolCallError::new(ToolCallErrorKind::ConnectionFailed, e.to_string()))?;
        let ephemeral = launch
            .container_name
            .clone()
            .map(|name| EphemeralGuard::new(Arc::clone(manager.backend()), name));

        debug!(template = %template.id, program = %launch.program, "Starting ephemeral server");
        let opened = match StdioTransport::spawn(&launch, self.grace) {
            Ok(transport) => {
                Connection::open(Transport::Stdio(transport), self.timeouts, &self.client_info)
                    .await
            }
            Err(e) => Err(e),
        };
        match opened {
            Ok(connection) => Ok(Session {
                connection,
                ephemeral,
            }),
            Err(e) => {
                if let Some(guard) = ephemeral {
                    guard.cleanup().await;
                }
                Err(e.into())
            }
        }
    }

    async fn running_endpoint(&self, template_id: &str) -> Option<String> {
        self.backends
            .find_running_deployment(template_id)
            .await
            .and_then(|d| d.endpoint)
    }
}
