//! A single protocol session over one transport.

use std::time::Duration;

use chrono::{DateTime, Utc};
use mcpp_core::{ToolCallResult, ToolDefinition, TransportKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ClientError;
use crate::protocol::{
    ClientInfo, InitializeResult, JsonRpcNotification, JsonRpcRequest, METHOD_INITIALIZE,
    METHOD_INITIALIZED, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST, ServerInfo, call_params,
    initialize_params,
};
use crate::result::normalise_tool_result;
use crate::session::{ConnectionStatus, SessionState};
use crate::transport::Transport;

/// Per-step time limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub handshake: Duration,
    pub call: Duration,
}

/// Snapshot of a connection for callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionInfo {
    pub id: Uuid,
    pub transport: TransportKind,
    pub state: SessionState,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_info: Option<ServerInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

#[derive(Deserialize)]
struct ToolsListResult {
    #[serde(default)]
    tools: Vec<ToolDefinition>,
}

/// One session: a transport, its state and its request id counter.
///
/// Requests are strictly sequential; callers serialise access.
#[derive(Debug)]
pub struct Connection {
    id: Uuid,
    transport: Transport,
    state: SessionState,
    created_at: DateTime<Utc>,
    next_id: u64,
    server_info: Option<ServerInfo>,
    timeouts: Timeouts,
}

impl Connection {
    pub fn new(transport: Transport, timeouts: Timeouts) -> Self {
        Self {
            id: Uuid::new_v4(),
            transport,
            state: SessionState::Spawned,
            created_at: Utc::now(),
            next_id: 1,
            server_info: None,
            timeouts,
        }
    }

    /// Create a connection and complete the handshake.
    ///
    /// The transport is closed again if the handshake fails.
    pub async fn open(
        transport: Transport,
        timeouts: Timeouts,
        client: &ClientInfo,
    ) -> Result<Self, ClientError> {
        let mut connection = Self::new(transport, timeouts);
        match connection.initialize(client).await {
            Ok(_) => Ok(connection),
            Err(e) => {
                if let Err(close_err) = connection.close().await {
                    warn!(connection_id = %connection.id, error = %close_err, "Failed to close after handshake error");
                }
                Err(e)
            }
        }
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub fn info(&self) -> ConnectionInfo {
        let pid = match &self.transport {
            Transport::Stdio(t) => t.pid(),
            Transport::Http(_) => None,
        };
        ConnectionInfo {
            id: self.id,
            transport: self.transport.kind(),
            state: self.state,
            status: self.state.into(),
            created_at: self.created_at,
            server_info: self.server_info.clone(),
            pid,
        }
    }

    /// Run the `initialize` handshake and announce readiness.
    pub async fn initialize(&mut self, client: &ClientInfo) -> Result<InitializeResult, ClientError> {
        self.state.transition(SessionState::Initializing, "initialize")?;

        let limit = self.timeouts.handshake;
        let response = self
            .exchange(METHOD_INITIALIZE, Some(initialize_params(client)), limit)
            .await;
        let parsed = response.and_then(|v| {
            serde_json::from_value::<InitializeResult>(v).map_err(ClientError::from)
        });
        let init = match parsed {
            Ok(init) => init,
            Err(e) => return Err(self.fail(ClientError::handshake(e))),
        };

        let notification = JsonRpcNotification::new(METHOD_INITIALIZED, None);
        if let Err(e) = self.transport.notify(&notification, limit).await {
            return Err(self.fail(ClientError::handshake(e)));
        }

        self.server_info.clone_from(&init.server_info);
        self.state.transition(SessionState::Ready, "initialize")?;
        info!(
            connection_id = %self.id,
            transport = %self.transport.kind(),
            server = init.server_info.as_ref().map_or("unknown", |s| s.name.as_str()),
            protocol_version = %init.protocol_version,
            "Connection ready"
        );
        Ok(init)
    }

    pub async fn list_tools(&mut self) -> Result<Vec<ToolDefinition>, ClientError> {
        self.state.transition(SessionState::ListingTools, "list_tools")?;
        let outcome = self
            .exchange(METHOD_TOOLS_LIST, None, self.timeouts.call)
            .await
            .and_then(|v| {
                serde_json::from_value::<ToolsListResult>(v)
                    .map(|list| list.tools)
                    .map_err(ClientError::from)
            });
        let tools = self.settle(outcome)?;
        debug!(connection_id = %self.id, count = tools.len(), "Listed tools");
        Ok(tools)
    }

    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: &Value,
    ) -> Result<ToolCallResult, ClientError> {
        self.state.transition(SessionState::CallingTool, "call_tool")?;
        let outcome = self
            .exchange(
                METHOD_TOOLS_CALL,
                Some(call_params(name, arguments)),
                self.timeouts.call,
            )
            .await
            .map(normalise_tool_result);
        let result = self.settle(outcome)?;
        debug!(connection_id = %self.id, tool = name, is_error = result.is_error, "Tool call finished");
        Ok(result)
    }

    /// Close the transport. Safe to call on an errored or closed session.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        if self.state.is_terminal() {
            return Ok(());
        }
        self.state.transition(SessionState::Closing, "close")?;
        let closed = self.transport.close().await;
        self.state.transition(SessionState::Closed, "close")?;
        debug!(connection_id = %self.id, "Connection closed");
        closed
    }

    async fn exchange(
        &mut self,
        method: &str,
        params: Option<Value>,
        limit: Duration,
    ) -> Result<Value, ClientError> {
        let request = JsonRpcRequest::new(self.next_id, method, params);
        self.next_id += 1;
        debug!(connection_id = %self.id, method, request_id = request.id, "Sending request");

        let response = self.transport.request(&request, limit).await?;
        if let Some(error) = response.error {
            return Err(ClientError::Server {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Return to `Ready` after an operation. A JSON-RPC error leaves the
    /// session usable; anything else marks it errored.
    fn settle<T>(&mut self, outcome: Result<T, ClientError>) -> Result<T, ClientError> {
        match outcome {
            Ok(value) => {
                self.state.transition(SessionState::Ready, "settle")?;
                Ok(value)
            }
            Err(e @ ClientError::Server { .. }) => {
                self.state.transition(SessionState::Ready, "settle")?;
                Err(e)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn fail(&mut self, err: ClientError) -> ClientError {
        warn!(connection_id = %self.id, state = %self.state, error = %err, "Connection failed");
        if self.state.can_transition(SessionState::Error) {
            self.state = SessionState::Error;
        }
        err
    }
}
