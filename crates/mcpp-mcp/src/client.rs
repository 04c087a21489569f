//! Registry of live protocol connections.
//!
//! Every connection owns its own transport behind a `Mutex`, so requests on
//! one connection are serialised while different connections proceed
//! independently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mcpp_core::{LaunchCommand, PlatformSettings, ToolCallResult, ToolDefinition};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::connection::{Connection, ConnectionInfo, Timeouts};
use crate::error::ClientError;
use crate::process::DEFAULT_GRACE;
use crate::protocol::ClientInfo;
use crate::transport::{HttpTransport, StdioTransport, Transport};

type SharedConnection = Arc<Mutex<Connection>>;

/// Client for many concurrent tool-server connections.
#[derive(Debug)]
pub struct ProtocolClient {
    connections: RwLock<HashMap<Uuid, SharedConnection>>,
    client_info: ClientInfo,
    timeouts: Timeouts,
    http_path: String,
    grace: Duration,
}

impl ProtocolClient {
    pub fn new(settings: &PlatformSettings) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            client_info: ClientInfo::default(),
            timeouts: Timeouts {
                handshake: settings.handshake_timeout(),
                call: settings.call_timeout(),
            },
            http_path: settings.http_path.clone(),
            grace: DEFAULT_GRACE,
        }
    }

    /// Override the SIGTERM grace period for spawned servers.
    #[must_use]
    pub const fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    #[must_use]
    pub fn with_client_info(mut self, client_info: ClientInfo) -> Self {
        self.client_info = client_info;
        self
    }

    pub const fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Spawn a server process and complete the handshake.
    ///
    /// The process is terminated if the handshake fails.
    pub async fn connect_stdio(&self, launch: &LaunchCommand) -> Result<Uuid, ClientError> {
        let transport = StdioTransport::spawn(launch, self.grace)?;
        self.establish(Transport::Stdio(transport)).await
    }

    /// Connect to a server listening at `endpoint` and complete the handshake.
    pub async fn connect_http(&self, endpoint: &str) -> Result<Uuid, ClientError> {
        let transport = HttpTransport::new(endpoint, &self.http_path)?;
        self.establish(Transport::Http(transport)).await
    }

    async fn establish(&self, transport: Transport) -> Result<Uuid, ClientError> {
        let connection = Connection::open(transport, self.timeouts, &self.client_info).await?;
        let id = connection.id();
        let info = connection.info();
        self.connections
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(connection)));
        info!(connection_id = %id, transport = %info.transport, pid = ?info.pid, "Connected");
        Ok(id)
    }

    pub async fn list_tools(&self, id: Uuid) -> Result<Vec<ToolDefinition>, ClientError> {
        let connection = self.get(id).await?;
        let mut connection = connection.lock().await;
        connection.list_tools().await
    }

    pub async fn call_tool(
        &self,
        id: Uuid,
        name: &str,
        arguments: &Value,
    ) -> Result<ToolCallResult, ClientError> {
        let connection = self.get(id).await?;
        let mut connection = connection.lock().await;
        connection.call_tool(name, arguments).await
    }

    /// Close one connection and forget it.
    pub async fn disconnect(&self, id: Uuid) -> Result<(), ClientError> {
        let connection = self
            .connections
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| ClientError::UnknownConnection(id.to_string()))?;
        let mut connection = connection.lock().await;
        connection.close().await?;
        info!(connection_id = %id, "Disconnected");
        Ok(())
    }

    /// Close every connection. Individual failures are collected, not fatal.
    pub async fn disconnect_all(&self) -> Vec<(Uuid, ClientError)> {
        let drained: Vec<(Uuid, SharedConnection)> =
            self.connections.write().await.drain().collect();

        let mut failures = Vec::new();
        for (id, connection) in drained {
            let mut connection = connection.lock().await;
            if let Err(e) = connection.close().await {
                warn!(connection_id = %id, error = %e, "Failed to close connection");
                failures.push((id, e));
            }
        }
        failures
    }

    pub async fn connection_info(&self, id: Uuid) -> Option<ConnectionInfo> {
        let connection = self.get(id).await.ok()?;
        let connection = connection.lock().await;
        Some(connection.info())
    }

    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        let shared: Vec<SharedConnection> =
            self.connections.read().await.values().cloned().collect();
        let mut infos = Vec::with_capacity(shared.len());
        for connection in shared {
            infos.push(connection.lock().await.info());
        }
        infos.sort_by_key(|info| info.created_at);
        infos
    }

    async fn get(&self, id: Uuid) -> Result<SharedConnection, ClientError> {
        self.connections
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ClientError::UnknownConnection(id.to_string()))
    }
}
