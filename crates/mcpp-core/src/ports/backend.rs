//! Deployment backend trait definition.
//!
//! This port defines the interface every execution runtime implements.
//! Implementations handle all runtime details internally.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::BackendError;
use crate::config::ResolvedConfiguration;
use crate::domain::{BackendType, Deployment, Template};

/// Intent to create one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    /// Template the workload is created from.
    pub template_id: String,
    /// Image to run.
    pub image: String,
    /// Resolved environment, volumes and arguments.
    pub resolved: ResolvedConfiguration,
    /// Port to publish for HTTP servers.
    pub port: Option<u16>,
    /// Pull the image before starting.
    pub pull_image: bool,
}

impl DeploymentRequest {
    pub fn new(
        template_id: impl Into<String>,
        image: impl Into<String>,
        resolved: ResolvedConfiguration,
    ) -> Self {
        Self {
            template_id: template_id.into(),
            image: image.into(),
            resolved,
            port: None,
            pull_image: false,
        }
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub const fn with_pull(mut self, pull_image: bool) -> Self {
        self.pull_image = pull_image;
        self
    }
}

/// Everything needed to spawn a one-shot stdio instance of a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment for the spawned process.
    pub env: BTreeMap<String, String>,
    /// Ephemeral container to remove after the session, if any.
    pub container_name: Option<String>,
}

impl LaunchCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: BTreeMap::new(),
            container_name: None,
        }
    }

    #[must_use]
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub fn with_container_name(mut self, name: impl Into<String>) -> Self {
        self.container_name = Some(name.into());
        self
    }
}

/// Execution runtime for tool-server workloads.
///
/// # Design Rules
///
/// - Every call completes its work before returning; nothing runs detached
/// - Only workloads carrying the platform's ownership label are visible
/// - Unknown ids are `BackendError::NotFound`, never a silent success
#[async_trait]
pub trait DeploymentBackend: Send + Sync {
    /// Which runtime this is.
    fn backend_type(&self) -> BackendType;

    /// Create and start a workload.
    ///
    /// A failure after partial creation is rolled back before returning.
    async fn deploy(&self, request: &DeploymentRequest) -> Result<Deployment, BackendError>;

    /// Every managed workload, running or not.
    async fn list(&self) -> Result<Vec<Deployment>, BackendError>;

    /// Stop and remove a workload.
    async fn stop(&self, id: &str, timeout: Duration) -> Result<(), BackendError>;

    /// Current record of one workload.
    async fn status(&self, id: &str) -> Result<Deployment, BackendError>;

    /// Tail of a workload's output. With `follow`, capture continues until the
    /// backend's command timeout.
    async fn logs(&self, id: &str, lines: usize, follow: bool) -> Result<String, BackendError>;

    /// Command for a one-shot stdio instance of `template`.
    fn stdio_launch(
        &self,
        template: &Template,
        resolved: &ResolvedConfiguration,
    ) -> Result<LaunchCommand, BackendError>;

    /// Remove an ephemeral instance created from [`Self::stdio_launch`].
    async fn cleanup_ephemeral(&self, _name: &str) -> Result<(), BackendError> {
        Ok(())
    }
}
