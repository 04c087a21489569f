//! Deployment domain types.
//!
//! A deployment is a running (or stopped) tool-server workload owned by one
//! backend. Records are never cached: the backend is the ground truth and
//! every read goes back to it.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label carrying the template id of a workload.
pub const LABEL_TEMPLATE: &str = "template";

/// Label marking a workload as owned by this platform.
pub const LABEL_MANAGED_BY: &str = "managed-by";

/// Default value of the ownership label.
pub const DEFAULT_MANAGED_BY: &str = "mcp-platform";

/// Closed set of execution backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Container runtime driven through the `docker` CLI.
    Docker,
    /// Not yet implemented; construction always fails.
    Kubernetes,
    /// In-memory backend for deterministic tests.
    Mock,
}

impl BackendType {
    /// Every backend in the default probing order.
    pub const ALL: [Self; 3] = [Self::Docker, Self::Kubernetes, Self::Mock];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Kubernetes => "kubernetes",
            Self::Mock => "mock",
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "kubernetes" | "k8s" => Ok(Self::Kubernetes),
            "mock" => Ok(Self::Mock),
            other => Err(format!("Unknown backend type: {other}")),
        }
    }
}

/// Lifecycle status of a deployment as reported by its backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Pending,
    Running,
    Exited,
    Failed,
    #[default]
    Unknown,
}

impl DeploymentStatus {
    /// Map a runtime's state string onto the closed status set.
    #[must_use]
    pub fn from_runtime_state(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "created" | "restarting" | "pending" | "starting" => Self::Pending,
            "running" | "up" => Self::Running,
            "exited" | "stopped" | "removing" | "paused" => Self::Exited,
            "dead" | "failed" | "error" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Exited => "exited",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A tool-server workload owned by one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Unique workload name allocated at deploy time.
    pub id: String,

    /// Template this workload was created from.
    pub template: String,

    /// Backend that owns the workload.
    pub backend_type: BackendType,

    pub status: DeploymentStatus,

    pub created_at: DateTime<Utc>,

    /// Base URL for HTTP-capable servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Image reference the workload runs.
    pub image: String,

    /// Runtime labels (always includes template and ownership markers).
    #[serde(skip)]
    pub labels: BTreeMap<String, String>,
}

impl Deployment {
    /// Create a record with the standard ownership labels.
    pub fn new(
        id: impl Into<String>,
        template: impl Into<String>,
        backend_type: BackendType,
        image: impl Into<String>,
        managed_by: &str,
    ) -> Self {
        let template = template.into();
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_TEMPLATE.to_string(), template.clone());
        labels.insert(LABEL_MANAGED_BY.to_string(), managed_by.to_string());
        Self {
            id: id.into(),
            template,
            backend_type,
            status: DeploymentStatus::Pending,
            created_at: Utc::now(),
            endpoint: None,
            image: image.into(),
            labels,
        }
    }

    #[must_use]
    pub const fn with_status(mut self, status: DeploymentStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Check the ownership label against the expected marker.
    #[must_use]
    pub fn is_managed_by(&self, marker: &str) -> bool {
        self.labels.get(LABEL_MANAGED_BY).map(String::as_str) == Some(marker)
    }
}
