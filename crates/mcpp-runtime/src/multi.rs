//! Orchestration across several backends.
//!
//! Backends are held in the configured order. That order is the detection
//! order: when a deployment id is given without a backend hint, backends are
//! probed one after another and the first owner wins.

use std::sync::Arc;
use std::time::Duration;

use mcpp_core::{
    BackendError, BackendType, CoreError, Deployment, DeploymentBackend, PlatformSettings,
    validate_settings,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::factory::create_backend;
use crate::manager::DeploymentManager;

/// A configured backend that could not be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedBackend {
    pub backend_type: BackendType,
    pub reason: String,
}

/// Result of probing one backend with a `list()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendHealth {
    pub backend_type: BackendType,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Deployment operations spanning every available backend.
#[derive(Debug, Clone)]
pub struct MultiBackendManager {
    managers: Vec<(BackendType, DeploymentManager)>,
    skipped: Vec<SkippedBackend>,
}

impl MultiBackendManager {
    /// Construct every backend listed in `settings.backends`, in order.
    ///
    /// Settings are validated first. Backends that fail to construct are
    /// skipped and reported through [`Self::skipped`]; fails when none is left.
    pub async fn from_settings(settings: &PlatformSettings) -> Result<Self, CoreError> {
        validate_settings(settings)?;
        let mut managers = Vec::new();
        let mut skipped = Vec::new();

        for &backend_type in &settings.backends {
            match create_backend(backend_type, settings).await {
                Ok(backend) => {
                    debug!(backend = %backend_type, "Backend enabled");
                    managers.push((backend_type, DeploymentManager::new(backend, settings)));
                }
                Err(e) => {
                    warn!(backend = %backend_type, error = %e, "Skipping unavailable backend");
                    skipped.push(SkippedBackend {
                        backend_type,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if managers.is_empty() {
            return Err(BackendError::Unavailable(
                "no configured backend is available".to_string(),
            )
            .into());
        }
        Ok(Self { managers, skipped })
    }

    /// Use already constructed backends, in the given order.
    pub fn with_backends(
        backends: Vec<Arc<dyn DeploymentBackend>>,
        settings: &PlatformSettings,
    ) -> Self {
        let managers = backends
            .into_iter()
            .map(|b| (b.backend_type(), DeploymentManager::new(b, settings)))
            .collect();
        Self {
            managers,
            skipped: Vec::new(),
        }
    }

    /// Enabled backends in detection order.
    pub fn backend_types(&self) -> Vec<BackendType> {
        self.managers.iter().map(|(t, _)| *t).collect()
    }

    /// Backends dropped at construction, with the reason.
    pub fn skipped(&self) -> &[SkippedBackend] {
        &self.skipped
    }

    /// The manager for `backend_type`, if enabled.
    pub fn manager(&self, backend_type: BackendType) -> Option<&DeploymentManager> {
        self.managers
            .iter()
            .find(|(t, _)| *t == backend_type)
            .map(|(_, m)| m)
    }

    /// The first enabled backend's manager.
    pub fn primary(&self) -> Option<&DeploymentManager> {
        self.managers.first().map(|(_, m)| m)
    }

    /// Union of every backend's deployments. A failing backend is skipped.
    pub async fn get_all_deployments(&self, template_filter: Option<&str>) -> Vec<Deployment> {
        let mut all = Vec::new();
        for (backend_type, manager) in &self.managers {
            match manager.list_deployments(template_filter).await {
                Ok(mut deployments) => {
                    for d in &mut deployments {
                        d.backend_type = *backend_type;
                    }
                    all.extend(deployments);
                }
                Err(e) => {
                    warn!(backend = %backend_type, error = %e, "Failed to list deployments");
                }
            }
        }
        all
    }

    /// Find the backend owning `id` by probing each backend in order.
    ///
    /// Stops at the first backend that reports the deployment. A probe error
    /// other than not-found is logged and counted as a miss.
    pub async fn detect_backend_for_deployment(
        &self,
        id: &str,
    ) -> Result<BackendType, BackendError> {
        self.detect(id)
            .await
            .map(|(manager, _)| manager.backend_type())
    }

    /// Probe in order and return the manager that answered.
    async fn detect(&self, id: &str) -> Result<(&DeploymentManager, Deployment), BackendError> {
        for (backend_type, manager) in &self.managers {
            match manager.deployment_status(id).await {
                Ok(deployment) => {
                    debug!(deployment_id = %id, backend = %backend_type, "Detected owning backend");
                    return Ok((manager, deployment));
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(
                        deployment_id = %id,
                        backend = %backend_type,
                        error = %e,
                        "Backend probe failed, treating as miss"
                    );
                }
            }
        }
        Err(BackendError::NotFound(id.to_string()))
    }

    async fn resolve_manager(
        &self,
        id: &str,
        backend_hint: Option<BackendType>,
    ) -> Result<&DeploymentManager, BackendError> {
        match backend_hint {
            Some(hint) => self.manager(hint).ok_or_else(|| {
                BackendError::Unavailable(format!("backend {hint} is not enabled"))
            }),
            None => self.detect(id).await.map(|(manager, _)| manager),
        }
    }

    pub async fn stop_deployment(
        &self,
        id: &str,
        backend_hint: Option<BackendType>,
        timeout: Option<Duration>,
    ) -> Result<(), BackendError> {
        let manager = self.resolve_manager(id, backend_hint).await?;
        manager.stop_deployment(id, timeout).await?;
        info!(deployment_id = %id, backend = %manager.backend_type(), "Deployment stopped");
        Ok(())
    }

    pub async fn get_deployment_logs(
        &self,
        id: &str,
        backend_hint: Option<BackendType>,
        lines: usize,
        follow: bool,
    ) -> Result<String, BackendError> {
        self.resolve_manager(id, backend_hint)
            .await?
            .deployment_logs(id, lines, follow)
            .await
    }

    pub async fn get_deployment_status(
        &self,
        id: &str,
        backend_hint: Option<BackendType>,
    ) -> Result<Deployment, BackendError> {
        if backend_hint.is_none() {
            return self.detect(id).await.map(|(_, deployment)| deployment);
        }
        self.resolve_manager(id, backend_hint)
            .await?
            .deployment_status(id)
            .await
    }

    /// One `list()` per backend, classified healthy or unhealthy.
    pub async fn get_backend_health(&self) -> Vec<BackendHealth> {
        let mut report = Vec::with_capacity(self.managers.len());
        for (backend_type, manager) in &self.managers {
            let health = match manager.backend().list().await {
                Ok(deployments) => BackendHealth {
                    backend_type: *backend_type,
                    healthy: true,
                    deployment_count: Some(deployments.len()),
                    error: None,
                },
                Err(e) => BackendHealth {
                    backend_type: *backend_type,
                    healthy: false,
                    deployment_count: None,
                    error: Some(e.to_string()),
                },
            };
            report.push(health);
        }
        report
    }

    /// First running deployment of `template_id` that exposes an endpoint.
    pub async fn find_running_deployment(&self, template_id: &str) -> Option<Deployment> {
        self.get_all_deployments(Some(template_id))
            .await
            .into_iter()
            .find(|d| d.status.is_running() && d.endpoint.is_some())
    }
}
